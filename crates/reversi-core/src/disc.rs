/// A disc colour, or the absence of a disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disc {
    Empty,
    Black,
    White,
}

impl Disc {
    /// Converts the disc to its textual board character.
    ///
    /// # Returns
    ///
    /// * `'-'` for `Disc::Empty`
    /// * `'X'` for `Disc::Black`
    /// * `'O'` for `Disc::White`
    pub fn to_char(self) -> char {
        match self {
            Disc::Empty => '-',
            Disc::Black => 'X',
            Disc::White => 'O',
        }
    }

    /// Parses a textual board character.
    ///
    /// Accepts `X`/`x`/`*` for Black, `O`/`o` for White and `-`/`.` for empty squares.
    pub fn from_char(c: char) -> Option<Disc> {
        match c {
            'X' | 'x' | '*' => Some(Disc::Black),
            'O' | 'o' => Some(Disc::White),
            '-' | '.' => Some(Disc::Empty),
            _ => None,
        }
    }

    /// Returns the opposite colour; `Empty` stays `Empty`.
    pub fn opposite(self) -> Disc {
        match self {
            Disc::Black => Disc::White,
            Disc::White => Disc::Black,
            Disc::Empty => Disc::Empty,
        }
    }
}
