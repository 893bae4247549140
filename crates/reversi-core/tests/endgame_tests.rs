use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reversi_core::board::Board;
use reversi_core::disc::Disc;
use reversi_core::endgame::{SolveOutcome, solve, solve_exact};

/// Plays random moves from the initial position until `n_empties` squares remain.
fn random_position(rng: &mut StdRng, n_empties: u32) -> Board {
    loop {
        let mut board = Board::new();
        while board.get_empty_count() > n_empties {
            let successors = board.successors();
            if successors.is_empty() {
                if board.is_game_over() {
                    break;
                }
                board = board.switch_players();
                continue;
            }
            board = successors[rng.random_range(0..successors.len())];
        }
        if board.get_empty_count() == n_empties {
            return board;
        }
    }
}

#[test]
fn test_solve_9() {
    let board = Board::from_string(
        "--O--O----OOOOO-XOOOOOOOXXOOXOOOXXXXXOXXXOXXOOXXXXXXOXOXXOOOOOOX",
        Disc::Black,
    );
    assert_eq!(solve_exact(&board), 28);
}

#[test]
fn test_solve_is_symmetry_invariant() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        let board = random_position(&mut rng, 8);
        let score = solve_exact(&board);
        for image in board.symmetries() {
            assert_eq!(solve_exact(&image), score);
        }
    }
}

#[test]
fn test_null_window_agrees_with_exact() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let board = random_position(&mut rng, 10);
        let exact = solve_exact(&board);
        let threshold = if exact >= 0 { exact - 1 } else { exact + 1 };
        match solve(&board, threshold - 2, threshold, u64::MAX) {
            SolveOutcome::Bounded { lower, upper, .. } => {
                assert!(lower <= exact && exact <= upper, "{lower} {exact} {upper}");
            }
            SolveOutcome::Exhausted { .. } => panic!("unbounded solve cannot be exhausted"),
        }
    }
}
