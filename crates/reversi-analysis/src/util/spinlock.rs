use std::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, Ordering},
};

use lock_api::{GuardSend, RawMutex};

/// A mutex guarded by [`RawSpinLock`].
pub type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;

/// Guard of a [`SpinMutex`].
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;

/// Guard of a [`SpinMutex`] projected onto part of its data.
pub type MappedSpinMutexGuard<'a, T> = lock_api::MappedMutexGuard<'a, RawSpinLock, T>;

/// Spin-then-yield lock for short, CPU-only critical sections.
///
/// One byte wide so it can sit inside every tree node.
pub struct RawSpinLock {
    state: AtomicBool,
}

unsafe impl RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        state: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        if self.try_lock() {
            return;
        }

        self.lock_slow();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

impl RawSpinLock {
    #[cold]
    fn lock_slow(&self) {
        let mut spins: u32 = 0;

        loop {
            while self.state.load(Ordering::Relaxed) {
                spin_loop();

                spins = spins.wrapping_add(1);
                if spins >= 1_000 {
                    std::thread::yield_now();
                    spins = 0;
                }
            }

            if self
                .state
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}
