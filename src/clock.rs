//! Clock & Random — the time source and pseudo-random source. Both are
//! traits so the task runner and executor can be driven deterministically
//! in tests, generalizing the direct `thread_rng()` call and implicit
//! wall-clock use in `engine::simulate_step_execution`.

use chrono::{DateTime, Utc};
use rand::Rng;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomSource: Send + Sync {
    /// Returns `true` with probability `p` (clamped to `[0.0, 1.0]`).
    fn gen_bool(&self, p: f64) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn gen_bool(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        rand::thread_rng().gen_bool(p)
    }
}

/// Deterministic `Clock`/`RandomSource` implementations for tests. Not
/// `cfg(test)`-gated: integration tests under `tests/` link against the
/// library as an ordinary dependency, so this has to be real, always-built
/// surface rather than inner unit-test-only code.
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A clock that advances a fixed step every call, for deterministic
    /// timestamp assertions in tests.
    pub struct FixedClock {
        base: DateTime<Utc>,
    }

    impl FixedClock {
        pub fn new(base: DateTime<Utc>) -> Self {
            Self { base }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.base
        }
    }

    /// A random source that always returns the same outcome.
    pub struct ConstantRandom(pub bool);

    impl RandomSource for ConstantRandom {
        fn gen_bool(&self, _p: f64) -> bool {
            self.0
        }
    }

    /// A random source that cycles through a fixed sequence of outcomes,
    /// useful for asserting a precise number of attempts.
    pub struct SequenceRandom {
        outcomes: Vec<bool>,
        next: AtomicI64,
    }

    impl SequenceRandom {
        pub fn new(outcomes: Vec<bool>) -> Self {
            Self {
                outcomes,
                next: AtomicI64::new(0),
            }
        }
    }

    impl RandomSource for SequenceRandom {
        fn gen_bool(&self, _p: f64) -> bool {
            let i = self.next.fetch_add(1, Ordering::SeqCst) as usize;
            self.outcomes[i % self.outcomes.len()]
        }
    }
}
