//! Deterministic random number generation for synthetic books.
//!
//! RULE: Nothing in the crate may call any platform RNG.
//! Synthetic data flows through StreamRng instances derived from one seed.
//!
//! Each kind of generated record gets its own stream, seeded from
//! (seed XOR stream_index · golden ratio). This means:
//!   - Adding a new stream never changes existing streams.
//!   - Changing the account count never reshuffles the rep roster.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for one generator stream.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    pub fn new(seed: u64, stream_index: u64) -> Self {
        let derived_seed = seed ^ stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n). Zero when n is zero.
    pub fn below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Roll an index into a slice of length `len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.below(len as u64) as usize
    }

    /// Bernoulli trial: true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [lo, hi).
    pub fn between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Simplified Pareto draw; most values near `x_min`, a long tail above.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.index(items.len())])
        }
    }
}

/// All generator streams for one seed.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn stream(&self, stream: RngStream) -> StreamRng {
        StreamRng::new(self.seed, stream as u64).with_name(stream.name())
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Reps = 0,
    Accounts = 1,
    Hierarchy = 2,
    Ownership = 3,
    Flags = 4,
    Opportunities = 5,
}

impl RngStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reps => "reps",
            Self::Accounts => "accounts",
            Self::Hierarchy => "hierarchy",
            Self::Ownership => "ownership",
            Self::Flags => "flags",
            Self::Opportunities => "opportunities",
        }
    }
}
