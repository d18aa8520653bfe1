// Metronome - A multi-dialect Statsd client for Rust!
//
// Copyright 2024 The Metronome Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Source of the uniform draws used to sample counters.
///
/// Every `rand::RngCore` is a `Sampler`, so a seeded generator can be passed
/// to `StatsdClient::with_sampler` to make sampling reproducible. Tests that
/// need to control each decision exactly can implement the trait directly.
pub trait Sampler {
    /// Return a number in `[0, 1)`.
    fn draw(&mut self) -> f64;
}

impl<R> Sampler for R
where
    R: RngCore,
{
    fn draw(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Sampler used when none is given, seeded from the operating system.
pub(crate) fn default_sampler() -> StdRng {
    StdRng::from_entropy()
}

/// Whether a metric sent at `rate` should be kept, given a uniform `draw`.
///
/// A draw equal to the rate keeps the metric. Rates of zero or below never
/// keep anything, even a draw of exactly zero.
pub(crate) fn keep(rate: f64, draw: f64) -> bool {
    rate > 0.0 && draw <= rate
}

#[cfg(test)]
mod tests {
    use super::{default_sampler, keep, Sampler};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_keep_boundaries() {
        assert!(keep(0.5, 0.5));
        assert!(keep(0.5, 0.0));
        assert!(!keep(0.5, 0.500_001));
        assert!(!keep(0.0, 0.1));
        assert!(!keep(0.0, 0.0));
        assert!(!keep(-1.0, 0.0));
    }

    #[test]
    fn test_rng_draws_in_unit_interval() {
        let mut sampler = default_sampler();
        for _ in 0..1000 {
            let draw = sampler.draw();
            assert!((0.0..1.0).contains(&draw), "draw out of range: {}", draw);
        }
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut first = ChaCha8Rng::seed_from_u64(42);
        let mut second = ChaCha8Rng::seed_from_u64(42);
        let a: Vec<f64> = (0..10).map(|_| first.draw()).collect();
        let b: Vec<f64> = (0..10).map(|_| second.draw()).collect();

        assert_eq!(a, b);
    }
}
