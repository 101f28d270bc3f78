//! Random source abstraction shared by the permutation generator and the
//! optimizer.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Minimal interface the search needs from a random generator.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`
    fn next_uniform01(&mut self) -> f64;

    /// Uniform integer in `[lo, hi]` (both inclusive). `lo` must not exceed `hi`.
    fn next_int(&mut self, lo: usize, hi: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    #[inline]
    fn next_uniform01(&mut self) -> f64 {
        self.gen::<f64>()
    }

    #[inline]
    fn next_int(&mut self, lo: usize, hi: usize) -> usize {
        self.gen_range(lo..=hi)
    }
}

/// Build the default generator: seeded when a seed is given, otherwise from
/// OS entropy so that successive runs diverge.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_int_stays_in_bounds() {
        let mut rng = make_rng(Some(7));
        for _ in 0..1000 {
            let v = rng.next_int(3, 5);
            assert!((3..=5).contains(&v));
        }
        assert_eq!(rng.next_int(4, 4), 4);
    }

    #[test]
    fn test_uniform_in_unit_interval() {
        let mut rng = make_rng(Some(11));
        for _ in 0..1000 {
            let u = rng.next_uniform01();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = make_rng(Some(42));
        let mut b = make_rng(Some(42));
        let xs: Vec<usize> = (0..20).map(|_| a.next_int(0, 1000)).collect();
        let ys: Vec<usize> = (0..20).map(|_| b.next_int(0, 1000)).collect();
        assert_eq!(xs, ys);
    }
}
