//! Job permutations: random generation, validation and repair.

use crate::error::{FlowShopError, Result};
use crate::rng::RandomSource;

/// Uniformly random permutation of `0..size` (identity followed by a
/// Fisher-Yates shuffle).
pub fn random_permutation<R: RandomSource + ?Sized>(size: usize, rng: &mut R) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..size).collect();
    for i in (1..size).rev() {
        let j = rng.next_int(0, i);
        perm.swap(i, j);
    }
    perm
}

/// Check that `candidate` is a bijection on `0..size`.
pub fn validate_permutation(candidate: &[usize], size: usize) -> Result<()> {
    if candidate.len() != size {
        return Err(FlowShopError::InvalidCandidate(format!(
            "expected {} jobs, got {}",
            size,
            candidate.len()
        )));
    }

    let mut seen = vec![false; size];
    for (pos, &job) in candidate.iter().enumerate() {
        if job >= size {
            return Err(FlowShopError::InvalidCandidate(format!(
                "job index {} at position {} is out of range 0..{}",
                job, pos, size
            )));
        }
        if seen[job] {
            return Err(FlowShopError::InvalidCandidate(format!(
                "job index {} appears more than once (position {})",
                job, pos
            )));
        }
        seen[job] = true;
    }

    Ok(())
}

/// Whether `candidate` is a bijection on `0..size`.
pub fn is_permutation(candidate: &[usize], size: usize) -> bool {
    validate_permutation(candidate, size).is_ok()
}

/// Turn an arbitrary vector of indices in `0..len` into a permutation.
///
/// Positions are visited left to right; the first occurrence of a value is
/// kept and every later occurrence (or out-of-range value) is reassigned to
/// the nearest index not used anywhere in the vector yet, the lower one on a
/// tie. A valid permutation is returned unchanged.
pub fn repair_nearest_unused(candidate: &mut [usize]) {
    let n = candidate.len();
    if n == 0 {
        return;
    }

    let mut count = vec![0usize; n];
    for &v in candidate.iter() {
        if v < n {
            count[v] += 1;
        }
    }

    let mut used = vec![false; n];
    for pos in 0..n {
        let v = candidate[pos];
        if v < n && !used[v] {
            used[v] = true;
            continue;
        }

        // Values still owned by a later first occurrence are not free.
        let is_free = |x: usize, used: &[bool]| !used[x] && count[x] == 0;

        let target = v.min(n - 1);
        let mut chosen = None;
        for d in 0..n {
            if target >= d && is_free(target - d, &used) {
                chosen = Some(target - d);
                break;
            }
            if target + d < n && is_free(target + d, &used) {
                chosen = Some(target + d);
                break;
            }
        }

        // Pigeonhole: a duplicate implies at least one value never appears.
        if let Some(c) = chosen {
            candidate[pos] = c;
            used[c] = true;
            count[c] = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::make_rng;

    #[test]
    fn test_random_permutation_is_valid() {
        let mut rng = make_rng(Some(3));
        for size in 0..20 {
            let perm = random_permutation(size, &mut rng);
            assert!(is_permutation(&perm, size));
        }
    }

    #[test]
    fn test_random_permutation_covers_all_orders() {
        let mut rng = make_rng(Some(5));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..600 {
            seen.insert(random_permutation(3, &mut rng));
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_validate_reports_reason() {
        assert!(validate_permutation(&[0, 1, 2], 3).is_ok());
        assert!(matches!(
            validate_permutation(&[0, 1], 3),
            Err(FlowShopError::InvalidCandidate(_))
        ));
        assert!(matches!(
            validate_permutation(&[0, 3, 1], 3),
            Err(FlowShopError::InvalidCandidate(_))
        ));
        assert!(matches!(
            validate_permutation(&[0, 1, 1], 3),
            Err(FlowShopError::InvalidCandidate(_))
        ));
    }

    #[test]
    fn test_repair_keeps_valid_permutation() {
        let mut perm = vec![2, 0, 3, 1];
        repair_nearest_unused(&mut perm);
        assert_eq!(perm, vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_repair_moves_duplicates_to_nearest_free_value() {
        // 1 is missing, second 2 is the duplicate: nearest free value to 2 is 1
        let mut perm = vec![0, 2, 2, 3];
        repair_nearest_unused(&mut perm);
        assert_eq!(perm, vec![0, 2, 1, 3]);

        // 0 and 4 are missing: the second 1 takes 0, the second 3 takes 4
        let mut perm = vec![1, 1, 3, 3, 2];
        repair_nearest_unused(&mut perm);
        assert!(is_permutation(&perm, 5));
        assert_eq!(perm, vec![1, 0, 3, 4, 2]);
    }

    #[test]
    fn test_repair_all_equal() {
        let mut perm = vec![4, 4, 4, 4, 4];
        repair_nearest_unused(&mut perm);
        assert_eq!(perm, vec![4, 3, 2, 1, 0]);
    }
}
