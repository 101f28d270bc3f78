//! Makespan evaluation for permutation flow shops.
//!
//! Completion times follow the usual recurrence over job positions `i` and
//! machines `j`:
//!
//! ```text
//! C[i][j] = P[pi(i)][j] + max(C[i-1][j], C[i][j-1])
//! ```
//!
//! with missing neighbours treated as zero. The makespan is `C[n-1][m-1]`.

use crate::error::Result;
use crate::instance::FlowShopInstance;
use crate::permutation::validate_permutation;

/// Makespan of `permutation` on `instance`.
///
/// Fails with [`crate::FlowShopError::InvalidInstance`] when the instance
/// dimensions are inconsistent, and with
/// [`crate::FlowShopError::InvalidCandidate`] unless `permutation` is a
/// bijection on the job indices.
pub fn evaluate(instance: &FlowShopInstance, permutation: &[usize]) -> Result<u64> {
    instance.validate()?;
    validate_permutation(permutation, instance.num_jobs)?;
    Ok(evaluate_valid(instance, permutation))
}

/// Rolling-row evaluation; `permutation` must already be valid.
pub(crate) fn evaluate_valid(instance: &FlowShopInstance, permutation: &[usize]) -> u64 {
    let mut row = vec![0u64; instance.num_machines];

    for &job in permutation {
        let times = &instance.processing_times[job];
        // row[k] still holds the previous job's completion on machine k
        let mut previous_machine = 0u64;
        for (k, &t) in times.iter().enumerate() {
            let done = row[k].max(previous_machine) + t as u64;
            row[k] = done;
            previous_machine = done;
        }
    }

    row[instance.num_machines - 1]
}

/// Full completion-time matrix, indexed `[position][machine]`.
pub fn completion_times(instance: &FlowShopInstance, permutation: &[usize]) -> Result<Vec<Vec<u64>>> {
    instance.validate()?;
    validate_permutation(permutation, instance.num_jobs)?;

    let n = instance.num_jobs;
    let m = instance.num_machines;
    let p = |i: usize, j: usize| instance.processing_time(permutation[i], j) as u64;

    let mut c = vec![vec![0u64; m]; n];
    c[0][0] = p(0, 0);
    for i in 1..n {
        c[i][0] = c[i - 1][0] + p(i, 0);
    }
    for j in 1..m {
        c[0][j] = c[0][j - 1] + p(0, j);
    }
    for i in 1..n {
        for j in 1..m {
            c[i][j] = p(i, j) + c[i - 1][j].max(c[i][j - 1]);
        }
    }

    Ok(c)
}

/// Start/finish time of one operation in a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub job: usize,
    pub machine: usize,
    pub start: u64,
    pub end: u64,
}

/// Every operation of the schedule induced by `permutation`, machine by
/// machine in processing order.
pub fn schedule(instance: &FlowShopInstance, permutation: &[usize]) -> Result<Vec<Operation>> {
    let c = completion_times(instance, permutation)?;
    let mut operations = Vec::with_capacity(instance.num_jobs * instance.num_machines);

    for machine in 0..instance.num_machines {
        for (pos, &job) in permutation.iter().enumerate() {
            let end = c[pos][machine];
            operations.push(Operation {
                job,
                machine,
                start: end - instance.processing_time(job, machine) as u64,
                end,
            });
        }
    }

    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowShopError;
    use crate::permutation::random_permutation;
    use crate::rng::make_rng;

    fn two_machine() -> FlowShopInstance {
        FlowShopInstance::new("t", vec![vec![5, 3], vec![2, 6], vec![4, 1]]).unwrap()
    }

    fn random_instance(n: usize, m: usize, seed: u64) -> FlowShopInstance {
        use rand::Rng;
        let mut rng = make_rng(Some(seed));
        let times = (0..n)
            .map(|_| (0..m).map(|_| rng.gen_range(1..=99)).collect())
            .collect();
        FlowShopInstance::new("random", times).unwrap()
    }

    #[test]
    fn test_known_makespan() {
        let instance = two_machine();
        assert_eq!(evaluate(&instance, &[0, 1, 2]).unwrap(), 15);

        let c = completion_times(&instance, &[0, 1, 2]).unwrap();
        assert_eq!(c, vec![vec![5, 8], vec![7, 14], vec![11, 15]]);
    }

    #[test]
    fn test_single_machine_is_order_independent() {
        let instance = FlowShopInstance::new("t", vec![vec![4], vec![2], vec![7]]).unwrap();
        for perm in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            assert_eq!(evaluate(&instance, &perm).unwrap(), 13);
        }
    }

    #[test]
    fn test_single_job_is_row_sum() {
        let instance = FlowShopInstance::new("t", vec![vec![3, 4, 5]]).unwrap();
        assert_eq!(evaluate(&instance, &[0]).unwrap(), 12);
    }

    #[test]
    fn test_rolling_row_matches_full_matrix() {
        let instance = random_instance(12, 5, 1);
        let mut rng = make_rng(Some(2));
        for _ in 0..50 {
            let perm = random_permutation(12, &mut rng);
            let c = completion_times(&instance, &perm).unwrap();
            let value = evaluate(&instance, &perm).unwrap();
            assert_eq!(value, c[11][4]);
            assert_eq!(value, evaluate(&instance, &perm).unwrap());
        }
    }

    #[test]
    fn test_lower_bounds_hold() {
        let instance = random_instance(9, 4, 3);
        let mut rng = make_rng(Some(4));
        for _ in 0..50 {
            let perm = random_permutation(9, &mut rng);
            let value = evaluate(&instance, &perm).unwrap();
            let first_job: u64 = instance.job_total(perm[0]);
            let machine_zero: u64 = perm.iter().map(|&j| instance.processing_time(j, 0) as u64).sum();
            assert!(value >= first_job);
            assert!(value >= machine_zero);
            assert!(value >= instance.lower_bound());
        }
    }

    #[test]
    fn test_invalid_candidates_are_rejected() {
        let instance = two_machine();
        for bad in [vec![0, 1], vec![0, 1, 1], vec![0, 1, 3], vec![0, 1, 2, 0]] {
            assert!(matches!(
                evaluate(&instance, &bad),
                Err(FlowShopError::InvalidCandidate(_))
            ));
        }
    }

    #[test]
    fn test_malformed_instances_are_rejected() {
        let no_machines = FlowShopInstance {
            num_machines: 0,
            processing_times: vec![vec![], vec![], vec![]],
            ..two_machine()
        };
        let missing_rows = FlowShopInstance {
            processing_times: vec![vec![5, 3]],
            ..two_machine()
        };

        for instance in [no_machines, missing_rows] {
            assert!(matches!(
                evaluate(&instance, &[0, 1, 2]),
                Err(FlowShopError::InvalidInstance(_))
            ));
            assert!(matches!(
                completion_times(&instance, &[0, 1, 2]),
                Err(FlowShopError::InvalidInstance(_))
            ));
            assert!(matches!(instance.makespan(&[0, 1, 2]), Err(FlowShopError::InvalidInstance(_))));
        }
    }

    #[test]
    fn test_schedule_operations() {
        let instance = two_machine();
        let ops = schedule(&instance, &[0, 1, 2]).unwrap();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], Operation { job: 0, machine: 0, start: 0, end: 5 });
        assert_eq!(ops[4], Operation { job: 1, machine: 1, start: 8, end: 14 });
        // operations never overlap on a machine
        for w in ops.windows(2).filter(|w| w[0].machine == w[1].machine) {
            assert!(w[0].end <= w[1].start);
        }
    }
}
