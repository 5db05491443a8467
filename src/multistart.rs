//! Multistart refinement: fan out over seed mappings, keep the best.
//!
//! Seeds are independent, so the driver can hand them to rayon's
//! work-stealing pool; refinement times vary wildly with the seed, which is
//! exactly what dynamic scheduling absorbs. The reduction is deterministic
//! regardless of completion order: candidates compare by `(cost, seed
//! index)`, so ties always go to the earliest seed.

use crate::graph::{Graph, Mapping};
use crate::ipfp::Refined;
use crate::{Error, Result};
use log::debug;
use rayon::prelude::*;

/// The refinement contract consumed by [`refine_seeds`]: improve a seed
/// mapping, and price an arbitrary mapping. Implementations keep all
/// mutable state per call so one instance serves every seed concurrently.
pub trait Refine<N, E>: Sync {
    fn better_mapping(
        &self,
        g1: &Graph<N, E>,
        g2: &Graph<N, E>,
        seed: &Mapping,
    ) -> Result<Refined>;

    fn mapping_cost(&self, g1: &Graph<N, E>, g2: &Graph<N, E>, mapping: &Mapping) -> Result<f64>;
}

/// Winner of a multistart run.
#[derive(Debug, Clone)]
pub struct Best {
    pub cost: f64,
    pub mapping: Mapping,
    pub converged: bool,
}

fn run_one<N, E, R: Refine<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    refiner: &R,
    index: usize,
    seed: &Mapping,
) -> Result<(f64, usize, Refined)> {
    let refined = refiner.better_mapping(g1, g2, seed)?;
    let cost = refiner.mapping_cost(g1, g2, &refined.mapping)?;
    Ok((cost, index, refined))
}

/// Refine every seed and return the cheapest outcome.
///
/// A seed whose refinement fails numerically is dropped; only when every
/// seed fails does the last failure surface. Ties on cost resolve to the
/// lowest seed index, in the parallel mode too.
pub fn refine_seeds<N, E, R>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    seeds: &[Mapping],
    refiner: &R,
    parallel: bool,
) -> Result<Best>
where
    N: Sync,
    E: Sync,
    R: Refine<N, E>,
{
    if seeds.is_empty() {
        return Err(Error::BadSeedCount(0));
    }
    debug!(
        "multistart: {} seeds, {} refinement",
        seeds.len(),
        if parallel { "parallel" } else { "sequential" }
    );

    let outcomes: Vec<Result<(f64, usize, Refined)>> = if parallel {
        seeds
            .par_iter()
            .enumerate()
            .map(|(index, seed)| run_one(g1, g2, refiner, index, seed))
            .collect()
    } else {
        seeds
            .iter()
            .enumerate()
            .map(|(index, seed)| run_one(g1, g2, refiner, index, seed))
            .collect()
    };

    let mut best: Option<(f64, usize, Refined)> = None;
    let mut last_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(candidate) => {
                let wins = best.as_ref().map_or(true, |incumbent| {
                    match candidate.0.total_cmp(&incumbent.0) {
                        std::cmp::Ordering::Less => true,
                        std::cmp::Ordering::Equal => candidate.1 < incumbent.1,
                        std::cmp::Ordering::Greater => false,
                    }
                });
                if wins {
                    best = Some(candidate);
                }
            }
            Err(error) => last_error = Some(error),
        }
    }

    match best {
        Some((cost, index, refined)) => {
            debug!("multistart: best cost {} from seed {}", cost, index);
            Ok(Best {
                cost,
                mapping: refined.mapping,
                converged: refined.converged,
            })
        }
        None => Err(last_error.expect("no seeds succeeded, so at least one failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A refiner that returns seeds untouched, priced by a fixed table,
    /// and fails on request.
    struct Scripted {
        costs: Vec<f64>,
        fail_on: Option<usize>,
    }

    impl Refine<u8, u8> for Scripted {
        fn better_mapping(
            &self,
            _: &Graph<u8, u8>,
            _: &Graph<u8, u8>,
            seed: &Mapping,
        ) -> Result<Refined> {
            let index = seed.fwd[0];
            if self.fail_on == Some(index) {
                return Err(Error::NonFiniteCost(f64::NAN));
            }
            Ok(Refined {
                mapping: seed.clone(),
                converged: true,
                iterations: 1,
            })
        }

        fn mapping_cost(
            &self,
            _: &Graph<u8, u8>,
            _: &Graph<u8, u8>,
            mapping: &Mapping,
        ) -> Result<f64> {
            Ok(self.costs[mapping.fwd[0]])
        }
    }

    fn graphs() -> (Graph<u8, u8>, Graph<u8, u8>) {
        let mut g = Graph::new(false);
        g.add_node(0);
        let mut h = Graph::new(false);
        for _ in 0..8 {
            h.add_node(0);
        }
        (g, h)
    }

    fn seed(index: usize) -> Mapping {
        let mut rev = vec![1; 8];
        rev[index] = 0;
        Mapping {
            fwd: vec![index],
            rev,
        }
    }

    #[test]
    fn picks_the_cheapest_seed() {
        let (g, h) = graphs();
        let refiner = Scripted {
            costs: vec![5.0, 3.0, 9.0, 4.0, 8.0, 8.0, 8.0, 8.0],
            fail_on: None,
        };
        let seeds: Vec<Mapping> = (0..4).map(seed).collect();
        for parallel in [false, true] {
            let best = refine_seeds(&g, &h, &seeds, &refiner, parallel).unwrap();
            assert_eq!(best.cost, 3.0);
            assert_eq!(best.mapping.fwd, vec![1]);
        }
    }

    #[test]
    fn tie_goes_to_the_lowest_seed_index() {
        let (g, h) = graphs();
        let refiner = Scripted {
            costs: vec![7.0, 2.0, 2.0, 2.0, 7.0, 7.0, 7.0, 7.0],
            fail_on: None,
        };
        let seeds: Vec<Mapping> = (0..6).map(seed).collect();
        for parallel in [false, true] {
            let best = refine_seeds(&g, &h, &seeds, &refiner, parallel).unwrap();
            assert_eq!(best.mapping.fwd, vec![1], "parallel={}", parallel);
        }
    }

    #[test]
    fn failing_seed_is_dropped() {
        let (g, h) = graphs();
        let refiner = Scripted {
            costs: vec![5.0, 1.0, 6.0, 6.0, 6.0, 6.0, 6.0, 6.0],
            fail_on: Some(1),
        };
        let seeds: Vec<Mapping> = (0..3).map(seed).collect();
        let best = refine_seeds(&g, &h, &seeds, &refiner, true).unwrap();
        assert_eq!(best.cost, 5.0, "cheapest surviving seed wins");
    }

    #[test]
    fn all_seeds_failing_surfaces_the_error() {
        let (g, h) = graphs();
        let refiner = Scripted {
            costs: vec![1.0; 8],
            fail_on: Some(0),
        };
        let seeds = vec![seed(0)];
        assert!(matches!(
            refine_seeds(&g, &h, &seeds, &refiner, false),
            Err(Error::NonFiniteCost(_))
        ));
    }

    #[test]
    fn no_seeds_is_a_budget_error() {
        let (g, h) = graphs();
        let refiner = Scripted {
            costs: vec![1.0; 8],
            fail_on: None,
        };
        assert!(matches!(
            refine_seeds(&g, &h, &[], &refiner, false),
            Err(Error::BadSeedCount(0))
        ));
    }
}
