//! Integer Projected Fixed Point refinement of a node mapping.
//!
//! IPFP (Leordeanu, Hebert & Sukthankar, 2009) minimizes the quadratic
//! assignment objective
//!
//! ```text
//! f(X) = ⟨C, X⟩ + ⟨D(X), X⟩
//! ```
//!
//! over doubly (sub)stochastic matrices on the ε-augmented `(n+1)×(m+1)`
//! lattice, where `C` carries node costs only and `D(X)` accumulates the
//! edge substitution/deletion/insertion costs induced by `X`. Each
//! iteration linearizes `f` at the current point, solves the linear
//! subproblem exactly (an ε-augmented assignment, yielding a binary extreme
//! point of the polytope), and either jumps to that vertex or performs the
//! one-dimensional Newton step along the segment towards it. A final
//! assignment on `1 − X` projects the continuous iterate back to a mapping.
//!
//! The scheme is the conditional-gradient loop of Frank-Wolfe solvers:
//! linearize, optimize the surrogate, line-search the blend. Applied to
//! graph edit distance it is the local search of Bougleux et al. (2017),
//! "Graph edit distance as a quadratic assignment problem".

use crate::cost::{ged_from_mapping, mapping_linear_cost, node_cost_matrix, EditCost};
use crate::graph::{Graph, Mapping};
use crate::lsap::lsape;
use crate::{Error, Result};
use log::trace;
use ndarray::Array2;

/// Tuning knobs of the refinement loop.
#[derive(Debug, Clone, Copy)]
pub struct Ipfp {
    /// Hard cap on linearizations; hitting it is normal termination.
    pub max_iter: usize,
    /// Relative-improvement threshold under which the loop stops.
    pub tol: f64,
}

impl Default for Ipfp {
    fn default() -> Self {
        Self {
            max_iter: 40,
            tol: 1e-3,
        }
    }
}

/// A refined mapping plus how the loop ended.
#[derive(Debug, Clone)]
pub struct Refined {
    pub mapping: Mapping,
    /// `false` when the iteration cap cut the descent short.
    pub converged: bool,
    pub iterations: usize,
}

/// Sparse view of a relaxed assignment: `(i, k, weight)` for every
/// positive cell, ε rows/columns included.
fn support_of(x: &Array2<f64>) -> Vec<(usize, usize, f64)> {
    let mut support = Vec::new();
    for ((i, k), &w) in x.indexed_iter() {
        if w > 0.0 {
            support.push((i, k, w));
        }
    }
    support
}

fn support_of_mapping(mapping: &Mapping) -> Vec<(usize, usize, f64)> {
    let n = mapping.n();
    let mut support = Vec::with_capacity(n + mapping.m());
    for (i, &j) in mapping.fwd.iter().enumerate() {
        support.push((i, j, 1.0));
    }
    for (j, &i) in mapping.rev.iter().enumerate() {
        if i >= n {
            support.push((n, j, 1.0));
        }
    }
    support
}

fn indicator(mapping: &Mapping) -> Array2<f64> {
    let mut x = Array2::zeros((mapping.n() + 1, mapping.m() + 1));
    for &(i, k, w) in support_of_mapping(mapping).iter() {
        x[[i, k]] = w;
    }
    x
}

fn inner(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Edge-cost quadratic form `D(X)`, evaluated from the sparse support of
/// `X`. Cell `(j, l)` accumulates, over every mapped pair `(i, k)`, the
/// cost of carrying the g1-edge `(i, j)` onto the g2-edge `(k, l)` —
/// substitution when both exist, deletion/insertion when only one does.
/// ε indices act as "no edge". Undirected pairs are halved since the
/// support enumerates both orientations.
fn quadratic_term<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    support: &[(usize, usize, f64)],
) -> Array2<f64> {
    let n = g1.size();
    let m = g2.size();
    let undirected = !(g1.is_directed() && g2.is_directed());
    let mut xkd = Array2::zeros((n + 1, m + 1));
    for j in 0..=n {
        for l in 0..=m {
            let mut acc = 0.0;
            for &(i, k, w) in support {
                let eps_i = i >= n;
                let eps_k = k >= m;
                // A node pairs with itself through no edge at all.
                if (i == j && !eps_i) || (k == l && !eps_k) {
                    continue;
                }
                let e1 = if !eps_i && j < n {
                    g1.edge_between(i, j)
                } else {
                    None
                };
                let e2 = if !eps_k && l < m {
                    g2.edge_between(k, l)
                } else {
                    None
                };
                let edge_cost = match (e1, e2) {
                    (Some(a), Some(b)) => cost.edge_sub(a, b),
                    (Some(a), None) => cost.edge_del(a),
                    (None, Some(b)) => cost.edge_ins(b),
                    (None, None) => continue,
                };
                acc += edge_cost * w;
            }
            if undirected {
                acc *= 0.5;
            }
            xkd[[j, l]] = acc;
        }
    }
    xkd
}

impl Ipfp {
    /// Refine `seed` towards a local minimum of the quadratic objective and
    /// return the projected mapping.
    ///
    /// When one graph is empty the all-ε mapping is the only point of the
    /// polytope and is returned as-is. The refined mapping is never worse
    /// than the seed: if the final projection scores above the seed, the
    /// seed is kept.
    pub fn refine<N, E, C: EditCost<N, E>>(
        &self,
        g1: &Graph<N, E>,
        g2: &Graph<N, E>,
        cost: &C,
        seed: &Mapping,
    ) -> Result<Refined> {
        let n = g1.size();
        let m = g2.size();
        if seed.n() != n || seed.m() != m {
            return Err(Error::SeedShapeMismatch(seed.n(), seed.m(), n, m));
        }
        if n == 0 || m == 0 {
            return Ok(Refined {
                mapping: Mapping::full_erasure(n, m),
                converged: true,
                iterations: 0,
            });
        }

        let c = node_cost_matrix(g1, g2, cost)?;
        let mut xk = indicator(seed);
        let mut lterm = inner(&c, &xk);
        let xkd0 = quadratic_term(g1, g2, cost, &support_of(&xk));
        let mut s = vec![inner(&xkd0, &xk) + lterm];
        let mut r: Vec<f64> = Vec::new();

        let mut converged = false;
        let mut k = 0;
        while k < self.max_iter {
            // Gradient direction: the exact optimum of the linearized
            // objective is a binary extreme point of the polytope.
            let xkd = quadratic_term(g1, g2, cost, &support_of(&xk));
            let gradient = &xkd * 2.0 + &c;
            let b = lsape(&gradient)?.into_mapping();
            r.push(mapping_linear_cost(&gradient, &b));

            let old_lterm = lterm;
            lterm = mapping_linear_cost(&c, &b);
            let bkd = quadratic_term(g1, g2, cost, &support_of_mapping(&b));
            s.push(mapping_linear_cost(&bkd, &b) + lterm);

            let alpha = r[k] - 2.0 * s[k] + old_lterm;
            let beta = s[k + 1] + s[k] - r[k] - old_lterm;
            let t0 = if beta > 1e-6 {
                -alpha / (2.0 * beta)
            } else {
                f64::INFINITY
            };
            trace!(
                "ipfp iter {}: S={:.6} R={:.6} alpha={:.3e} beta={:.3e} t0={:.3}",
                k,
                s[k + 1],
                r[k],
                alpha,
                beta,
                t0
            );

            let keep_going = if r[k] < 1e-4 {
                alpha.abs() > self.tol
            } else {
                (alpha / r[k]).abs() > self.tol
            };

            if beta < 1e-5 || t0 >= 1.0 {
                xk = indicator(&b);
            } else {
                // Minimum of the parabola along [Xk, b] lies inside the
                // segment: blend instead of jumping.
                let bmat = indicator(&b);
                xk = &xk + &((bmat - &xk) * t0);
                s[k + 1] = s[k] - alpha * alpha / (4.0 * beta);
                lterm = inner(&c, &xk);
            }

            k += 1;
            if !keep_going {
                converged = true;
                break;
            }
        }

        let last = *s.last().expect("cost sequence is never empty");
        if !last.is_finite() {
            return Err(Error::NonFiniteCost(last));
        }

        // Project the (possibly fractional) iterate back to a mapping:
        // the assignment closest to Xk maximizes ⟨X, Xk⟩.
        let ones = Array2::from_elem((n + 1, m + 1), 1.0);
        let projected = lsape(&(ones - &xk))?.into_mapping();

        let seed_cost = ged_from_mapping(g1, g2, cost, seed)?;
        let refined_cost = ged_from_mapping(g1, g2, cost, &projected)?;
        let mapping = if refined_cost <= seed_cost {
            projected
        } else {
            seed.clone()
        };
        Ok(Refined {
            mapping,
            converged,
            iterations: k,
        })
    }

    /// Quadratic objective of a (binary) mapping: node terms plus induced
    /// edge terms. Agrees with [`ged_from_mapping`] up to rounding; the two
    /// take entirely different paths to the same quantity.
    pub fn objective_of<N, E, C: EditCost<N, E>>(
        g1: &Graph<N, E>,
        g2: &Graph<N, E>,
        cost: &C,
        mapping: &Mapping,
    ) -> Result<f64> {
        let c = node_cost_matrix(g1, g2, cost)?;
        let support = support_of_mapping(mapping);
        let xkd = quadratic_term(g1, g2, cost, &support);
        Ok(mapping_linear_cost(&c, mapping) + mapping_linear_cost(&xkd, mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::ConstantCost;

    fn triangle() -> Graph<u8, u8> {
        let mut g = Graph::new(false);
        let a = g.add_node(0);
        let b = g.add_node(0);
        let c = g.add_node(0);
        g.add_edge(a, b, 0);
        g.add_edge(b, c, 0);
        g.add_edge(a, c, 0);
        g
    }

    fn path() -> Graph<u8, u8> {
        let mut g = Graph::new(false);
        let a = g.add_node(0);
        let b = g.add_node(0);
        let c = g.add_node(0);
        g.add_edge(a, b, 0);
        g.add_edge(b, c, 0);
        g
    }

    #[test]
    fn objective_matches_exact_mapping_cost() {
        let g1 = triangle();
        let g2 = path();
        let cost = ConstantCost::unit();
        // A handful of mappings, including erasing ones.
        let mappings = [
            Mapping {
                fwd: vec![0, 1, 2],
                rev: vec![0, 1, 2],
            },
            Mapping {
                fwd: vec![2, 1, 0],
                rev: vec![2, 1, 0],
            },
            Mapping {
                fwd: vec![0, 3, 1],
                rev: vec![0, 2, 3],
            },
            Mapping::full_erasure(3, 3),
        ];
        for mapping in &mappings {
            let direct = ged_from_mapping(&g1, &g2, &cost, mapping).unwrap();
            let quadratic = Ipfp::objective_of(&g1, &g2, &cost, mapping).unwrap();
            assert!(
                (direct - quadratic).abs() < 1e-9,
                "direct={} quadratic={} for {:?}",
                direct,
                quadratic,
                mapping
            );
        }
    }

    #[test]
    fn refine_never_worsens_the_seed() {
        let g1 = triangle();
        let g2 = path();
        let cost = ConstantCost::unit();
        let seed = Mapping {
            fwd: vec![2, 0, 1],
            rev: vec![1, 2, 0],
        };
        let seed_cost = ged_from_mapping(&g1, &g2, &cost, &seed).unwrap();
        let refined = Ipfp::default().refine(&g1, &g2, &cost, &seed).unwrap();
        let refined_cost = ged_from_mapping(&g1, &g2, &cost, &refined.mapping).unwrap();
        assert!(refined_cost <= seed_cost + 1e-9);
        assert!(refined.mapping.is_consistent());
    }

    #[test]
    fn triangle_to_path_refines_to_one_edge_deletion() {
        let g1 = triangle();
        let g2 = path();
        let cost = ConstantCost::unit();
        let seed = Mapping {
            fwd: vec![0, 1, 2],
            rev: vec![0, 1, 2],
        };
        let refined = Ipfp::default().refine(&g1, &g2, &cost, &seed).unwrap();
        let refined_cost = ged_from_mapping(&g1, &g2, &cost, &refined.mapping).unwrap();
        assert!(
            (refined_cost - 1.0).abs() < 1e-9,
            "expected the single edge deletion, got {}",
            refined_cost
        );
    }

    #[test]
    fn identical_graphs_refine_to_zero() {
        let g = triangle();
        let cost = ConstantCost::unit();
        let seed = Mapping {
            fwd: vec![1, 2, 0],
            rev: vec![2, 0, 1],
        };
        let refined = Ipfp::default().refine(&g, &g, &cost, &seed).unwrap();
        let refined_cost = ged_from_mapping(&g, &g, &cost, &refined.mapping).unwrap();
        assert_eq!(refined_cost, 0.0);
    }

    #[test]
    fn empty_side_short_circuits() {
        let g1: Graph<u8, u8> = Graph::new(false);
        let g2 = triangle();
        let seed = Mapping::full_erasure(0, 3);
        let refined = Ipfp::default()
            .refine(&g1, &g2, &ConstantCost::unit(), &seed)
            .unwrap();
        assert_eq!(refined.iterations, 0);
        assert!(refined.converged);
        assert_eq!(refined.mapping.rev, vec![0, 0, 0]);
    }

    #[test]
    fn seed_shape_is_validated() {
        let g1 = triangle();
        let g2 = path();
        let seed = Mapping::full_erasure(2, 3);
        let err = Ipfp::default().refine(&g1, &g2, &ConstantCost::unit(), &seed);
        assert!(matches!(err, Err(Error::SeedShapeMismatch(2, 3, 3, 3))));
    }
}
