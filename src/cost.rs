//! Edit-cost callbacks and LSAPE cost matrices.
//!
//! The [`EditCost`] trait is the single point where attribute semantics enter
//! the engine: six non-negative costs for substituting, deleting and
//! inserting nodes and edges. Everything downstream works on dense
//! `(n+1)×(m+1)` matrices whose last row and column carry the insertion and
//! deletion costs (the ε row/column of the LSAPE formulation).
//!
//! Two matrix builders are provided:
//!
//! * [`node_cost_matrix`] — node terms only; the quadratic refiner adds edge
//!   terms through its gradient.
//! * [`star_cost_matrix`] — each substitution cell additionally pays the
//!   optimal assignment between the incident-edge stars of the two nodes
//!   (Riesen's bipartite approximation).
//!
//! [`ged_from_mapping`] scores a complete correspondence; it is the oracle
//! the multistart reduction minimizes.

use crate::graph::{Graph, Mapping};
use crate::lsap::lsape;
use crate::{Error, Result};
use ndarray::Array2;

/// Edit costs over node attributes `N` and edge attributes `E`.
///
/// Implementations must return finite non-negative values and be pure with
/// respect to their arguments; the engine may call them concurrently.
pub trait EditCost<N, E> {
    fn node_sub(&self, a: &N, b: &N) -> f64;
    fn node_del(&self, a: &N) -> f64;
    fn node_ins(&self, b: &N) -> f64;
    fn edge_sub(&self, a: &E, b: &E) -> f64;
    fn edge_del(&self, a: &E) -> f64;
    fn edge_ins(&self, b: &E) -> f64;
}

/// Constant edit costs; substitution is free between equal attributes.
#[derive(Debug, Clone, Copy)]
pub struct ConstantCost {
    pub node_sub: f64,
    pub node_del: f64,
    pub node_ins: f64,
    pub edge_sub: f64,
    pub edge_del: f64,
    pub edge_ins: f64,
}

impl ConstantCost {
    /// All six operations cost 1.
    pub fn unit() -> Self {
        Self {
            node_sub: 1.0,
            node_del: 1.0,
            node_ins: 1.0,
            edge_sub: 1.0,
            edge_del: 1.0,
            edge_ins: 1.0,
        }
    }
}

impl<N: PartialEq, E: PartialEq> EditCost<N, E> for ConstantCost {
    fn node_sub(&self, a: &N, b: &N) -> f64 {
        if a == b {
            0.0
        } else {
            self.node_sub
        }
    }
    fn node_del(&self, _: &N) -> f64 {
        self.node_del
    }
    fn node_ins(&self, _: &N) -> f64 {
        self.node_ins
    }
    fn edge_sub(&self, a: &E, b: &E) -> f64 {
        if a == b {
            0.0
        } else {
            self.edge_sub
        }
    }
    fn edge_del(&self, _: &E) -> f64 {
        self.edge_del
    }
    fn edge_ins(&self, _: &E) -> f64 {
        self.edge_ins
    }
}

fn screened(c: Array2<f64>) -> Result<Array2<f64>> {
    for &v in c.iter() {
        if !v.is_finite() {
            return Err(Error::NonFiniteCost(v));
        }
    }
    Ok(c)
}

/// Node-only `(n+1)×(m+1)` LSAPE cost matrix.
pub fn node_cost_matrix<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
) -> Result<Array2<f64>> {
    let n = g1.size();
    let m = g2.size();
    let mut c = Array2::zeros((n + 1, m + 1));
    for i in 0..n {
        for j in 0..m {
            c[[i, j]] = cost.node_sub(g1.node(i), g2.node(j));
        }
    }
    for i in 0..n {
        c[[i, m]] = cost.node_del(g1.node(i));
    }
    for j in 0..m {
        c[[n, j]] = cost.node_ins(g2.node(j));
    }
    screened(c)
}

/// Optimal assignment value between the incident-edge stars of two nodes.
///
/// The local matrix is `(deg(v1)+1)×(deg(v2)+1)`: edge substitutions in the
/// body, edge deletions and insertions on the borders. Its optimum is read
/// off the dual potentials of the local solve.
fn star_distance<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    v1: usize,
    v2: usize,
) -> Result<f64> {
    let d1 = g1.degree(v1);
    let d2 = g2.degree(v2);
    let mut local = Array2::zeros((d1 + 1, d2 + 1));
    for (a, (_, e1)) in g1.incident(v1).enumerate() {
        for (b, (_, e2)) in g2.incident(v2).enumerate() {
            local[[a, b]] = cost.edge_sub(e1, e2);
        }
        local[[a, d2]] = cost.edge_del(e1);
    }
    for (b, (_, e2)) in g2.incident(v2).enumerate() {
        local[[d1, b]] = cost.edge_ins(e2);
    }
    let sol = lsape(&local)?;
    Ok(sol.value())
}

/// Star-augmented `(n+1)×(m+1)` LSAPE cost matrix.
///
/// Substitution cells pay the node substitution plus the local edge-star
/// assignment; deletion and insertion cells accumulate the cost of erasing
/// or creating every incident edge.
pub fn star_cost_matrix<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
) -> Result<Array2<f64>> {
    let n = g1.size();
    let m = g2.size();
    let mut c = Array2::zeros((n + 1, m + 1));
    for i in 0..n {
        for j in 0..m {
            c[[i, j]] = cost.node_sub(g1.node(i), g2.node(j)) + star_distance(g1, g2, cost, i, j)?;
        }
    }
    for i in 0..n {
        let edges: f64 = g1.incident(i).map(|(_, e)| cost.edge_del(e)).sum();
        c[[i, m]] = cost.node_del(g1.node(i)) + edges;
    }
    for j in 0..m {
        let edges: f64 = g2.incident(j).map(|(_, e)| cost.edge_ins(e)).sum();
        c[[n, j]] = cost.node_ins(g2.node(j)) + edges;
    }
    screened(c)
}

/// Linear cost of a mapping against an `(n+1)×(m+1)` matrix:
/// the substitution/deletion cells picked by `fwd` plus the insertion cells
/// of unmatched columns.
pub fn mapping_linear_cost(c: &Array2<f64>, mapping: &Mapping) -> f64 {
    let n = mapping.n();
    let mut sum = 0.0;
    for (i, &j) in mapping.fwd.iter().enumerate() {
        sum += c[[i, j]];
    }
    for (j, &i) in mapping.rev.iter().enumerate() {
        if i >= n {
            sum += c[[n, j]];
        }
    }
    sum
}

/// Exact edit cost of a node correspondence.
///
/// Nodes pay substitution, deletion or insertion according to the mapping.
/// Each edge of the first graph pays substitution when its image is an edge
/// of the second, deletion otherwise; edges of the second graph with no
/// preimage pay insertion. Undirected edges are counted once.
pub fn ged_from_mapping<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    mapping: &Mapping,
) -> Result<f64> {
    let n = g1.size();
    let m = g2.size();
    let mut total = 0.0;
    for (i, &j) in mapping.fwd.iter().enumerate() {
        total += if j < m {
            cost.node_sub(g1.node(i), g2.node(j))
        } else {
            cost.node_del(g1.node(i))
        };
    }
    for (j, &i) in mapping.rev.iter().enumerate() {
        if i >= n {
            total += cost.node_ins(g2.node(j));
        }
    }
    for (i, k, e1) in g1.edges() {
        let j = mapping.fwd[i];
        let l = mapping.fwd[k];
        total += match (j < m, l < m) {
            (true, true) => match g2.edge_between(j, l) {
                Some(e2) => cost.edge_sub(e1, e2),
                None => cost.edge_del(e1),
            },
            _ => cost.edge_del(e1),
        };
    }
    for (j, l, e2) in g2.edges() {
        let i = mapping.rev[j];
        let k = mapping.rev[l];
        let substituted = i < n && k < n && g1.edge_between(i, k).is_some();
        if !substituted {
            total += cost.edge_ins(e2);
        }
    }
    if !total.is_finite() {
        return Err(Error::NonFiniteCost(total));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_pair() -> (Graph<u8, u8>, Graph<u8, u8>) {
        // g1: 0-1 path, g2: single node matching g1's node 0.
        let mut g1 = Graph::new(false);
        let a = g1.add_node(0);
        let b = g1.add_node(1);
        g1.add_edge(a, b, 9);
        let mut g2 = Graph::new(false);
        g2.add_node(0);
        (g1, g2)
    }

    #[test]
    fn node_matrix_layout() {
        let (g1, g2) = labeled_pair();
        let c = node_cost_matrix(&g1, &g2, &ConstantCost::unit()).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c[[0, 0]], 0.0); // same label
        assert_eq!(c[[1, 0]], 1.0); // substitution
        assert_eq!(c[[0, 1]], 1.0); // deletion
        assert_eq!(c[[2, 0]], 1.0); // insertion
        assert_eq!(c[[2, 1]], 0.0); // ε corner
    }

    #[test]
    fn star_matrix_charges_incident_edges() {
        let (g1, g2) = labeled_pair();
        let c = star_cost_matrix(&g1, &g2, &ConstantCost::unit()).unwrap();
        // Substituting node 0 keeps its label but must delete its one edge.
        assert_eq!(c[[0, 0]], 1.0);
        // Deleting node 0 removes the node and the incident edge.
        assert_eq!(c[[0, 1]], 2.0);
        // Inserting the isolated node of g2 has no edge term.
        assert_eq!(c[[2, 0]], 1.0);
    }

    #[test]
    fn mapping_cost_counts_each_operation_once() {
        let (g1, g2) = labeled_pair();
        // Map node 0 to node 0, delete node 1 (and with it the edge).
        let mapping = Mapping {
            fwd: vec![0, 1],
            rev: vec![0],
        };
        let ged = ged_from_mapping(&g1, &g2, &ConstantCost::unit(), &mapping).unwrap();
        assert_eq!(ged, 2.0); // node deletion + edge deletion
    }

    #[test]
    fn identical_graphs_cost_zero() {
        let (g1, _) = labeled_pair();
        let mapping = Mapping {
            fwd: vec![0, 1],
            rev: vec![0, 1],
        };
        let ged = ged_from_mapping(&g1, &g1, &ConstantCost::unit(), &mapping).unwrap();
        assert_eq!(ged, 0.0);
    }

    #[test]
    fn non_finite_costs_are_rejected() {
        struct Broken;
        impl EditCost<u8, u8> for Broken {
            fn node_sub(&self, _: &u8, _: &u8) -> f64 {
                f64::NAN
            }
            fn node_del(&self, _: &u8) -> f64 {
                1.0
            }
            fn node_ins(&self, _: &u8) -> f64 {
                1.0
            }
            fn edge_sub(&self, _: &u8, _: &u8) -> f64 {
                1.0
            }
            fn edge_del(&self, _: &u8) -> f64 {
                1.0
            }
            fn edge_ins(&self, _: &u8) -> f64 {
                1.0
            }
        }
        let (g1, g2) = labeled_pair();
        assert!(matches!(
            node_cost_matrix(&g1, &g2, &Broken),
            Err(Error::NonFiniteCost(_))
        ));
    }
}
