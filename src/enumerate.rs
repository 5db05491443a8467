//! Enumeration of alternative optimal assignments.
//!
//! An optimal dual pair `(u, v)` of the square lifting certifies which cells
//! can appear in *any* optimal assignment: exactly the tight ones,
//! `c[x, y] - u[x] - v[y] = 0`. Orienting tight cells into a bipartite
//! digraph — assignment arcs reversed — every alternative optimum is the
//! current one flipped along an alternating cycle, and all such cycles live
//! inside strongly connected components of that digraph.
//!
//! [`k_best_mappings`] walks this structure (Uno's partition scheme: emit
//! the flipped sibling, then recurse with the chosen arc forced
//! respectively forbidden) and decodes each optimal assignment of the
//! lifting down to a node mapping. Distinct assignments of the lifting can
//! collapse to the same mapping (permuting which zero-cost cell hosts an
//! erased node changes nothing), so mappings are deduplicated and `limit`
//! counts distinct mappings.

use crate::graph::Mapping;
use crate::lsap::{lift_to_lsap, lsap};
use crate::scc::{find_sccs, prune_cross_scc_edges};
use crate::Result;
use ndarray::Array2;
use std::collections::HashSet;

/// Slack below which a reduced cost counts as tight. Dual updates are sums
/// and differences of input costs, so rounding stays far below this.
const TIGHT_TOL: f64 = 1e-8;

/// Signed adjacency of the equality digraph: `-1` on assignment cells,
/// `+1` on other tight cells, `0` elsewhere.
pub fn equality_digraph(
    cl: &Array2<f64>,
    assignment: &[usize],
    u: &[f64],
    v: &[f64],
) -> Array2<i8> {
    let nn = cl.nrows();
    let mut gm = Array2::zeros((nn, nn));
    for x in 0..nn {
        for y in 0..nn {
            if assignment[x] == y {
                gm[[x, y]] = -1;
            } else if (cl[[x, y]] - u[x] - v[y]).abs() <= TIGHT_TOL {
                gm[[x, y]] = 1;
            }
        }
    }
    gm
}

/// First remaining non-assignment arc, if any.
fn first_free_arc(gm: &Array2<i8>) -> Option<(usize, usize)> {
    let (rows, cols) = gm.dim();
    for x in 0..rows {
        for y in 0..cols {
            if gm[[x, y]] == 1 {
                return Some((x, y));
            }
        }
    }
    None
}

/// Directed path from Y-node `from_y` back to X-node `to_x`, as combined
/// indices (Y offset by `nn`). Alternation is automatic: Y-nodes only exit
/// through their assignment arc, X-nodes only through free arcs.
fn alternating_path(gm: &Array2<i8>, from_y: usize, to_x: usize) -> Option<Vec<usize>> {
    let nn = gm.nrows();
    let start = nn + from_y;
    let mut pred = vec![usize::MAX; 2 * nn];
    let mut visited = vec![false; 2 * nn];
    let mut stack = vec![start];
    visited[start] = true;
    while let Some(node) = stack.pop() {
        if node == to_x {
            let mut path = vec![node];
            let mut cur = node;
            while cur != start {
                cur = pred[cur];
                path.push(cur);
            }
            path.reverse();
            return Some(path);
        }
        if node < nn {
            for y in 0..nn {
                let next = nn + y;
                if gm[[node, y]] == 1 && !visited[next] {
                    visited[next] = true;
                    pred[next] = node;
                    stack.push(next);
                }
            }
        } else {
            let y = node - nn;
            for x in 0..nn {
                if gm[[x, y]] == -1 && !visited[x] {
                    visited[x] = true;
                    pred[x] = node;
                    stack.push(x);
                }
            }
        }
    }
    None
}

/// Flip the assignment along the cycle closed by the arc from the path's
/// last X-node back to its first Y-node, updating both the permutation and
/// the arc orientations. Every touched cell is tight, so the new
/// assignment has the same cost as the old one.
fn flip_cycle(gm: &mut Array2<i8>, perm: &mut [usize], path: &[usize]) {
    let nn = gm.nrows();
    let mut pos = 1;
    while pos < path.len() {
        let x = path[pos];
        let y_old = path[pos - 1] - nn;
        let y_new = if pos + 1 < path.len() {
            path[pos + 1] - nn
        } else {
            path[0] - nn
        };
        gm[[x, y_old]] = 1;
        gm[[x, y_new]] = -1;
        perm[x] = y_new;
        pos += 2;
    }
}

/// Emit every alternative optimal assignment reachable in this subproblem.
/// Returns `false` once the consumer declines further output.
fn enumerate_rec(
    gm: &mut Array2<i8>,
    perm: &[usize],
    emit: &mut dyn FnMut(&[usize]) -> bool,
) -> bool {
    loop {
        let sccs = find_sccs(gm);
        prune_cross_scc_edges(gm, &sccs);
        let Some((x, y)) = first_free_arc(gm) else {
            return true;
        };
        let Some(path) = alternating_path(gm, y, x) else {
            // Tolerance artifact: a tight arc with no alternating cycle
            // cannot carry an alternative optimum, drop it.
            gm[[x, y]] = 0;
            continue;
        };

        // Sibling containing (x, y): flip, emit, then recurse with both
        // endpoints fixed (their other arcs removed).
        let mut forced = gm.clone();
        let mut sibling = perm.to_vec();
        flip_cycle(&mut forced, &mut sibling, &path);
        if !emit(&sibling) {
            return false;
        }
        for col in 0..forced.ncols() {
            forced[[x, col]] = 0;
        }
        for row in 0..forced.nrows() {
            forced[[row, y]] = 0;
        }
        if !enumerate_rec(&mut forced, &sibling, emit) {
            return false;
        }

        // Matchings avoiding (x, y): forbid the arc and keep going here.
        gm[[x, y]] = 0;
    }
}

/// Up to `limit` distinct optimal mappings of the `(n+1)×(m+1)` ε-augmented
/// cost matrix `c`, the assignment solver's own solution first.
/// `None` enumerates every optimum.
///
/// Every returned mapping is consistent, owned by the caller, and achieves
/// the same linear cost as the first one.
pub fn k_best_mappings(c: &Array2<f64>, limit: Option<usize>) -> Result<Vec<Mapping>> {
    assert!(
        c.nrows() >= 1 && c.ncols() >= 1,
        "expected an (n+1)×(m+1) matrix with its ε row and column"
    );
    let n = c.nrows() - 1;
    let m = c.ncols() - 1;
    if limit == Some(0) {
        return Ok(Vec::new());
    }
    if n + m == 0 {
        return Ok(vec![Mapping::full_erasure(0, 0)]);
    }

    let cl = lift_to_lsap(c);
    let sol = lsap(&cl)?;
    let mut gm = equality_digraph(&cl, &sol.assignment, &sol.u, &sol.v);

    let first = Mapping::from_lifted(&sol.assignment, n, m);
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    seen.insert(first.fwd.clone());
    let mut out = vec![first];
    if limit.is_some_and(|k| out.len() >= k) {
        return Ok(out);
    }

    enumerate_rec(&mut gm, &sol.assignment, &mut |lifted: &[usize]| {
        let mapping = Mapping::from_lifted(lifted, n, m);
        if seen.insert(mapping.fwd.clone()) {
            out.push(mapping);
        }
        limit.map_or(true, |k| out.len() < k)
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::mapping_linear_cost;
    use ndarray::array;

    #[test]
    fn two_equal_substitutions_give_two_mappings() {
        // Both permutations of a 2×2 substitution block cost the same;
        // erasure is priced out.
        let c = array![
            [1.0, 1.0, 10.0],
            [1.0, 1.0, 10.0],
            [10.0, 10.0, 0.0]
        ];
        let mappings = k_best_mappings(&c, None).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_ne!(mappings[0].fwd, mappings[1].fwd);
        for mapping in &mappings {
            assert!(mapping.is_consistent());
            assert!((mapping_linear_cost(&c, mapping) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn symmetric_three_block_yields_all_six_permutations() {
        let mut c = Array2::from_elem((4, 4), 1.0);
        c[[3, 3]] = 0.0;
        for k in 0..3 {
            c[[k, 3]] = 10.0;
            c[[3, k]] = 10.0;
        }
        let mappings = k_best_mappings(&c, None).unwrap();
        assert_eq!(mappings.len(), 6);
        for mapping in &mappings {
            assert!(mapping.fwd.iter().all(|&j| j < 3), "no erasures expected");
        }
    }

    #[test]
    fn limit_caps_the_enumeration() {
        let mut c = Array2::from_elem((4, 4), 1.0);
        c[[3, 3]] = 0.0;
        for k in 0..3 {
            c[[k, 3]] = 10.0;
            c[[3, k]] = 10.0;
        }
        let mappings = k_best_mappings(&c, Some(4)).unwrap();
        assert_eq!(mappings.len(), 4);
        let unique: std::collections::HashSet<_> =
            mappings.iter().map(|m| m.fwd.clone()).collect();
        assert_eq!(unique.len(), 4, "no duplicates");
    }

    #[test]
    fn unique_optimum_is_returned_alone() {
        let c = array![[0.0, 5.0, 9.0], [5.0, 0.0, 9.0], [9.0, 9.0, 0.0]];
        let mappings = k_best_mappings(&c, None).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].fwd, vec![0, 1]);
    }

    #[test]
    fn erasure_and_substitution_optima_coexist() {
        // Substituting costs 2, deleting + inserting also costs 2.
        let c = array![[2.0, 1.0], [1.0, 0.0]];
        let mappings = k_best_mappings(&c, None).unwrap();
        assert_eq!(mappings.len(), 2);
        for mapping in &mappings {
            assert!((mapping_linear_cost(&c, mapping) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_problem_has_the_empty_mapping() {
        let c = array![[0.0]];
        let mappings = k_best_mappings(&c, Some(5)).unwrap();
        assert_eq!(mappings.len(), 1);
        assert!(mappings[0].fwd.is_empty());
    }
}
