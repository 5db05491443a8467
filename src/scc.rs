//! Strongly connected components of a bipartite digraph.
//!
//! The digraph lives on `X ∪ Y` and is given as a signed matrix over
//! `X × Y`: `+1` is an arc `x → y`, `-1` an arc `y → x`, `0` no arc. In the
//! enumeration pipeline, `-1` marks the arcs of the current assignment and
//! `+1` the remaining tight cells of the reduced cost.
//!
//! Tarjan runs iteratively with an explicit frame stack; traversal state is
//! per call. Y-nodes are addressed at an offset of `nx` inside the combined
//! index space.

use ndarray::Array2;

/// Membership of a strongly connected component, one flag per side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BipartiteScc {
    pub u: Vec<bool>,
    pub v: Vec<bool>,
}

impl BipartiteScc {
    fn new(nx: usize, ny: usize) -> Self {
        Self {
            u: vec![false; nx],
            v: vec![false; ny],
        }
    }
}

const UNVISITED: usize = usize::MAX;

struct Tarjan<'a> {
    gm: &'a Array2<i8>,
    nx: usize,
    ny: usize,
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    sccs: Vec<BipartiteScc>,
}

impl<'a> Tarjan<'a> {
    fn new(gm: &'a Array2<i8>) -> Self {
        let nx = gm.nrows();
        let ny = gm.ncols();
        let total = nx + ny;
        Self {
            gm,
            nx,
            ny,
            index: vec![UNVISITED; total],
            lowlink: vec![0; total],
            on_stack: vec![false; total],
            stack: Vec::new(),
            next: 0,
            sccs: Vec::new(),
        }
    }

    fn discover(&mut self, w: usize) {
        self.index[w] = self.next;
        self.lowlink[w] = self.next;
        self.next += 1;
        self.stack.push(w);
        self.on_stack[w] = true;
    }

    /// Successor of combined node `v` behind cursor `c`, if the arc exists.
    fn successor(&self, v: usize, c: usize) -> Option<usize> {
        if v < self.nx {
            (self.gm[[v, c]] == 1).then_some(self.nx + c)
        } else {
            (self.gm[[c, v - self.nx]] == -1).then_some(c)
        }
    }

    fn strong_connect(&mut self, root: usize) {
        self.discover(root);
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(&(v, cursor)) = frames.last() {
            let limit = if v < self.nx { self.ny } else { self.nx };
            let mut cursor = cursor;
            let mut descend = None;
            while cursor < limit {
                let c = cursor;
                cursor += 1;
                let Some(w) = self.successor(v, c) else { continue };
                if self.index[w] == UNVISITED {
                    descend = Some(w);
                    break;
                }
                if self.on_stack[w] {
                    self.lowlink[v] = self.lowlink[v].min(self.index[w]);
                }
            }
            frames.last_mut().unwrap().1 = cursor;
            if let Some(w) = descend {
                self.discover(w);
                frames.push((w, 0));
                continue;
            }
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if self.lowlink[v] == self.index[v] {
                let mut scc = BipartiteScc::new(self.nx, self.ny);
                loop {
                    let w = self.stack.pop().expect("tarjan stack underflow");
                    self.on_stack[w] = false;
                    if w < self.nx {
                        scc.u[w] = true;
                    } else {
                        scc.v[w - self.nx] = true;
                    }
                    if w == v {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }
}

/// All strongly connected components of the signed bipartite digraph, in
/// reverse topological order. Every node lands in exactly one component.
pub fn find_sccs(gm: &Array2<i8>) -> Vec<BipartiteScc> {
    let mut tarjan = Tarjan::new(gm);
    for root in 0..(tarjan.nx + tarjan.ny) {
        if tarjan.index[root] == UNVISITED {
            tarjan.strong_connect(root);
        }
    }
    tarjan.sccs
}

/// Zero every arc whose endpoints lie in different components. Only
/// intra-component arcs can belong to an alternating cycle, so only they can
/// occur in an alternative optimal assignment.
pub fn prune_cross_scc_edges(gm: &mut Array2<i8>, sccs: &[BipartiteScc]) {
    let nx = gm.nrows();
    let ny = gm.ncols();
    let mut comp_x = vec![usize::MAX; nx];
    let mut comp_y = vec![usize::MAX; ny];
    for (id, scc) in sccs.iter().enumerate() {
        for (i, &present) in scc.u.iter().enumerate() {
            if present {
                comp_x[i] = id;
            }
        }
        for (j, &present) in scc.v.iter().enumerate() {
            if present {
                comp_y[j] = id;
            }
        }
    }
    for i in 0..nx {
        for j in 0..ny {
            if gm[[i, j]] != 0 && comp_x[i] != comp_y[j] {
                gm[[i, j]] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn swap_cycle_is_strongly_connected() {
        // Matching {x0-y0, x1-y1} with free arcs x0 → y1 and x1 → y0:
        // the alternating square x0 → y1 → x1 → y0 → x0 is one component.
        let gm = array![[-1i8, 1], [1, -1]];
        let sccs = find_sccs(&gm);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].u, vec![true, true]);
        assert_eq!(sccs[0].v, vec![true, true]);
    }

    #[test]
    fn every_node_in_exactly_one_component() {
        // x0..x1/y0..y1 form an alternating square; x2/y2 hang off it.
        let gm = array![[1i8, -1, 0], [-1, 1, 0], [0, 0, -1]];
        let sccs = find_sccs(&gm);
        for i in 0..3 {
            assert_eq!(sccs.iter().filter(|s| s.u[i]).count(), 1, "x{}", i);
            assert_eq!(sccs.iter().filter(|s| s.v[i]).count(), 1, "y{}", i);
        }
        assert_eq!(sccs.len(), 3);
    }

    #[test]
    fn pruning_clears_cross_component_arcs() {
        // A 4-node alternating cycle plus a matched pair (x2, y2) that only
        // leaks into the cycle through x2 → y0.
        let mut gm = array![[-1i8, 1, 0], [1, -1, 0], [1, 0, -1]];
        let sccs = find_sccs(&gm);
        prune_cross_scc_edges(&mut gm, &sccs);
        assert_eq!(gm[[2, 0]], 0, "arc leaving the pair crosses components");
        assert_eq!(gm[[2, 2]], 0, "the dangling matched arc crosses too");
        assert_eq!(gm[[0, 1]], 1, "cycle arcs survive");
        assert_eq!(gm[[1, 0]], 1);
    }
}
