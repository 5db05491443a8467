//! Linear sum assignment with dual potentials, and its ε-augmented variant.
//!
//! [`lsap`] solves the square assignment problem by shortest augmenting
//! paths, maintaining potentials `u`, `v` with `u[i] + v[j] <= c[i][j]`
//! everywhere and equality on assigned cells; the dual sum equals the primal
//! optimum. Cells set to `f64::INFINITY` are forbidden and never entered.
//!
//! [`lsape`] solves the rectangular `(n+1)×(m+1)` problem with an ε row and
//! column (unconstrained multiplicity: any number of rows may be deleted,
//! any number of columns inserted). It is reduced to a square `(n+m)×(n+m)`
//! problem by [`lift_to_lsap`]: the substitution block in the upper left,
//! deletion costs on a diagonal, insertion costs on the transposed diagonal,
//! a free all-zero block in the lower right, and forbidden cells elsewhere.
//! ε duals are recovered from the lifted ones by folding each deletion
//! column into its row potential and each insertion row into its column
//! potential; the lower-right zero block guarantees the folded duals stay
//! tight on assigned cells.

use crate::graph::Mapping;
use crate::{Error, Result};
use ndarray::Array2;

/// Primal/dual solution of a square assignment problem.
#[derive(Debug, Clone)]
pub struct LsapSolution {
    /// `assignment[i]` is the column assigned to row `i`.
    pub assignment: Vec<usize>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
}

impl LsapSolution {
    /// The optimum, read off the duals.
    pub fn value(&self) -> f64 {
        self.u.iter().sum::<f64>() + self.v.iter().sum::<f64>()
    }
}

/// Primal/dual solution of an `(n+1)×(m+1)` ε-augmented assignment problem.
#[derive(Debug, Clone)]
pub struct LsapeSolution {
    /// `fwd[i] ∈ 0..m` or `m` for deletion; length `n`.
    pub fwd: Vec<usize>,
    /// `rev[j] ∈ 0..n` or `n` for insertion; length `m`.
    pub rev: Vec<usize>,
    /// Row potentials, length `n+1` (`u[n] = 0`).
    pub u: Vec<f64>,
    /// Column potentials, length `m+1` (`v[m] = 0`).
    pub v: Vec<f64>,
}

impl LsapeSolution {
    /// The optimum, read off the duals.
    pub fn value(&self) -> f64 {
        self.u.iter().sum::<f64>() + self.v.iter().sum::<f64>()
    }

    pub fn into_mapping(self) -> Mapping {
        Mapping {
            fwd: self.fwd,
            rev: self.rev,
        }
    }
}

/// Solve a square assignment problem, minimizing `Σ c[i, σ(i)]`.
///
/// Returns [`Error::Infeasible`] when no permutation avoids the `INFINITY`
/// cells.
pub fn lsap(cost: &Array2<f64>) -> Result<LsapSolution> {
    let n = cost.nrows();
    assert_eq!(cost.ncols(), n, "lsap expects a square matrix");

    let mut u = vec![0.0; n];
    // One extra virtual column hosts the row being inserted.
    let mut v = vec![0.0; n + 1];
    let mut row_of = vec![usize::MAX; n + 1];

    for i in 0..n {
        row_of[n] = i;
        let mut j0 = n;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut way = vec![n; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = row_of[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = n;
            for j in 0..n {
                if used[j] {
                    continue;
                }
                let reduced = cost[[i0, j]] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            if !delta.is_finite() {
                return Err(Error::Infeasible);
            }
            for j in 0..=n {
                if used[j] {
                    u[row_of[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if row_of[j0] == usize::MAX {
                break;
            }
        }
        // Augment along the recorded alternating path.
        loop {
            let j1 = way[j0];
            row_of[j0] = row_of[j1];
            j0 = j1;
            if j0 == n {
                break;
            }
        }
    }

    let mut assignment = vec![0; n];
    for (j, &i) in row_of.iter().take(n).enumerate() {
        assignment[i] = j;
    }
    v.truncate(n);
    Ok(LsapSolution { assignment, u, v })
}

/// Build the `(n+m)×(n+m)` square lifting of an `(n+1)×(m+1)` ε-augmented
/// cost matrix. Forbidden cells are `f64::INFINITY`.
pub fn lift_to_lsap(c: &Array2<f64>) -> Array2<f64> {
    let n = c.nrows() - 1;
    let m = c.ncols() - 1;
    let mut cl = Array2::from_elem((n + m, n + m), f64::INFINITY);
    for i in 0..n {
        for j in 0..m {
            cl[[i, j]] = c[[i, j]];
        }
    }
    for i in 0..n {
        cl[[i, m + i]] = c[[i, m]];
    }
    for j in 0..m {
        cl[[n + j, j]] = c[[n, j]];
    }
    for j in 0..m {
        for i in 0..n {
            cl[[n + j, m + i]] = 0.0;
        }
    }
    cl
}

/// Solve an `(n+1)×(m+1)` ε-augmented assignment problem.
pub fn lsape(c: &Array2<f64>) -> Result<LsapeSolution> {
    assert!(
        c.nrows() >= 1 && c.ncols() >= 1,
        "lsape expects an (n+1)×(m+1) matrix with its ε row and column"
    );
    let n = c.nrows() - 1;
    let m = c.ncols() - 1;

    // One side empty: everything on the other side is erased, and the ε
    // cells themselves are the (tight) duals.
    if n == 0 || m == 0 {
        let mut u = vec![0.0; n + 1];
        let mut v = vec![0.0; m + 1];
        for i in 0..n {
            u[i] = c[[i, m]];
        }
        for j in 0..m {
            v[j] = c[[n, j]];
        }
        return Ok(LsapeSolution {
            fwd: vec![m; n],
            rev: vec![n; m],
            u,
            v,
        });
    }

    let cl = lift_to_lsap(c);
    let sol = lsap(&cl)?;
    let mapping = Mapping::from_lifted(&sol.assignment, n, m);
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    for i in 0..n {
        u[i] = sol.u[i] + sol.v[m + i];
    }
    for j in 0..m {
        v[j] = sol.v[j] + sol.u[n + j];
    }
    Ok(LsapeSolution {
        fwd: mapping.fwd,
        rev: mapping.rev,
        u,
        v,
    })
}
