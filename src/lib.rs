//! # gedist
//!
//! Approximate graph edit distance: transform one attributed graph into
//! another at minimum edit cost.
//!
//! ## The Problem
//!
//! The graph edit distance (GED) between two graphs is the cheapest
//! sequence of node/edge substitutions, deletions and insertions turning
//! the first into the second. Computing it exactly is NP-hard; this crate
//! implements the assignment-based approximation family: a bipartite
//! (LSAPE) lower layer produces candidate node mappings fast, a quadratic
//! refinement polishes them, and a multistart driver runs many candidates
//! in parallel and keeps the best.
//!
//! ## Key Functions
//!
//! | Function | Use Case | Complexity |
//! |----------|----------|------------|
//! | [`bipartite_ged`] | Fast one-shot approximation | O((n+m)³) |
//! | [`refine_from`] | Polish a known mapping (IPFP) | O(iter · n²m²) |
//! | [`ged`] | Multistart: K seeds, refined in parallel | K × refine |
//! | [`enumerate::k_best_mappings`] | All/K optimal assignments of a cost matrix | output-sensitive |
//!
//! ## Quick Start
//!
//! ```rust
//! use gedist::{ged, ConstantCost, Graph};
//!
//! let mut triangle = Graph::new(false);
//! let a = triangle.add_node("c");
//! let b = triangle.add_node("c");
//! let c = triangle.add_node("c");
//! triangle.add_edge(a, b, "-");
//! triangle.add_edge(b, c, "-");
//! triangle.add_edge(a, c, "-");
//!
//! let mut path = Graph::new(false);
//! let a = path.add_node("c");
//! let b = path.add_node("c");
//! let c = path.add_node("c");
//! path.add_edge(a, b, "-");
//! path.add_edge(b, c, "-");
//!
//! // The triangle and the path differ by one edge deletion.
//! let result = ged(&triangle, &path, &ConstantCost::unit(), 8).unwrap();
//! assert_eq!(result.cost, 1.0);
//! ```
//!
//! ## Pipeline
//!
//! [`cost`] builds `(n+1)×(m+1)` LSAPE matrices from an [`EditCost`]
//! callback (node-only, star-augmented, or walk-profile via [`WalkCost`]).
//! [`lsap`] solves the assignment with dual potentials. [`enumerate`] turns
//! one optimum into up to K alternative optima by walking alternating
//! cycles inside strongly connected components ([`scc`]) of the equality
//! digraph. [`ipfp`] refines each seed on the continuous relaxation, and
//! [`multistart`] reduces the refined candidates to the cheapest one.
//!
//! ## What Can Go Wrong
//!
//! 1. **K too small**: with one seed, [`ged`] degenerates to refined
//!    [`bipartite_ged`]. More seeds cost linearly more and only help on
//!    instances with many co-optimal assignments.
//! 2. **Non-finite costs**: edit-cost callbacks returning NaN/∞ surface as
//!    [`Error::NonFiniteCost`] at the driver boundary.
//! 3. **Mixed directedness**: comparing a directed with an undirected graph
//!    is rejected ([`Error::DirectednessMismatch`]), not coerced.
//! 4. **Iteration cap**: IPFP stopping on `max_iter` is normal; check
//!    [`GedResult::converged`] if you care.
//! 5. **Massively degenerate optima**: enumeration cost is output-sensitive;
//!    uniform cost matrices have factorially many optima.
//!
//! ## References
//!
//! - Riesen & Bunke (2009). "Approximate graph edit distance computation by
//!   means of bipartite graph matching"
//! - Leordeanu, Hebert, Sukthankar (2009). "An Integer Projected Fixed Point
//!   Method for Graph Matching and MAP Inference"
//! - Bougleux, Brun, Carletti, Foggia, Gaüzère, Vento (2017). "Graph edit
//!   distance as a quadratic assignment problem"
//! - Uno (1997). "Algorithms for Enumerating All Perfect, Maximum and
//!   Maximal Matchings in Bipartite Graphs"
//! - Daller, Bougleux, Gaüzère, Brun (2018). "Approximate Graph Edit
//!   Distance by Several Local Searches in Parallel"

use log::debug;
use ndarray::Array2;
use thiserror::Error;

pub mod cost;
pub mod enumerate;
pub mod graph;
pub mod ipfp;
pub mod lsap;
pub mod multistart;
pub mod scc;
pub mod walks;

pub use cost::{ged_from_mapping, ConstantCost, EditCost};
pub use graph::{Graph, Mapping};
pub use ipfp::{Ipfp, Refined};
pub use multistart::{refine_seeds, Best, Refine};
pub use walks::WalkCost;

/// Graph edit distance error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// One graph is directed and the other is not.
    #[error("one graph is directed and the other is not")]
    DirectednessMismatch,

    /// An edit-cost callback produced NaN or ∞.
    #[error("edit cost produced a non-finite value ({0})")]
    NonFiniteCost(f64),

    /// A user-supplied cost matrix does not fit the graph pair.
    #[error("cost matrix shape mismatch: expected ({0}, {1}), got ({2}, {3})")]
    CostShapeMismatch(usize, usize, usize, usize),

    /// The multistart driver needs at least one seed.
    #[error("multistart needs at least one seed, got {0}")]
    BadSeedCount(usize),

    /// A seed mapping does not cover the graph pair.
    #[error("seed mapping covers ({0}, {1}) nodes, graphs have ({2}, {3})")]
    SeedShapeMismatch(usize, usize, usize, usize),

    /// No permutation avoids the forbidden cells.
    #[error("assignment problem has no finite-cost solution")]
    Infeasible,
}

/// Result type for graph edit distance operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tunables of the multistart pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GedOptions {
    /// Refinement parameters applied to every seed.
    pub refine: Ipfp,
    /// Fan seeds out over rayon's thread pool.
    pub parallel: bool,
}

impl Default for GedOptions {
    fn default() -> Self {
        Self {
            refine: Ipfp::default(),
            parallel: true,
        }
    }
}

/// An approximate edit distance and the mapping realizing it.
#[derive(Debug, Clone)]
pub struct GedResult {
    pub cost: f64,
    pub mapping: Mapping,
    /// `false` when the winning refinement stopped on its iteration cap.
    pub converged: bool,
}

/// [`Ipfp`] plus an edit-cost callback, satisfying the refinement contract
/// of the multistart driver.
pub struct IpfpRefiner<'a, C> {
    pub cost: &'a C,
    pub params: Ipfp,
}

impl<'a, N, E, C> Refine<N, E> for IpfpRefiner<'a, C>
where
    C: EditCost<N, E> + Sync,
{
    fn better_mapping(
        &self,
        g1: &Graph<N, E>,
        g2: &Graph<N, E>,
        seed: &Mapping,
    ) -> Result<Refined> {
        self.params.refine(g1, g2, self.cost, seed)
    }

    fn mapping_cost(&self, g1: &Graph<N, E>, g2: &Graph<N, E>, mapping: &Mapping) -> Result<f64> {
        ged_from_mapping(g1, g2, self.cost, mapping)
    }
}

fn ensure_compatible<N, E>(g1: &Graph<N, E>, g2: &Graph<N, E>) -> Result<()> {
    if g1.is_directed() != g2.is_directed() {
        return Err(Error::DirectednessMismatch);
    }
    Ok(())
}

fn ensure_shape<N, E>(g1: &Graph<N, E>, g2: &Graph<N, E>, c: &Array2<f64>) -> Result<()> {
    let want = (g1.size() + 1, g2.size() + 1);
    if c.dim() != want {
        return Err(Error::CostShapeMismatch(
            want.0,
            want.1,
            c.nrows(),
            c.ncols(),
        ));
    }
    Ok(())
}

fn score_mapping<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    mapping: Mapping,
    converged: bool,
) -> Result<GedResult> {
    let value = ged_from_mapping(g1, g2, cost, &mapping)?;
    Ok(GedResult {
        cost: value,
        mapping,
        converged,
    })
}

/// Bipartite approximation: star-augmented cost matrix, one LSAPE solve.
pub fn bipartite_ged<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
) -> Result<GedResult> {
    ensure_compatible(g1, g2)?;
    let c = cost::star_cost_matrix(g1, g2, cost)?;
    let mapping = lsap::lsape(&c)?.into_mapping();
    score_mapping(g1, g2, cost, mapping, true)
}

/// Bipartite approximation over a caller-provided `(n+1)×(m+1)` cost
/// matrix, e.g. one built by [`WalkCost`].
pub fn bipartite_ged_from<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    c: &Array2<f64>,
) -> Result<GedResult> {
    ensure_compatible(g1, g2)?;
    ensure_shape(g1, g2, c)?;
    let mapping = lsap::lsape(c)?.into_mapping();
    score_mapping(g1, g2, cost, mapping, true)
}

/// One IPFP refinement from a caller-provided seed mapping.
pub fn refine_from<N, E, C: EditCost<N, E>>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    seed: &Mapping,
    params: Ipfp,
) -> Result<GedResult> {
    ensure_compatible(g1, g2)?;
    let refined = params.refine(g1, g2, cost, seed)?;
    score_mapping(g1, g2, cost, refined.mapping, refined.converged)
}

/// Full multistart pipeline with default options: up to `k` seeds from the
/// star-augmented matrix, each refined by IPFP, cheapest kept.
pub fn ged<N, E, C>(g1: &Graph<N, E>, g2: &Graph<N, E>, cost: &C, k: usize) -> Result<GedResult>
where
    N: Sync,
    E: Sync,
    C: EditCost<N, E> + Sync,
{
    ged_with(g1, g2, cost, k, &GedOptions::default())
}

/// [`ged`] with explicit options.
pub fn ged_with<N, E, C>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    k: usize,
    options: &GedOptions,
) -> Result<GedResult>
where
    N: Sync,
    E: Sync,
    C: EditCost<N, E> + Sync,
{
    ensure_compatible(g1, g2)?;
    if k == 0 {
        return Err(Error::BadSeedCount(0));
    }
    let c = cost::star_cost_matrix(g1, g2, cost)?;
    ged_from_matrix(g1, g2, cost, &c, k, options)
}

/// Multistart pipeline seeded from a caller-provided `(n+1)×(m+1)` cost
/// matrix (star-augmented, walk-profile, or anything else LSAPE-shaped).
pub fn ged_from_matrix<N, E, C>(
    g1: &Graph<N, E>,
    g2: &Graph<N, E>,
    cost: &C,
    c: &Array2<f64>,
    k: usize,
    options: &GedOptions,
) -> Result<GedResult>
where
    N: Sync,
    E: Sync,
    C: EditCost<N, E> + Sync,
{
    ensure_compatible(g1, g2)?;
    if k == 0 {
        return Err(Error::BadSeedCount(0));
    }
    ensure_shape(g1, g2, c)?;
    let seeds = enumerate::k_best_mappings(c, Some(k))?;
    debug!("ged: {} seeds requested, {} distinct optima", k, seeds.len());
    let refiner = IpfpRefiner {
        cost,
        params: options.refine,
    };
    let best = multistart::refine_seeds(g1, g2, &seeds, &refiner, options.parallel)?;
    Ok(GedResult {
        cost: best.cost,
        mapping: best.mapping,
        converged: best.converged,
    })
}
