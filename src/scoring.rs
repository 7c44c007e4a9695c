//! Edge confidence scores.
//!
//! Topology-only scores (FS-weight) and evidence-weighted scores (Chua's reliability
//! formulation, and a variant weighted by normalized evidence dissimilarity) for a single
//! edge `(u, v)`.
//!
//! Notation: `N(u)` is the 1-hop set of `u` including `u`; `Nk(u)` is the ego network at
//! the engine's current depth. `n_avg` is the graph's average degree.
//!
//! FS-weight:
//! \[
//!   S(u,v) = \frac{2|N_u \cap N_v|}{|N_u \setminus N_v| + 2|N_u \cap N_v| + \lambda_{uv}}
//!            \cdot \frac{2|N_u \cap N_v|}{|N_v \setminus N_u| + 2|N_u \cap N_v| + \lambda_{vu}}
//! \]
//! with \(\lambda_{uv} = \max(0, n_{avg} - (|N_u \setminus N_v| + |N_u \cap N_v|))\).
//!
//! Evidence-weighted scores are `SR(u,v) · SR(v,u)` where `SR` sums a per-neighbour weight
//! function over `Nk(u)` / `Nk(u) ∩ Nk(v)` and uses `n_avg · r_int` as the background rate.
//! `SR` is 0 whenever its denominator is 0.
//!
//! Memo tables: the depth-independent pair reliabilities are never invalidated;
//! evidence sets, `r1`, the `R1` bounds and edge scores are epoch-tagged and dropped on every
//! depth change. Edge scores are additionally cleared at the end of each pipeline run.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::database::InteractionDatabase;
use crate::graph::{NodeIdx, Ppin};
use crate::memo::EpochMemo;
use crate::neighborhood::{NeighborhoodIndex, NodeSet};
use crate::pipeline::EdgeScorer;
use crate::reliability::ReliabilityModel;
use crate::{Error, Result};

/// Default bound above which `r1` is treated as infinite when normalizing.
pub const DEFAULT_R1_SENTINEL: f64 = 1e9;

/// Scoring function applied per edge by the batch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// FS-weight over 1-hop sets.
    SimpleFs,
    /// FS-weight over depth-limited sets.
    DepthFs,
    /// `SR(u,v)·SR(v,u)` weighted by pair reliability `r`.
    Chua,
    /// `max(Chua(u,v), max_{w∈N(u)} Chua(u,w)·Chua(v,w))`.
    ChuaTransitive,
    /// `SR(u,v)·SR(v,u)` weighted by normalized evidence dissimilarity `R1`.
    Dissimilarity,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::SimpleFs => "fs",
            Algorithm::DepthFs => "depth-fs",
            Algorithm::Chua => "chua",
            Algorithm::ChuaTransitive => "chua-transitive",
            Algorithm::Dissimilarity => "dissimilarity",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fs" => Ok(Algorithm::SimpleFs),
            "depth-fs" => Ok(Algorithm::DepthFs),
            "chua" => Ok(Algorithm::Chua),
            "chua-transitive" => Ok(Algorithm::ChuaTransitive),
            "dissimilarity" => Ok(Algorithm::Dissimilarity),
            other => Err(Error::InvalidParameter(format!(
                "unknown algorithm `{other}` (expected fs, depth-fs, chua, chua-transitive or dissimilarity)"
            ))),
        }
    }
}

/// Per-neighbour weight function used inside `SR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightFn {
    /// `r(u, w)`
    Reliability,
    /// `R1(u, w)`
    Dissimilarity,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// LRU bound for every memo table; `None` keeps them unbounded.
    pub memo_capacity: Option<usize>,
    pub r1_sentinel: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memo_capacity: None,
            r1_sentinel: DEFAULT_R1_SENTINEL,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.memo_capacity == Some(0) {
            return Err(Error::InvalidParameter(
                "memo_capacity must be > 0".to_string(),
            ));
        }
        if !self.r1_sentinel.is_finite() || self.r1_sentinel <= 0.0 {
            return Err(Error::InvalidParameter(
                "r1_sentinel must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Observed `r1` range over all edges, sentinel values excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct R1Bounds {
    pub min: f64,
    pub max: f64,
}

/// Background-rate correction: `max(0, n_avg - (|a \ b| + |a ∩ b|))`.
pub fn lambda(n_avg: f64, a: &NodeSet, b: &NodeSet) -> f64 {
    let diff = a.difference(b).count();
    let inter = a.intersection(b).count();
    (n_avg - (diff + inter) as f64).max(0.0)
}

/// FS-weight of two neighbour sets.
pub fn fs_weight(n_avg: f64, nu: &NodeSet, nv: &NodeSet) -> f64 {
    let num = 2.0 * nu.intersection(nv).count() as f64;
    let deno_u = nu.difference(nv).count() as f64 + num + lambda(n_avg, nu, nv);
    let deno_v = nv.difference(nu).count() as f64 + num + lambda(n_avg, nv, nu);
    if deno_u == 0.0 || deno_v == 0.0 {
        return 0.0;
    }
    (num / deno_u) * (num / deno_v)
}

/// Scoring state for one graph + evidence table.
///
/// Index-based entrypoints reject node ids outside the graph with
/// [`Error::IndexOutOfBounds`]; by-name ones reject unknown names with
/// [`Error::MissingNode`].
#[derive(Debug)]
pub struct ScoringEngine<D: InteractionDatabase> {
    graph: Arc<Ppin>,
    neighborhood: NeighborhoodIndex,
    db: D,
    reliability: ReliabilityModel,
    config: EngineConfig,
    /// depth-independent; always looked up under epoch 0
    pair_reliability: EpochMemo<(NodeIdx, NodeIdx), f64>,
    evidence_sets: EpochMemo<NodeIdx, Rc<BTreeSet<String>>>,
    r1: EpochMemo<(NodeIdx, NodeIdx), f64>,
    r1_bounds: Option<(u64, R1Bounds)>,
    scores: EpochMemo<(Algorithm, NodeIdx, NodeIdx), f64>,
}

impl<D: InteractionDatabase> ScoringEngine<D> {
    /// Builds the reliability model from the full table (which trims `db` to the graph).
    /// The engine starts at depth 0.
    pub fn new(graph: Arc<Ppin>, mut db: D, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let reliability = ReliabilityModel::build(&graph, &mut db);
        let cap = config.memo_capacity;
        Ok(Self {
            neighborhood: NeighborhoodIndex::new(Arc::clone(&graph), cap),
            graph,
            db,
            reliability,
            config,
            pair_reliability: EpochMemo::new(cap),
            evidence_sets: EpochMemo::new(cap),
            r1: EpochMemo::new(cap),
            r1_bounds: None,
            scores: EpochMemo::new(cap),
        })
    }

    pub fn graph(&self) -> &Arc<Ppin> {
        &self.graph
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn reliability(&self) -> &ReliabilityModel {
        &self.reliability
    }

    pub fn depth(&self) -> usize {
        self.neighborhood.depth()
    }

    pub fn epoch(&self) -> u64 {
        self.neighborhood.epoch()
    }

    /// Change depth; every depth-dependent memo becomes stale.
    pub fn set_depth(&mut self, depth: usize) {
        self.neighborhood.set_depth(depth);
        self.drop_depth_memos();
    }

    /// Checked variant of [`set_depth`](Self::set_depth): negative depths are rejected and
    /// leave the engine untouched.
    pub fn set_depth_checked(&mut self, depth: i64) -> Result<()> {
        self.neighborhood.set_depth_checked(depth)?;
        self.drop_depth_memos();
        Ok(())
    }

    // frees entries the epoch bump already made stale
    fn drop_depth_memos(&mut self) {
        self.evidence_sets.clear();
        self.r1.clear();
        self.r1_bounds = None;
        self.scores.clear();
    }

    /// Drop the per-run edge score memo.
    pub fn clear_memo(&mut self) {
        self.scores.clear();
    }

    /// `N(u)`, including `u`.
    pub fn direct_neighbors(&mut self, u: NodeIdx) -> Result<Rc<NodeSet>> {
        self.neighborhood.direct(u)
    }

    /// `Nk(u)` at the current depth, including `u`.
    pub fn neighbor_set(&mut self, u: NodeIdx) -> Result<Rc<NodeSet>> {
        self.neighborhood.at_depth(u)
    }

    pub fn simple_fs(&mut self, u: NodeIdx, v: NodeIdx) -> Result<f64> {
        let nu = self.neighborhood.direct(u)?;
        let nv = self.neighborhood.direct(v)?;
        Ok(fs_weight(self.graph.n_avg(), &nu, &nv))
    }

    pub fn depth_fs(&mut self, u: NodeIdx, v: NodeIdx) -> Result<f64> {
        let nu = self.neighborhood.at_depth(u)?;
        let nv = self.neighborhood.at_depth(v)?;
        Ok(fs_weight(self.graph.n_avg(), &nu, &nv))
    }

    /// `r(u, v)`: reliability of the directed evidence observed for `(u, v)`.
    pub fn pair_reliability(&mut self, u: NodeIdx, v: NodeIdx) -> Result<f64> {
        let key = (self.graph.check_node(u)?, self.graph.check_node(v)?);
        let (reliability, db, graph) = (&self.reliability, &self.db, &self.graph);
        Ok(self.pair_reliability.get_or_insert_with(key, 0, || {
            reliability.pair_reliability(db, graph.name(u), graph.name(v))
        }))
    }

    /// Evidence types observed between `u` and any other node of `Nk(u)`.
    pub fn evidence_set(&mut self, u: NodeIdx) -> Result<Rc<BTreeSet<String>>> {
        let epoch = self.epoch();
        if let Some(set) = self.evidence_sets.get(&u, epoch) {
            return Ok(set);
        }
        let hood = self.neighborhood.at_depth(u)?;
        let name = self.graph.name(u);
        let mut types = BTreeSet::new();
        for &w in hood.iter().filter(|&&w| w != u) {
            types.extend(self.db.filter_functions(name, self.graph.name(w)));
        }
        let types = Rc::new(types);
        self.evidence_sets.insert(u, Rc::clone(&types), epoch);
        Ok(types)
    }

    /// `r1(a, b) = |E_a Δ E_b| / |E_a ∩ E_b|`, 0 when the evidence sets are disjoint.
    /// Symmetric; memoized per unordered pair.
    pub fn r1(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        let key = (a.min(b), a.max(b));
        let epoch = self.epoch();
        if let Some(r) = self.r1.get(&key, epoch) {
            return Ok(r);
        }
        let ea = self.evidence_set(key.0)?;
        let eb = self.evidence_set(key.1)?;
        let inter = ea.intersection(&eb).count();
        let r = if inter == 0 {
            0.0
        } else {
            let union = ea.union(&eb).count();
            (union - inter) as f64 / inter as f64
        };
        self.r1.insert(key, r, epoch);
        Ok(r)
    }

    /// Min/max of `r1` over every edge's endpoints, ignoring values at or above the sentinel.
    /// Both are 0 when no edge yields a usable value.
    pub fn r1_bounds(&mut self) -> Result<R1Bounds> {
        let epoch = self.epoch();
        if let Some((e, bounds)) = self.r1_bounds {
            if e == epoch {
                return Ok(bounds);
            }
        }
        let graph = Arc::clone(&self.graph);
        let sentinel = self.config.r1_sentinel;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for e in graph.edges() {
            let r = self.r1(e.source, e.target)?;
            if r < sentinel {
                min = min.min(r);
                max = max.max(r);
            }
        }
        let bounds = if min.is_finite() {
            R1Bounds { min, max }
        } else {
            R1Bounds { min: 0.0, max: 0.0 }
        };
        debug!(min = bounds.min, max = bounds.max, epoch, "r1 bounds computed");
        self.r1_bounds = Some((epoch, bounds));
        Ok(bounds)
    }

    /// `R1(a, b)`: `r1` min-max normalized into `[0, 1]`. Sentinel values map to 1; a
    /// degenerate range maps everything else to 0.
    pub fn normalized_dissimilarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        let r = self.r1(a, b)?;
        if r >= self.config.r1_sentinel {
            return Ok(1.0);
        }
        let R1Bounds { min, max } = self.r1_bounds()?;
        let span = max - min;
        if span == 0.0 {
            return Ok(0.0);
        }
        Ok(((r - min) / span).clamp(0.0, 1.0))
    }

    fn weight(&mut self, f: WeightFn, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        match f {
            WeightFn::Reliability => self.pair_reliability(a, b),
            WeightFn::Dissimilarity => self.normalized_dissimilarity(a, b),
        }
    }

    /// The asymmetric term `SR(u, v)` over depth-limited sets. A zero denominator yields 0.
    pub fn sr_term(&mut self, u: NodeIdx, v: NodeIdx, f: WeightFn) -> Result<f64> {
        let nu = self.neighborhood.at_depth(u)?;
        let nv = self.neighborhood.at_depth(v)?;
        let both: Vec<NodeIdx> = nu.intersection(&nv).copied().collect();
        let only_u = nu.difference(&nv).count();
        let lambda_uv = (self.graph.n_avg() * self.reliability.r_int()
            - (only_u + both.len()) as f64)
            .max(0.0);

        let mut shared = 0.0;
        let mut cross = 0.0;
        for &w in &both {
            let wu = self.weight(f, u, w)?;
            let wv = self.weight(f, v, w)?;
            shared += wu * wv;
            cross += wu * (1.0 - wv);
        }
        let mut own = 0.0;
        for &w in nu.iter() {
            own += self.weight(f, u, w)?;
        }

        let numerator = 2.0 * shared;
        let denominator = own + cross + 2.0 * shared + lambda_uv;
        if denominator == 0.0 {
            return Ok(0.0);
        }
        Ok(numerator / denominator)
    }

    /// `SR(u, v) · SR(v, u)`.
    pub fn edge_score(&mut self, u: NodeIdx, v: NodeIdx, f: WeightFn) -> Result<f64> {
        Ok(self.sr_term(u, v, f)? * self.sr_term(v, u, f)?)
    }

    fn transitive_score(&mut self, u: NodeIdx, v: NodeIdx) -> Result<f64> {
        let mut best = self.score(Algorithm::Chua, u, v)?;
        let hood = self.neighborhood.direct(u)?;
        for &w in hood.iter() {
            let via = self.score(Algorithm::Chua, u, w)? * self.score(Algorithm::Chua, v, w)?;
            best = best.max(via);
        }
        Ok(best)
    }

    /// Score `(u, v)` with `algorithm`, memoized until the next depth change or
    /// [`clear_memo`](Self::clear_memo).
    pub fn score(&mut self, algorithm: Algorithm, u: NodeIdx, v: NodeIdx) -> Result<f64> {
        let key = (algorithm, self.graph.check_node(u)?, self.graph.check_node(v)?);
        let epoch = self.epoch();
        if let Some(s) = self.scores.get(&key, epoch) {
            return Ok(s);
        }
        let s = match algorithm {
            Algorithm::SimpleFs => self.simple_fs(u, v)?,
            Algorithm::DepthFs => self.depth_fs(u, v)?,
            Algorithm::Chua => self.edge_score(u, v, WeightFn::Reliability)?,
            Algorithm::ChuaTransitive => self.transitive_score(u, v)?,
            Algorithm::Dissimilarity => self.edge_score(u, v, WeightFn::Dissimilarity)?,
        };
        self.scores.insert(key, s, epoch);
        Ok(s)
    }

    /// By-name entrypoint: unknown nodes fail with [`Error::MissingNode`].
    pub fn score_by_name(&mut self, algorithm: Algorithm, u: &str, v: &str) -> Result<f64> {
        let u = self.graph.index_of(u)?;
        let v = self.graph.index_of(v)?;
        self.score(algorithm, u, v)
    }

    /// Adapter for the batch pipeline.
    pub fn scorer(&mut self, algorithm: Algorithm) -> AlgorithmScorer<'_, D> {
        AlgorithmScorer {
            engine: self,
            algorithm,
        }
    }
}

/// One algorithm of one engine, as an [`EdgeScorer`].
pub struct AlgorithmScorer<'a, D: InteractionDatabase> {
    engine: &'a mut ScoringEngine<D>,
    algorithm: Algorithm,
}

impl<D: InteractionDatabase> EdgeScorer for AlgorithmScorer<'_, D> {
    fn score(&mut self, source: &str, target: &str) -> Result<f64> {
        self.engine.score_by_name(self.algorithm, source, target)
    }

    fn clear_memo(&mut self) {
        self.engine.clear_memo();
    }

    fn label(&self) -> String {
        format!("{}@depth{}", self.algorithm, self.engine.depth())
    }
}
