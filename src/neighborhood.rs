//! k-hop neighbourhoods.
//!
//! `NeighborSet(u, k)` is the ego network of radius `k` around `u`, **including `u`**.
//! Self-membership is what the set-algebra in the FS-weight formulas expects.
//!
//! The [`NeighborhoodIndex`] owns the mutable depth of an engine. Depth changes bump an epoch
//! counter; every depth-dependent memo table in the crate tags entries with the epoch they
//! were computed under, so nothing computed at one depth leaks into another pass.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::graph::{GraphRef, NodeIdx, Ppin};
use crate::memo::EpochMemo;
use crate::{Error, Result};

/// Ordered node set. Ordered so that sums over a set are reproducible run to run.
pub type NodeSet = BTreeSet<NodeIdx>;

/// Nodes within `radius` hops of `start`, `start` included. Empty if `start` is not a node
/// of `graph`; see [`ego_network_checked`].
///
/// Frontier expansion: begin with `{start}`; each step unions in the neighbours of the nodes
/// added by the previous step, skipping nodes already seen. Stops after `radius` steps or
/// once a step adds nothing.
pub fn ego_network<G: GraphRef>(graph: &G, start: NodeIdx, radius: usize) -> NodeSet {
    let n = graph.node_count();
    let mut seen = NodeSet::new();
    if start >= n {
        return seen;
    }
    seen.insert(start);
    let mut frontier = vec![start];
    for _ in 0..radius {
        let mut next = Vec::new();
        for &u in &frontier {
            for &v in graph.neighbors_ref(u) {
                if v < n && seen.insert(v) {
                    next.push(v);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    seen
}

/// Checked variant of [`ego_network`]: an out-of-range `start` is an error instead of an
/// empty set.
pub fn ego_network_checked<G: GraphRef>(
    graph: &G,
    start: NodeIdx,
    radius: usize,
) -> Result<NodeSet> {
    if start >= graph.node_count() {
        return Err(Error::IndexOutOfBounds(start));
    }
    Ok(ego_network(graph, start, radius))
}

/// Memoized neighbour sets plus the engine's depth/epoch state.
#[derive(Debug)]
pub struct NeighborhoodIndex {
    graph: Arc<Ppin>,
    depth: usize,
    epoch: u64,
    /// `N(u)`; depth-independent, kept for the life of the index
    direct: HashMap<NodeIdx, Rc<NodeSet>>,
    at_depth: EpochMemo<NodeIdx, Rc<NodeSet>>,
}

impl NeighborhoodIndex {
    pub fn new(graph: Arc<Ppin>, memo_capacity: Option<usize>) -> Self {
        Self {
            graph,
            depth: 0,
            epoch: 0,
            direct: HashMap::new(),
            at_depth: EpochMemo::new(memo_capacity),
        }
    }

    pub fn graph(&self) -> &Arc<Ppin> {
        &self.graph
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current cache epoch. Changes on every `set_depth`.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Set the depth and invalidate every depth-dependent cache (via the epoch).
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        self.epoch += 1;
        self.at_depth.clear();
        debug!(depth, epoch = self.epoch, "depth changed");
    }

    /// Checked variant of [`set_depth`](Self::set_depth): negative depths are rejected.
    pub fn set_depth_checked(&mut self, depth: i64) -> Result<()> {
        let depth = usize::try_from(depth).map_err(|_| {
            Error::InvalidParameter(format!("depth must be >= 0 (got {depth})"))
        })?;
        self.set_depth(depth);
        Ok(())
    }

    /// `N(u)`: direct neighbours of `u`, plus `u`.
    pub fn direct(&mut self, u: NodeIdx) -> Result<Rc<NodeSet>> {
        self.graph.check_node(u)?;
        let graph = &self.graph;
        Ok(self
            .direct
            .entry(u)
            .or_insert_with(|| Rc::new(ego_network(&**graph, u, 1)))
            .clone())
    }

    /// `NeighborSet(u, depth)` at the current depth.
    pub fn at_depth(&mut self, u: NodeIdx) -> Result<Rc<NodeSet>> {
        self.graph.check_node(u)?;
        let (graph, depth) = (&self.graph, self.depth);
        Ok(self.at_depth.get_or_insert_with(u, self.epoch, || {
            Rc::new(ego_network(&**graph, u, depth))
        }))
    }
}
