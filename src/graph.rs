//! The PPIN graph model.
//!
//! Nodes are interned to dense indices (`0..n`) in first-seen order, so every operator in
//! this crate can work over the [`GraphRef`] adapter with slice neighbour lists.
//!
//! Invariants:
//! - adjacency is symmetric: `v ∈ adj[u] ⇔ u ∈ adj[v]`
//! - every endpoint of every edge is a node
//! - `edges` keeps file order, duplicate pairs included
//! - immutable after construction

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{Error, Result};

/// Dense node index into a [`Ppin`].
pub type NodeIdx = usize;

/// Read-only neighbour access over dense node indices.
pub trait GraphRef {
    fn node_count(&self) -> usize;
    fn neighbors_ref(&self, node: NodeIdx) -> &[NodeIdx];
}

/// One line of the input edge list.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: NodeIdx,
    pub target: NodeIdx,
    pub weight: f64,
    /// Raw weight text as it appeared in the input.
    pub label: Option<String>,
}

/// Undirected protein-protein interaction network.
#[derive(Debug, Clone, Default)]
pub struct Ppin {
    names: Vec<String>,
    index: HashMap<String, NodeIdx>,
    adjacency: Vec<Vec<NodeIdx>>,
    edges: Vec<Edge>,
    n_avg: f64,
}

impl Ppin {
    /// Build from `(u, v, weight)` triples, keeping their order.
    pub fn from_triples<I, S>(triples: I) -> Self
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: Into<String>,
    {
        Self::from_labelled(
            triples
                .into_iter()
                .map(|(u, v, w)| (u.into(), v.into(), w, None)),
        )
    }

    fn from_labelled<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, f64, Option<String>)>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut index: HashMap<String, NodeIdx> = HashMap::new();
        let mut sets: Vec<BTreeSet<NodeIdx>> = Vec::new();
        let mut edges = Vec::new();

        let mut intern = |name: String, sets: &mut Vec<BTreeSet<NodeIdx>>| -> NodeIdx {
            if let Some(&i) = index.get(&name) {
                return i;
            }
            let i = names.len();
            names.push(name.clone());
            index.insert(name, i);
            sets.push(BTreeSet::new());
            i
        };

        for (u, v, weight, label) in rows {
            let s = intern(u, &mut sets);
            let t = intern(v, &mut sets);
            sets[s].insert(t);
            sets[t].insert(s);
            edges.push(Edge {
                source: s,
                target: t,
                weight,
                label,
            });
        }

        let adjacency: Vec<Vec<NodeIdx>> =
            sets.into_iter().map(|s| s.into_iter().collect()).collect();
        let n_avg = if names.is_empty() {
            0.0
        } else {
            edges.len() as f64 / names.len() as f64
        };

        Self {
            names,
            index,
            adjacency,
            edges,
            n_avg,
        }
    }

    /// Parse an edge list: one `nodeA nodeB weight` triple per line, tab-separated, falling
    /// back to single spaces when the line does not split into exactly three tab fields.
    /// Blank lines are skipped; there is no header.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let l = line.trim();
            if l.is_empty() {
                continue;
            }
            let mut fields: Vec<&str> = l.split('\t').collect();
            if fields.len() != 3 {
                fields = l.split(' ').collect();
            }
            let [u, v, w] = fields[..] else {
                return Err(Error::MalformedEdgeList {
                    line: i + 1,
                    reason: format!("expected 3 fields, found {}", fields.len()),
                });
            };
            let weight: f64 = w.parse().map_err(|_| Error::MalformedEdgeList {
                line: i + 1,
                reason: format!("weight `{w}` is not a number"),
            })?;
            rows.push((u.to_string(), v.to_string(), weight, Some(w.to_string())));
        }
        Ok(Self::from_labelled(rows))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Average degree `|edges| / |nodes|`, fixed at construction.
    pub fn n_avg(&self) -> f64 {
        self.n_avg
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, node: NodeIdx) -> &str {
        &self.names[node]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `Ok(node)` if `node` is a valid index into this graph.
    pub fn check_node(&self, node: NodeIdx) -> Result<NodeIdx> {
        if node < self.names.len() {
            Ok(node)
        } else {
            Err(Error::IndexOutOfBounds(node))
        }
    }

    /// Resolve a node name, failing with [`Error::MissingNode`] if it is not in the graph.
    pub fn index_of(&self, name: &str) -> Result<NodeIdx> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingNode(name.to_string()))
    }

    /// Checked adjacency lookup by name.
    pub fn adjacent(&self, name: &str) -> Result<impl Iterator<Item = &str> + '_> {
        let u = self.index_of(name)?;
        Ok(self.adjacency[u].iter().map(|&v| self.names[v].as_str()))
    }

    /// Adapter into a petgraph undirected graph; node weights are names, edge weights are
    /// the input weights. Node `i` maps to `NodeIndex::new(i)`.
    #[cfg(feature = "petgraph")]
    pub fn to_petgraph(&self) -> petgraph::graph::UnGraph<String, f64> {
        let mut g = petgraph::graph::UnGraph::with_capacity(self.names.len(), self.edges.len());
        for name in &self.names {
            g.add_node(name.clone());
        }
        for e in &self.edges {
            g.add_edge(
                petgraph::graph::NodeIndex::new(e.source),
                petgraph::graph::NodeIndex::new(e.target),
                e.weight,
            );
        }
        g
    }
}

impl GraphRef for Ppin {
    fn node_count(&self) -> usize {
        self.names.len()
    }

    fn neighbors_ref(&self, node: NodeIdx) -> &[NodeIdx] {
        &self.adjacency[node]
    }
}
