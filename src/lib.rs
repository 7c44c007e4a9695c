//! `ppin_reweight`: edge confidence scores for protein-protein interaction networks.
//!
//! The crate combines network topology (shared k-hop neighbourhoods) with provenance
//! evidence from an experimental-interaction table to re-rank the edges of a PPIN.
//!
//! Public invariants (must not drift):
//! - **Edge order**: every batch output has exactly one line per input edge, in input order
//!   (duplicate pairs included).
//! - **Depth discipline**: no score computed under one depth is ever served under another.
//!   Every depth-dependent memo entry is tagged with the epoch it was computed under.
//! - **Determinism**: scores are deterministic given identical graph, evidence and depth
//!   (set iteration is ordered, so floating-point sums are reproducible across runs).
//! - **Lookup direction**: evidence lookups are directional (`A == a && B == b`) in every
//!   component.
//!
//! Swappable (allowed to change without breaking the contract):
//! - memo eviction policy (unbounded vs LRU)
//! - neighbourhood expansion strategy (so long as the ego-network sets are identical)
//! - internal indexing of the evidence table

pub mod config;
pub mod database;
pub mod graph;
pub mod memo;
pub mod neighborhood;
pub mod pipeline;
pub mod reliability;
pub mod scoring;

use std::path::PathBuf;

pub use config::ReweightConfig;
pub use database::{EvidenceTable, InteractionDatabase, InteractionRecord};
pub use graph::{Edge, GraphRef, NodeIdx, Ppin};
pub use memo::EpochMemo;
pub use neighborhood::{ego_network, ego_network_checked, NeighborhoodIndex, NodeSet};
pub use pipeline::{
    run_depths, EdgeScorer, FnScorer, PipelineReport, ReweightPipeline, RunContext, ScoredEdge,
};
pub use reliability::{ReliabilityModel, ReliabilityTable};
pub use scoring::{Algorithm, AlgorithmScorer, EngineConfig, ScoringEngine};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node not in graph: {0}")]
    MissingNode(String),
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("malformed edge list (line {line}): {reason}")]
    MalformedEdgeList { line: usize, reason: String },
    #[error("evidence table is missing required column `{0}`")]
    MissingColumn(String),
    #[error("malformed evidence table (line {line}): {reason}")]
    MalformedEvidence { line: usize, reason: String },
    #[error("malformed cache file {} (line {line}): {reason}", path.display())]
    MalformedCache {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("output {} is locked by another run", .0.display())]
    OutputLocked(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
