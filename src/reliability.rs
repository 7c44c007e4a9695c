//! Evidence reliability.
//!
//! Built once per run from the **untrimmed** evidence table:
//! - per-type reliability `count(type) / count(all records)`
//! - `r_int`, the fraction of graph edges whose two directed lookups share an evidence type
//!
//! after which the table is trimmed to records touching at least one graph node.

use std::collections::{BTreeMap, HashSet};

use tracing::info;

use crate::database::InteractionDatabase;
use crate::graph::Ppin;

/// Evidence type -> reliability in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReliabilityTable(BTreeMap<String, f64>);

impl ReliabilityTable {
    pub fn from_database<D: InteractionDatabase + ?Sized>(db: &D) -> Self {
        let records = db.records();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in records {
            *counts.entry(r.evidence_type.clone()).or_insert(0) += 1;
        }
        let total = records.len() as f64;
        Self(
            counts
                .into_iter()
                .map(|(t, c)| (t, c as f64 / total))
                .collect(),
        )
    }

    /// Unknown types have reliability 0.
    pub fn get(&self, evidence_type: &str) -> f64 {
        self.0.get(evidence_type).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone)]
pub struct ReliabilityModel {
    table: ReliabilityTable,
    r_int: f64,
}

impl ReliabilityModel {
    /// Compute the table and `r_int` from the full database, then trim it to the graph.
    pub fn build<D: InteractionDatabase + ?Sized>(graph: &Ppin, db: &mut D) -> Self {
        let table = ReliabilityTable::from_database(db);
        let r_int = shared_evidence_fraction(graph, db);
        info!(
            evidence_types = table.len(),
            records = db.records().len(),
            r_int,
            "reliability model built"
        );

        let nodes: HashSet<&str> = graph.names().iter().map(String::as_str).collect();
        db.trim_rows(&nodes);

        Self { table, r_int }
    }

    pub fn table(&self) -> &ReliabilityTable {
        &self.table
    }

    /// `(1 + #edges whose endpoints share an evidence type) / #edges`; 0 for an edgeless graph.
    pub fn r_int(&self) -> f64 {
        self.r_int
    }

    /// `r(u, v) = 1 - Π_t (1 - rel[t])^count(t)` over the records observed for `(u, v)`:
    /// the chance that at least one piece of evidence detected the interaction, assuming
    /// independence across evidence types. No evidence gives 0.
    pub fn pair_reliability<D: InteractionDatabase + ?Sized>(&self, db: &D, u: &str, v: &str) -> f64 {
        let mut counts: BTreeMap<&str, i32> = BTreeMap::new();
        for r in db.filter_interactions(u, v) {
            *counts.entry(r.evidence_type.as_str()).or_insert(0) += 1;
        }
        let miss: f64 = counts
            .into_iter()
            .map(|(t, c)| (1.0 - self.table.get(t)).powi(c))
            .product();
        1.0 - miss
    }
}

fn shared_evidence_fraction<D: InteractionDatabase + ?Sized>(graph: &Ppin, db: &D) -> f64 {
    let edges = graph.edges();
    if edges.is_empty() {
        return 0.0;
    }
    let shared = edges
        .iter()
        .filter(|e| {
            let (u, v) = (graph.name(e.source), graph.name(e.target));
            let forward = db.filter_functions(u, v);
            let reverse = db.filter_functions(v, u);
            !forward.is_disjoint(&reverse)
        })
        .count();
    (1 + shared) as f64 / edges.len() as f64
}
