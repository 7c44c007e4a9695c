//! Experimental-interaction evidence.
//!
//! [`InteractionDatabase`] is the seam the scoring code depends on; [`EvidenceTable`] is the
//! in-memory implementation loaded from a BioGRID-style tab-separated export.
//!
//! Lookups are **directional**: `filter_interactions(a, b)` returns records whose interactor
//! A is `a` and interactor B is `b`, never the reverse. Every consumer in this crate relies on
//! that; mixing in symmetric lookups would change `r_int` and the pair reliabilities.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::{Error, Result};

pub const COL_INTERACTOR_A: &str = "Systematic Name Interactor A";
pub const COL_INTERACTOR_B: &str = "Systematic Name Interactor B";
pub const COL_EVIDENCE_TYPE: &str = "Experimental System";
pub const COL_EVIDENCE_CATEGORY: &str = "Experimental System Type";
pub const COL_SCORE: &str = "Score";

const REQUIRED_COLUMNS: [&str; 5] = [
    COL_INTERACTOR_A,
    COL_INTERACTOR_B,
    COL_EVIDENCE_TYPE,
    COL_EVIDENCE_CATEGORY,
    COL_SCORE,
];

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub interactor_a: String,
    pub interactor_b: String,
    /// Experimental method, e.g. `Two-hybrid`.
    pub evidence_type: String,
    /// `physical` / `genetic`.
    pub evidence_category: String,
    pub score: Option<f64>,
}

impl InteractionRecord {
    pub fn new(a: &str, b: &str, evidence_type: &str, evidence_category: &str) -> Self {
        Self {
            interactor_a: a.to_string(),
            interactor_b: b.to_string(),
            evidence_type: evidence_type.to_string(),
            evidence_category: evidence_category.to_string(),
            score: None,
        }
    }
}

pub trait InteractionDatabase {
    /// All records currently held.
    fn records(&self) -> &[InteractionRecord];

    /// Records with `interactor_a == a && interactor_b == b`.
    fn filter_interactions(&self, a: &str, b: &str) -> Vec<&InteractionRecord>;

    /// Distinct evidence types among `filter_interactions(a, b)`.
    fn filter_functions(&self, a: &str, b: &str) -> BTreeSet<String> {
        self.filter_interactions(a, b)
            .into_iter()
            .map(|r| r.evidence_type.clone())
            .collect()
    }

    /// Keep only records where either interactor is in `nodes`.
    fn trim_rows(&mut self, nodes: &HashSet<&str>);
}

/// Evidence records plus an ordered-pair index built once at load time.
#[derive(Debug, Clone, Default)]
pub struct EvidenceTable {
    records: Vec<InteractionRecord>,
    /// interactor A -> interactor B -> row indices
    by_pair: HashMap<String, HashMap<String, Vec<usize>>>,
}

impl EvidenceTable {
    pub fn from_records(records: Vec<InteractionRecord>) -> Self {
        let mut by_pair: HashMap<String, HashMap<String, Vec<usize>>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_pair
                .entry(r.interactor_a.clone())
                .or_default()
                .entry(r.interactor_b.clone())
                .or_default()
                .push(i);
        }
        Self { records, by_pair }
    }

    /// Parse a tab-separated table with a header row. The five required columns may appear
    /// in any position; other columns are ignored. A missing column is fatal.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(h) => h?,
            None => return Err(Error::MissingColumn(COL_INTERACTOR_A.to_string())),
        };
        let columns: Vec<&str> = header.trim_end_matches(['\r', '\n']).split('\t').collect();
        let mut pos = [0usize; 5];
        for (slot, name) in pos.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = columns
                .iter()
                .position(|c| c.trim() == name)
                .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
        }
        let width = pos.iter().copied().max().unwrap_or(0) + 1;

        let mut records = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < width {
                return Err(Error::MalformedEvidence {
                    line: i + 2,
                    reason: format!("expected at least {width} fields, found {}", fields.len()),
                });
            }
            let score = match fields[pos[4]].trim() {
                "" | "-" => None,
                s => Some(s.parse::<f64>().map_err(|_| Error::MalformedEvidence {
                    line: i + 2,
                    reason: format!("score `{s}` is not a number"),
                })?),
            };
            records.push(InteractionRecord {
                interactor_a: fields[pos[0]].trim().to_string(),
                interactor_b: fields[pos[1]].trim().to_string(),
                evidence_type: fields[pos[2]].trim().to_string(),
                evidence_category: fields[pos[3]].trim().to_string(),
                score,
            });
        }
        debug!(records = records.len(), "evidence table parsed");
        Ok(Self::from_records(records))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InteractionDatabase for EvidenceTable {
    fn records(&self) -> &[InteractionRecord] {
        &self.records
    }

    fn filter_interactions(&self, a: &str, b: &str) -> Vec<&InteractionRecord> {
        match self.by_pair.get(a).and_then(|row| row.get(b)) {
            Some(rows) => rows.iter().map(|&i| &self.records[i]).collect(),
            None => Vec::new(),
        }
    }

    fn trim_rows(&mut self, nodes: &HashSet<&str>) {
        let before = self.records.len();
        let kept: Vec<InteractionRecord> = std::mem::take(&mut self.records)
            .into_iter()
            .filter(|r| {
                nodes.contains(r.interactor_a.as_str()) || nodes.contains(r.interactor_b.as_str())
            })
            .collect();
        *self = Self::from_records(kept);
        debug!(before, after = self.records.len(), "evidence table trimmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
#BioGRID Interaction ID\tSystematic Name Interactor A\tSystematic Name Interactor B\tExperimental System\tExperimental System Type\tScore
1\tYAL001C\tYBR002W\tTwo-hybrid\tphysical\t-
2\tYAL001C\tYBR002W\tAffinity Capture-MS\tphysical\t0.87
3\tYBR002W\tYAL001C\tTwo-hybrid\tphysical\t
4\tYCR003X\tYDR004Y\tSynthetic Lethality\tgenetic\t-
";

    #[test]
    fn loads_required_columns_and_indexes_pairs() {
        let db = EvidenceTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(db.len(), 4);
        assert_eq!(db.filter_interactions("YAL001C", "YBR002W").len(), 2);
        assert_eq!(db.records()[1].score, Some(0.87));
        let types = db.filter_functions("YAL001C", "YBR002W");
        assert_eq!(
            types.into_iter().collect::<Vec<_>>(),
            vec!["Affinity Capture-MS".to_string(), "Two-hybrid".to_string()]
        );
    }

    #[test]
    fn lookups_are_directional() {
        let db = EvidenceTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(db.filter_interactions("YBR002W", "YAL001C").len(), 1);
        assert!(db.filter_interactions("YDR004Y", "YCR003X").is_empty());
    }

    #[test]
    fn missing_column_is_fatal() {
        let bad = "Systematic Name Interactor A\tSystematic Name Interactor B\tScore\nA\tB\t-\n";
        let err = EvidenceTable::from_reader(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == COL_EVIDENCE_TYPE));
    }

    #[test]
    fn trim_keeps_rows_touching_the_node_set() {
        let mut db = EvidenceTable::from_reader(TABLE.as_bytes()).unwrap();
        let nodes: HashSet<&str> = ["YAL001C"].into_iter().collect();
        db.trim_rows(&nodes);
        assert_eq!(db.len(), 3);
        assert!(db.filter_interactions("YCR003X", "YDR004Y").is_empty());
        assert_eq!(db.filter_interactions("YAL001C", "YBR002W").len(), 2);
    }
}
