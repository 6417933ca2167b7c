//! Merge report produced by the price merge engine.
//!
//! The report is the only channel for non-fatal merge findings: conflicts and
//! unmatched positions never abort a merge, but they are always surfaced so
//! the caller can decide whether persistence should proceed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::boq::MatchKey;
use crate::path::OzPath;
use crate::unit::Unit;

/// A reference position that found its priced counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEntry {
    pub path: OzPath,
    pub key: String,
}

/// Which position field disagreed between the two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldConflict {
    Unit { reference: Unit, priced: Unit },
    Quantity { reference: Decimal, priced: Decimal },
}

impl FieldConflict {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Unit { .. } => "unit",
            Self::Quantity { .. } => "quantity",
        }
    }
}

/// A matched pair whose descriptive fields disagree.
///
/// The price is still taken from the priced document; the conflict records
/// what differed so a human can judge whether the match was sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub path: OzPath,
    pub key: String,
    pub fields: Vec<FieldConflict>,
}

/// Aggregate counters, handy for logging and quick checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub matched: usize,
    pub conflicts: usize,
    pub unmatched_reference: usize,
    pub unmatched_priced: usize,
}

/// Outcome of one merge run.
///
/// All entry lists are in document order (reference order for matches,
/// conflicts, and unmatched reference entries; priced-document order for
/// unmatched priced entries), so two runs over the same inputs produce
/// byte-identical reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub match_key: MatchKey,
    pub matched: Vec<MatchedEntry>,
    pub conflicts: Vec<MergeConflict>,
    /// Reference positions with no priced counterpart; they stay unpriced.
    pub unmatched_reference: Vec<OzPath>,
    /// Priced positions never consumed by a lookup; surfaced, never inserted.
    pub unmatched_priced: Vec<OzPath>,
}

impl MergeReport {
    pub fn new(match_key: MatchKey) -> Self {
        Self {
            match_key,
            matched: Vec::new(),
            conflicts: Vec::new(),
            unmatched_reference: Vec::new(),
            unmatched_priced: Vec::new(),
        }
    }

    /// True when every reference position was priced without discrepancies
    /// and the priced document contained nothing extra.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
            && self.unmatched_reference.is_empty()
            && self.unmatched_priced.is_empty()
    }

    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            matched: self.matched.len(),
            conflicts: self.conflicts.len(),
            unmatched_reference: self.unmatched_reference.len(),
            unmatched_priced: self.unmatched_priced.len(),
        }
    }
}
