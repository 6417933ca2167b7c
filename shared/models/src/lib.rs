//! # GAEB BoQ Domain Models
//!
//! Core domain models for the GAEB bill-of-quantities exchange system.
//! All models implement serialization/deserialization with serde; the flat
//! persistence record shapes additionally carry validator-derived checks.
//!
//! ## Key Models
//!
//! - **BoqTree**: a validated bill of quantities, a single-rooted ordered
//!   tree of sections and positions in document order
//! - **Position**: a leaf work item with ordinal path, quantity, unit, and
//!   optional unit price
//! - **OzPath**: the dot-separated ordinal path identifying a node and
//!   serving as the default merge key
//! - **MergeReport**: matched pairs, conflicts, and unmatched positions of
//!   one price merge run
//! - **RecordBatch**: the flat record shape handed to the persistence adapter
//!
//! Quantities and prices use fixed-point decimals throughout; monetary totals
//! are rounded half-up to cents.

pub mod boq;
pub mod path;
pub mod record;
pub mod report;
pub mod unit;


pub use boq::{money, BoqNode, BoqTree, MatchKey, Phase, Position, Section};
pub use path::OzPath;
pub use record::{BoqRecord, PositionRecord, RecordBatch, SectionRecord};
pub use report::{FieldConflict, MatchedEntry, MergeConflict, MergeReport, MergeSummary};
pub use unit::Unit;
