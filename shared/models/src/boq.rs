//! Core BoQ (bill of quantities) domain model.
//!
//! A parsed GAEB document becomes a [`BoqTree`]: a single root [`Section`]
//! owning an ordered mix of child sections and [`Position`] work items.
//! Child order is the document order of the exchange file and is never
//! derived or re-sorted. Trees are assembled once per parse call and are not
//! mutated afterwards; the merge engine builds new trees instead of editing
//! its inputs.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::path::OzPath;
use crate::unit::Unit;

/// Rounds a monetary amount to cents, half-up.
pub fn money(x: Decimal) -> Decimal {
    x.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Exchange phase of a GAEB document.
///
/// Phase A (wire data-phase "83") is the unpriced specification sent to
/// bidders; phase B ("84") is the priced counterpart returned by a bidder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    A,
    B,
}

impl Phase {
    /// Parses the many spellings found in practice ("A", "X83", "83", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "A" | "X83" | "83" | "DA83" => Some(Self::A),
            "B" | "X84" | "84" | "DA84" => Some(Self::B),
            _ => None,
        }
    }

    /// The `DP` (data phase) marker carried inside the exchange file.
    pub fn data_phase(&self) -> &'static str {
        match self {
            Self::A => "83",
            Self::B => "84",
        }
    }

    /// Conventional file-extension style name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "X83",
            Self::B => "X84",
        }
    }

    pub fn is_priced(&self) -> bool {
        matches!(self, Self::B)
    }
}

/// A leaf work item of the bill of quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Stable identity for diagnostics and storage; never used for matching.
    pub id: Uuid,
    /// The position's own ordinal label within its section, e.g. "003".
    pub label: String,
    /// Full ordinal path from the document root, e.g. "01.02.003".
    pub oz_path: OzPath,
    pub short_text: String,
    pub long_text: Option<String>,
    pub unit: Unit,
    /// Quantity to be performed; non-negative.
    pub quantity: Decimal,
    /// Net unit price; absent in unpriced documents.
    pub unit_price: Option<Decimal>,
    /// Item identifier carried by the exchange file (`Item/@ID`), if any.
    /// Some re-issued documents renumber sections but keep these stable, so
    /// they can serve as an alternate match key.
    pub item_id: Option<String>,
}

impl Position {
    /// Net total, derived as quantity x unit price, rounded to cents.
    pub fn total_price(&self) -> Option<Decimal> {
        self.unit_price.map(|up| money(up * self.quantity))
    }
}

/// A grouping node of the BoQ hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    /// Ordinal label of this section ("01"); empty for the document root.
    pub label: String,
    pub title: String,
    /// Child sections and positions in document order.
    pub children: Vec<BoqNode>,
}

impl Section {
    pub fn new(label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Walks this section and all descendant sections in document order.
    /// Uses an explicit stack, so depth is bounded by memory only.
    pub fn walk_sections(&self) -> SectionIter<'_> {
        SectionIter { stack: vec![self] }
    }

    /// All positions under this section in document order.
    pub fn iter_positions(&self) -> PositionIter<'_> {
        PositionIter {
            stack: vec![NodeRef::Section(self)],
        }
    }
}

/// A child of a [`Section`]: either a nested section or a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoqNode {
    Section(Section),
    Position(Position),
}

enum NodeRef<'a> {
    Section(&'a Section),
    Position(&'a Position),
}

/// Document-order iterator over descendant sections.
pub struct SectionIter<'a> {
    stack: Vec<&'a Section>,
}

impl<'a> Iterator for SectionIter<'a> {
    type Item = &'a Section;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.stack.pop()?;
        // push in reverse so children come off the stack in document order
        for child in section.children.iter().rev() {
            if let BoqNode::Section(s) = child {
                self.stack.push(s);
            }
        }
        Some(section)
    }
}

/// Document-order iterator over descendant positions.
pub struct PositionIter<'a> {
    stack: Vec<NodeRef<'a>>,
}

impl<'a> Iterator for PositionIter<'a> {
    type Item = &'a Position;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                NodeRef::Position(p) => return Some(p),
                NodeRef::Section(s) => {
                    for child in s.children.iter().rev() {
                        self.stack.push(match child {
                            BoqNode::Section(c) => NodeRef::Section(c),
                            BoqNode::Position(p) => NodeRef::Position(p),
                        });
                    }
                }
            }
        }
        None
    }
}

/// A complete, validated bill of quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoqTree {
    pub id: Uuid,
    pub phase: Phase,
    pub project: Option<String>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub root: Section,
}

impl BoqTree {
    pub fn new(phase: Phase, root: Section) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase,
            project: None,
            currency: "EUR".to_string(),
            created_at: Utc::now(),
            root,
        }
    }

    pub fn iter_positions(&self) -> PositionIter<'_> {
        self.root.iter_positions()
    }

    pub fn position_count(&self) -> usize {
        self.iter_positions().count()
    }

    /// Sum of all derived position totals; positions without a price
    /// contribute nothing.
    pub fn sum_net(&self) -> Decimal {
        money(
            self.iter_positions()
                .filter_map(Position::total_price)
                .sum(),
        )
    }
}

/// Field used to correlate positions between two documents during a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKey {
    /// Full ordinal path, e.g. "01.02.003" (the default).
    #[default]
    OzPath,
    /// The position's own label only, ignoring section numbering.
    Oz,
    /// The stable item identifier carried by the exchange file.
    ItemId,
}

impl MatchKey {
    /// Extracts the match key of a position, if it has one.
    pub fn key_for(&self, position: &Position) -> Option<String> {
        match self {
            Self::OzPath => Some(position.oz_path.to_string()),
            Self::Oz => {
                if position.label.is_empty() {
                    None
                } else {
                    Some(position.label.clone())
                }
            }
            Self::ItemId => position.item_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(path: &str, qty: Decimal, unit_price: Option<Decimal>) -> Position {
        let oz_path: OzPath = path.parse().unwrap();
        Position {
            id: Uuid::new_v4(),
            label: oz_path.label().unwrap_or_default().to_string(),
            oz_path,
            short_text: "test item".to_string(),
            long_text: None,
            unit: Unit::Mtr,
            quantity: qty,
            unit_price,
            item_id: None,
        }
    }

    fn sample_tree() -> BoqTree {
        let mut inner = Section::new("01", "Earthworks");
        inner
            .children
            .push(BoqNode::Position(position("01.001", dec!(10), Some(dec!(2.50)))));
        inner
            .children
            .push(BoqNode::Position(position("01.002", dec!(5), None)));
        let mut root = Section::new("", "Project");
        root.children.push(BoqNode::Section(inner));
        root.children
            .push(BoqNode::Position(position("900", dec!(1), Some(dec!(0.333)))));
        BoqTree::new(Phase::B, root)
    }

    #[test]
    fn test_phase_parsing() {
        assert_eq!(Phase::parse("A"), Some(Phase::A));
        assert_eq!(Phase::parse("x84"), Some(Phase::B));
        assert_eq!(Phase::parse("83"), Some(Phase::A));
        assert_eq!(Phase::parse("C"), None);
    }

    #[test]
    fn test_total_price_is_rounded_half_up() {
        let p = position("01.001", dec!(1), Some(dec!(0.005)));
        assert_eq!(p.total_price(), Some(dec!(0.01)));
        let unpriced = position("01.002", dec!(10), None);
        assert_eq!(unpriced.total_price(), None);
    }

    #[test]
    fn test_iter_positions_document_order() {
        let tree = sample_tree();
        let paths: Vec<String> = tree
            .iter_positions()
            .map(|p| p.oz_path.to_string())
            .collect();
        assert_eq!(paths, vec!["01.001", "01.002", "900"]);
    }

    #[test]
    fn test_sum_net_skips_unpriced_positions() {
        let tree = sample_tree();
        // 10 * 2.50 = 25.00, plus money(1 * 0.333) = 0.33
        assert_eq!(tree.sum_net(), dec!(25.33));
    }

    #[test]
    fn test_match_key_selection() {
        let mut p = position("01.02.003", dec!(1), None);
        assert_eq!(MatchKey::OzPath.key_for(&p), Some("01.02.003".to_string()));
        assert_eq!(MatchKey::Oz.key_for(&p), Some("003".to_string()));
        assert_eq!(MatchKey::ItemId.key_for(&p), None);
        p.item_id = Some("ID-7".to_string());
        assert_eq!(MatchKey::ItemId.key_for(&p), Some("ID-7".to_string()));
    }

    #[test]
    fn test_walk_sections_visits_all() {
        let tree = sample_tree();
        let labels: Vec<&str> = tree
            .root
            .walk_sections()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, vec!["", "01"]);
    }
}
