//! Price merge engine.
//!
//! Annotates an unpriced reference tree with unit prices from a priced
//! document. The merge is shape-preserving: the output tree has exactly the
//! sections and positions of the reference, in reference document order, and
//! the priced document only ever contributes prices, never structure.
//!
//! Matching is keyed by a configurable field (ordinal path by default). A
//! duplicate key among the priced positions makes every lookup of that key
//! ambiguous, so the merge fails fast instead of guessing. Everything softer
//! (unmatched positions, descriptive-field disagreements) lands in the
//! [`MergeReport`] and never aborts the run.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, info};

use gaeb_models::{
    BoqNode, BoqTree, FieldConflict, MatchKey, MatchedEntry, MergeConflict, MergeReport, Phase,
    Position, Section,
};

use crate::config::MergeConfig;
use crate::error::{GaebError, GaebResult};

/// Knobs of one merge run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Field correlating positions across the two documents.
    pub match_key: MatchKey,
    /// Absolute quantity difference tolerated before a conflict is reported.
    pub quantity_tolerance: Decimal,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            match_key: MatchKey::default(),
            quantity_tolerance: Decimal::ZERO,
        }
    }
}

impl From<&MergeConfig> for MergeOptions {
    fn from(config: &MergeConfig) -> Self {
        Self {
            match_key: config.match_key,
            quantity_tolerance: config.quantity_tolerance,
        }
    }
}

/// Merges prices from `priced` into a copy of `reference`.
///
/// Returns the annotated tree (phase B, since it now carries prices) together
/// with the merge report. Fails only on an ambiguous match key among the
/// priced positions.
pub fn merge_priced(
    reference: &BoqTree,
    priced: &BoqTree,
    options: &MergeOptions,
) -> GaebResult<(BoqTree, MergeReport)> {
    debug!(
        match_key = ?options.match_key,
        reference_positions = reference.position_count(),
        priced_positions = priced.position_count(),
        "starting price merge"
    );

    let index = index_priced(priced, options.match_key)?;

    let mut report = MergeReport::new(options.match_key);
    let mut consumed: HashSet<&str> = HashSet::new();

    struct Frame<'a> {
        section: Section,
        children: std::slice::Iter<'a, BoqNode>,
    }

    fn frame(source: &Section) -> Frame<'_> {
        Frame {
            section: Section {
                id: source.id,
                label: source.label.clone(),
                title: source.title.clone(),
                children: Vec::new(),
            },
            children: source.children.iter(),
        }
    }

    let mut stack = vec![frame(&reference.root)];
    let root = loop {
        let top = stack.last_mut().expect("stack is never empty");
        match top.children.next() {
            Some(BoqNode::Section(child)) => stack.push(frame(child)),
            Some(BoqNode::Position(child)) => {
                let annotated = annotate(child, &index, options, &mut consumed, &mut report);
                top.section.children.push(BoqNode::Position(annotated));
            }
            None => {
                let done = stack.pop().expect("stack is never empty");
                match stack.last_mut() {
                    Some(parent) => parent.section.children.push(BoqNode::Section(done.section)),
                    None => break done.section,
                }
            }
        }
    };

    // priced positions nobody looked up, in priced document order
    for position in priced.iter_positions() {
        let matched = options
            .match_key
            .key_for(position)
            .is_some_and(|key| consumed.contains(key.as_str()));
        if !matched {
            report.unmatched_priced.push(position.oz_path.clone());
        }
    }

    let mut merged = BoqTree::new(Phase::B, root);
    merged.project = reference.project.clone();

    let summary = report.summary();
    info!(
        matched = summary.matched,
        conflicts = summary.conflicts,
        unmatched_reference = summary.unmatched_reference,
        unmatched_priced = summary.unmatched_priced,
        "price merge finished"
    );
    Ok((merged, report))
}

/// Indexes the priced positions by match key, failing on the first duplicate.
fn index_priced(
    priced: &BoqTree,
    match_key: MatchKey,
) -> GaebResult<HashMap<String, &Position>> {
    let mut index: HashMap<String, &Position> = HashMap::new();
    for position in priced.iter_positions() {
        let Some(key) = match_key.key_for(position) else {
            continue;
        };
        if let Some(first) = index.get(&key) {
            return Err(GaebError::AmbiguousMatch {
                key,
                first_path: first.oz_path.to_string(),
                second_path: position.oz_path.to_string(),
            });
        }
        index.insert(key, position);
    }
    Ok(index)
}

/// Copies one reference position, taking the unit price from its priced
/// counterpart when one exists.
fn annotate<'a>(
    position: &Position,
    index: &'a HashMap<String, &Position>,
    options: &MergeOptions,
    consumed: &mut HashSet<&'a str>,
    report: &mut MergeReport,
) -> Position {
    let mut annotated = position.clone();

    let Some(key) = options.match_key.key_for(position) else {
        report.unmatched_reference.push(position.oz_path.clone());
        return annotated;
    };
    let Some((key, counterpart)) = index.get_key_value(&key) else {
        report.unmatched_reference.push(position.oz_path.clone());
        return annotated;
    };
    consumed.insert(key.as_str());

    // the price is copied even when descriptive fields disagree; the
    // conflict entry tells the caller the match may have been unsound
    annotated.unit_price = counterpart.unit_price;

    let mut fields = Vec::new();
    if position.unit != counterpart.unit {
        fields.push(FieldConflict::Unit {
            reference: position.unit,
            priced: counterpart.unit,
        });
    }
    if (position.quantity - counterpart.quantity).abs() > options.quantity_tolerance {
        fields.push(FieldConflict::Quantity {
            reference: position.quantity,
            priced: counterpart.quantity,
        });
    }

    if fields.is_empty() {
        report.matched.push(MatchedEntry {
            path: position.oz_path.clone(),
            key: key.clone(),
        });
    } else {
        report.conflicts.push(MergeConflict {
            path: position.oz_path.clone(),
            key: key.clone(),
            fields,
        });
    }
    annotated
}
