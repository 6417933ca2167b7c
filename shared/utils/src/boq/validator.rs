//! Phase-specific validation and draft-to-typed tree conversion.
//!
//! Validation never stops at the first failure: the whole tree is checked in
//! one pass and every violation is reported together, each tagged with the
//! offending ordinal path and field name. Only a violation-free draft becomes
//! a typed [`BoqTree`].
//!
//! Phase rules:
//! - phase A (unpriced): quantity and unit are required; a unit price, if the
//!   element exists at all, must be zero. Partially priced phase-A documents
//!   are rejected.
//! - phase B (priced): the unit price is required and non-negative; when the
//!   wire carries only a total (`IT`) and a non-zero quantity, the unit price
//!   is derived as total / quantity.
//! - both: every numeric field must parse as a non-negative fixed-point
//!   decimal (decimal commas are accepted).

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use gaeb_models::{BoqNode, BoqTree, Phase, Position, Section, Unit};

use crate::boq::builder::{DraftNode, DraftPosition, DraftSection, DraftTree};
use crate::error::{GaebResult, ValidationError, Violation, ViolationKind};

/// Parses a raw wire decimal. `Ok(None)` means absent/empty, `Err` carries
/// the offending text. Decimal commas are normalized first.
fn parse_decimal(raw: &str) -> Result<Option<Decimal>, String> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| raw.trim().to_string())
}

/// Validates a draft tree against the declared phase and converts it into a
/// typed, immutable [`BoqTree`]. All violations are collected before failing.
pub fn validate(draft: DraftTree, phase: Phase) -> GaebResult<BoqTree> {
    debug!(
        phase = phase.as_str(),
        version = draft.version.as_deref().unwrap_or("unknown"),
        "validating draft tree"
    );

    let mut violations = Vec::new();

    struct Frame {
        section: Section,
        children: std::vec::IntoIter<DraftNode>,
    }

    fn frame(draft: DraftSection) -> Frame {
        Frame {
            section: Section::new(draft.label, draft.title),
            children: draft.children.into_iter(),
        }
    }

    let mut stack = vec![frame(draft.root)];
    let root = loop {
        let top = stack.last_mut().expect("stack is never empty");
        match top.children.next() {
            Some(DraftNode::Section(child)) => stack.push(frame(child)),
            Some(DraftNode::Position(child)) => {
                let position = validate_position(child, phase, &mut violations);
                top.section.children.push(BoqNode::Position(position));
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

    if !violations.is_empty() {
        return Err(ValidationError::new(violations).into());
    }

    let mut root = root;
    if root.title.is_empty() {
        if let Some(project) = &draft.project {
            root.title = project.clone();
        }
    }
    let mut tree = BoqTree::new(phase, root);
    tree.project = draft.project;
    Ok(tree)
}

/// Checks one position, pushing violations; always returns a best-effort
/// typed position so the walk can continue collecting.
fn validate_position(
    draft: DraftPosition,
    phase: Phase,
    violations: &mut Vec<Violation>,
) -> Position {
    let path = draft.oz_path.to_string();
    let fields = draft.fields;

    let mut violation = |field: &str, kind: ViolationKind, message: String| {
        violations.push(Violation {
            path: path.clone(),
            field: field.to_string(),
            kind,
            message,
        });
    };

    let mut numeric = |field: &str, raw: &Option<String>| match raw.as_deref() {
        None => None,
        Some(raw) => match parse_decimal(raw) {
            Ok(value) => value,
            Err(text) => {
                violation(
                    field,
                    ViolationKind::FieldFormat,
                    format!("'{text}' is not a well-formed decimal"),
                );
                None
            }
        },
    };

    let quantity = numeric("quantity", &fields.quantity);
    let unit_price = numeric("unit_price", &fields.unit_price);
    let total_price = numeric("total_price", &fields.total_price);

    let mut violation = |field: &str, kind: ViolationKind, message: String| {
        violations.push(Violation {
            path: path.clone(),
            field: field.to_string(),
            kind,
            message,
        });
    };

    for (field, value) in [
        ("quantity", quantity),
        ("unit_price", unit_price),
        ("total_price", total_price),
    ] {
        if let Some(value) = value {
            if value.is_sign_negative() {
                violation(
                    field,
                    ViolationKind::FieldFormat,
                    format!("'{value}' must be non-negative"),
                );
            }
        }
    }

    let unit_raw = fields.unit.as_deref().map(str::trim).unwrap_or("");

    let unit_price = match phase {
        Phase::A => {
            if quantity.is_none() {
                violation(
                    "quantity",
                    ViolationKind::MissingField,
                    "quantity is required in the unpriced phase".to_string(),
                );
            }
            if unit_raw.is_empty() {
                violation(
                    "unit",
                    ViolationKind::MissingField,
                    "unit is required in the unpriced phase".to_string(),
                );
            }
            match unit_price {
                Some(up) if !up.is_zero() => {
                    violation(
                        "unit_price",
                        ViolationKind::PhaseRule,
                        format!("unit price {up} is not allowed in an unpriced document"),
                    );
                    // keep the offending value out of the typed tree
                    None
                }
                _ => None,
            }
        }
        Phase::B => {
            // derive UP from IT when only the total was transmitted
            let derived = match (unit_price, total_price, quantity) {
                (None, Some(total), Some(qty)) if !qty.is_zero() => Some(total / qty),
                (up, _, _) => up,
            };
            if derived.is_none() {
                violation(
                    "unit_price",
                    ViolationKind::MissingField,
                    "unit price is required in the priced phase".to_string(),
                );
            }
            derived.filter(|up| !up.is_sign_negative())
        }
    };

    Position {
        id: Uuid::new_v4(),
        label: fields.label,
        oz_path: draft.oz_path,
        short_text: fields.short_text,
        long_text: fields.long_text.filter(|t| !t.is_empty()),
        unit: Unit::from_raw(unit_raw),
        quantity: quantity.unwrap_or_default(),
        unit_price,
        item_id: fields.item_id,
    }
}
