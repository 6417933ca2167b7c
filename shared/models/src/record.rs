//! Flat record shapes handed to the persistence adapter.
//!
//! The layout mirrors the storage schema of the surrounding service (one row
//! per BoQ, section, and position, linked by UUID foreign keys). The core only
//! produces these records; how and whether they are written is the adapter's
//! decision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Header row of a stored bill of quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BoqRecord {
    pub id: Uuid,
    #[validate(length(min = 1, max = 8))]
    pub phase: String,
    #[validate(length(max = 200))]
    pub project: Option<String>,
    pub created_at: DateTime<Utc>,
    pub meta: Option<serde_json::Value>,
}

/// One section row; `parent_id` is `None` for the document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SectionRecord {
    pub id: Uuid,
    pub boq_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub oz_path: Option<String>,
    #[validate(length(max = 500))]
    pub title_text: Option<String>,
    /// Nesting depth; the root section is level 0.
    pub level: i32,
    /// Document-order index across all sections of one BoQ.
    pub sort_index: i32,
}

/// One position row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PositionRecord {
    pub id: Uuid,
    pub boq_id: Uuid,
    pub section_id: Uuid,
    #[validate(length(min = 1))]
    pub oz_path: String,
    #[validate(length(min = 1))]
    pub oz: String,
    pub short_text: String,
    pub long_text: Option<String>,
    pub unit: String,
    #[validate(custom = "non_negative")]
    pub qty: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_price_net: Option<Decimal>,
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

/// Everything the adapter needs to persist one tree atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub boq: BoqRecord,
    pub sections: Vec<SectionRecord>,
    pub positions: Vec<PositionRecord>,
}

impl RecordBatch {
    /// Validates every record in the batch, reporting the first offender.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.boq.validate()?;
        for section in &self.sections {
            section.validate()?;
        }
        for position in &self.positions {
            position.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position_record(qty: Decimal) -> PositionRecord {
        PositionRecord {
            id: Uuid::new_v4(),
            boq_id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            oz_path: "01.001".to_string(),
            oz: "001".to_string(),
            short_text: "Excavation".to_string(),
            long_text: None,
            unit: "m^3".to_string(),
            qty,
            unit_price: Some(dec!(2.50)),
            total_price_net: Some(dec!(25.00)),
        }
    }

    #[test]
    fn test_position_record_rejects_negative_quantity() {
        assert!(position_record(dec!(10)).validate().is_ok());
        assert!(position_record(dec!(-1)).validate().is_err());
    }

    #[test]
    fn test_position_record_requires_path() {
        let mut record = position_record(dec!(1));
        record.oz_path.clear();
        assert!(record.validate().is_err());
    }
}
