//! GAEB DA XML bill-of-quantities processing.
//!
//! The pipeline has three parsing stages plus two consumers:
//!
//! 1. [`reader`] turns raw bytes into a flat stream of structural events,
//!    checking wire-level well-formedness and the declared exchange phase.
//! 2. [`builder`] assembles the events into a draft tree and rejects
//!    structural defects (unbalanced sections, duplicate ordinal paths).
//! 3. [`validator`] applies the phase rules, parses numeric fields, and
//!    produces the typed, immutable [`BoqTree`].
//!
//! On top of the parsed trees, [`merge`] prices an unpriced reference
//! document from a priced one, and [`export`] flattens trees into storage
//! records.
//!
//! [`parse`] and [`merge_priced`] are the entry points most callers want.

pub mod builder;
pub mod export;
pub mod merge;
pub mod reader;
pub mod validator;

pub use export::{export, flatten, BoqSink, InMemorySink};
pub use merge::{merge_priced, MergeOptions};
pub use reader::{DocumentReader, PositionEvent, StructuralEvent};

use tracing::{info, instrument};

use gaeb_models::{BoqTree, Phase};

use crate::error::GaebResult;

/// Parses one exchange document declared to be in `phase`.
///
/// Runs the full pipeline: structural read, tree assembly, phase validation.
/// The first wire or structural defect aborts the parse; phase and field
/// violations are collected across the whole document and returned together.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn parse(phase: Phase, content: &[u8]) -> GaebResult<BoqTree> {
    let reader = DocumentReader::new(content, phase);
    let draft = builder::build(reader, phase)?;
    let tree = validator::validate(draft, phase)?;
    info!(
        boq_id = %tree.id,
        positions = tree.position_count(),
        "parsed exchange document"
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::error::GaebError;

    const UNPRICED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GAEB>
  <GAEBInfo><Version>3.2</Version><DP>83</DP></GAEBInfo>
  <PrjInfo><BoQInfo><Name>Halle 3</Name></BoQInfo></PrjInfo>
  <BoQ>
    <BoQBody>
      <BoQCtgy RNoPart="01">
        <LblTx>Earthworks</LblTx>
        <Item RNoPart="001">
          <Qty>10</Qty>
          <QU>m3</QU>
          <Description><CompleteText><OutlineText><OutlTxt><TextOutlTxt>
            <ShortText>Excavate topsoil</ShortText>
          </TextOutlTxt></OutlTxt></OutlineText></CompleteText></Description>
        </Item>
        <Item RNoPart="002">
          <Qty>5</Qty>
          <QU>m2</QU>
          <Description><CompleteText><OutlineText><OutlTxt><TextOutlTxt>
            <ShortText>Level subgrade</ShortText>
          </TextOutlTxt></OutlTxt></OutlineText></CompleteText></Description>
        </Item>
      </BoQCtgy>
    </BoQBody>
  </BoQ>
</GAEB>"#;

    const PRICED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GAEB>
  <GAEBInfo><Version>3.2</Version><DP>84</DP></GAEBInfo>
  <BoQ>
    <BoQBody>
      <BoQCtgy RNoPart="01">
        <LblTx>Earthworks</LblTx>
        <Item RNoPart="001">
          <Qty>10</Qty>
          <QU>m3</QU>
          <UP>2.50</UP>
        </Item>
        <Item RNoPart="003">
          <Qty>1</Qty>
          <QU>St</QU>
          <UP>99.00</UP>
        </Item>
      </BoQCtgy>
    </BoQBody>
  </BoQ>
</GAEB>"#;

    #[test]
    fn test_parse_unpriced_document() {
        let tree = parse(Phase::A, UNPRICED.as_bytes()).unwrap();
        assert_eq!(tree.phase, Phase::A);
        assert_eq!(tree.project.as_deref(), Some("Halle 3"));
        assert_eq!(tree.position_count(), 2);

        let first = tree.iter_positions().next().unwrap();
        assert_eq!(first.oz_path.to_string(), "01.001");
        assert_eq!(first.short_text, "Excavate topsoil");
        assert_eq!(first.quantity, dec!(10));
        assert_eq!(first.unit_price, None);
    }

    #[test]
    fn test_parse_priced_document() {
        let tree = parse(Phase::B, PRICED.as_bytes()).unwrap();
        assert_eq!(tree.sum_net(), dec!(124.00));
    }

    #[test]
    fn test_declared_phase_must_match_wire_phase() {
        let err = parse(Phase::B, UNPRICED.as_bytes()).unwrap_err();
        match err {
            GaebError::UnsupportedPhase { expected, found } => {
                assert_eq!(expected, "84");
                assert_eq!(found, "83");
            }
            other => panic!("expected UnsupportedPhase, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_then_merge_end_to_end() {
        let reference = parse(Phase::A, UNPRICED.as_bytes()).unwrap();
        let priced = parse(Phase::B, PRICED.as_bytes()).unwrap();

        let (merged, report) =
            merge_priced(&reference, &priced, &MergeOptions::default()).unwrap();

        assert_eq!(merged.position_count(), 2);
        let first = merged.iter_positions().next().unwrap();
        assert_eq!(first.total_price(), Some(dec!(25.00)));

        assert_eq!(report.matched.len(), 1);
        assert_eq!(report.unmatched_reference.len(), 1);
        assert_eq!(report.unmatched_reference[0].to_string(), "01.002");
        assert_eq!(report.unmatched_priced.len(), 1);
        assert_eq!(report.unmatched_priced[0].to_string(), "01.003");
    }

    #[test]
    fn test_mismatched_markup_is_malformed() {
        let err = parse(Phase::A, b"<GAEB><BoQ></GAEB>").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }
}
