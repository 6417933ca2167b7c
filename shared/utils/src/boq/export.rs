//! Flattens a typed BoQ tree into storage records and hands them to a sink.
//!
//! The core stays storage-agnostic: [`flatten`] produces the row shapes and
//! [`BoqSink`] is the seam where the surrounding service plugs in its actual
//! database (or a test double). Records come out in document order, so a
//! sink that inserts sequentially reproduces the wire order.

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use gaeb_models::{
    BoqNode, BoqRecord, BoqTree, OzPath, PositionRecord, RecordBatch, Section, SectionRecord,
};

/// Destination for flattened BoQ records.
pub trait BoqSink {
    fn persist(&mut self, batch: &RecordBatch) -> anyhow::Result<()>;
}

/// Sink that just keeps every batch; used in tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pub batches: Vec<RecordBatch>,
}

impl BoqSink for InMemorySink {
    fn persist(&mut self, batch: &RecordBatch) -> anyhow::Result<()> {
        self.batches.push(batch.clone());
        Ok(())
    }
}

/// Flattens a tree into one header row plus section and position rows.
///
/// Sections get a document-order `sort_index` and their nesting `level`; both
/// record vectors are in document order.
pub fn flatten(tree: &BoqTree) -> RecordBatch {
    let boq = BoqRecord {
        id: tree.id,
        phase: tree.phase.as_str().to_string(),
        project: tree.project.clone(),
        created_at: tree.created_at,
        meta: Some(json!({ "currency": tree.currency })),
    };

    let mut sections = Vec::new();
    let mut positions = Vec::new();
    let mut sort_index = 0i32;

    struct Frame<'a> {
        section_id: Uuid,
        path: OzPath,
        children: std::slice::Iter<'a, BoqNode>,
    }

    fn open<'a>(
        sections: &mut Vec<SectionRecord>,
        sort_index: &mut i32,
        boq_id: Uuid,
        section: &'a Section,
        parent: Option<(Uuid, OzPath)>,
    ) -> Frame<'a> {
        let path = match &parent {
            Some((_, parent_path)) => parent_path.child(&section.label),
            None => OzPath::default(),
        };
        sections.push(SectionRecord {
            id: section.id,
            boq_id,
            parent_id: parent.map(|(id, _)| id),
            oz_path: (!path.is_empty()).then(|| path.to_string()),
            title_text: (!section.title.is_empty()).then(|| section.title.clone()),
            level: path.depth() as i32,
            sort_index: *sort_index,
        });
        *sort_index += 1;
        Frame {
            section_id: section.id,
            path,
            children: section.children.iter(),
        }
    }

    let mut stack = vec![open(&mut sections, &mut sort_index, tree.id, &tree.root, None)];
    while let Some(top) = stack.last_mut() {
        match top.children.next() {
            Some(BoqNode::Section(child)) => {
                let parent = (top.section_id, top.path.clone());
                let frame = open(&mut sections, &mut sort_index, tree.id, child, Some(parent));
                stack.push(frame);
            }
            Some(BoqNode::Position(child)) => {
                positions.push(PositionRecord {
                    id: child.id,
                    boq_id: tree.id,
                    section_id: top.section_id,
                    oz_path: child.oz_path.to_string(),
                    oz: child.label.clone(),
                    short_text: child.short_text.clone(),
                    long_text: child.long_text.clone(),
                    unit: child.unit.symbol().to_string(),
                    qty: child.quantity,
                    unit_price: child.unit_price,
                    total_price_net: child.total_price(),
                });
            }
            None => {
                stack.pop();
            }
        }
    }

    debug!(
        sections = sections.len(),
        positions = positions.len(),
        "flattened tree"
    );
    RecordBatch {
        boq,
        sections,
        positions,
    }
}

/// Flattens, validates, and persists a tree through the given sink.
pub fn export(tree: &BoqTree, sink: &mut dyn BoqSink) -> anyhow::Result<RecordBatch> {
    let batch = flatten(tree);
    batch
        .validate_all()
        .map_err(|e| anyhow::anyhow!("record validation failed: {e}"))?;
    sink.persist(&batch)?;
    info!(
        boq_id = %batch.boq.id,
        sections = batch.sections.len(),
        positions = batch.positions.len(),
        "persisted bill of quantities"
    );
    Ok(batch)
}
