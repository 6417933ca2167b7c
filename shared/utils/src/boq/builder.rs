//! Assembles the structural event stream into a draft BoQ tree.
//!
//! The builder keeps an explicit stack of open sections instead of recursing,
//! so nesting depth is bounded by memory, not by the execution stack. The
//! result is a *draft* tree whose numeric fields are still raw strings; the
//! phase validator turns it into a typed, immutable `BoqTree`.

use std::collections::HashSet;

use gaeb_models::{OzPath, Phase};

use crate::boq::reader::{PositionEvent, StructuralEvent};
use crate::error::{GaebError, GaebResult};

/// A position before validation: located, but fields still unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftPosition {
    pub oz_path: OzPath,
    pub fields: PositionEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftSection {
    pub label: String,
    pub title: String,
    pub children: Vec<DraftNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftNode {
    Section(DraftSection),
    Position(DraftPosition),
}

/// An assembled but not yet validated document.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftTree {
    pub phase: Phase,
    pub project: Option<String>,
    pub version: Option<String>,
    pub root: DraftSection,
}

/// Consumes a structural event stream and produces a [`DraftTree`].
pub fn build<I>(events: I, phase: Phase) -> GaebResult<DraftTree>
where
    I: IntoIterator<Item = GaebResult<StructuralEvent>>,
{
    let mut builder = TreeBuilder::new(phase);
    for event in events {
        builder.push(event?)?;
    }
    builder.finish()
}

struct TreeBuilder {
    phase: Phase,
    project: Option<String>,
    version: Option<String>,
    /// Open sections, innermost last. Index 0 is the synthetic document
    /// root, which no event ever opens or closes.
    stack: Vec<DraftSection>,
    seen_paths: HashSet<String>,
}

impl TreeBuilder {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            project: None,
            version: None,
            stack: vec![DraftSection {
                label: String::new(),
                title: String::new(),
                children: Vec::new(),
            }],
            seen_paths: HashSet::new(),
        }
    }

    /// Ordinal path of the innermost open section.
    fn current_path(&self) -> OzPath {
        OzPath::from_labels(self.stack.iter().map(|s| s.label.as_str()))
    }

    fn push(&mut self, event: StructuralEvent) -> GaebResult<()> {
        match event {
            StructuralEvent::Attribute { name, value } => {
                match name.as_str() {
                    "project" => self.project = Some(value),
                    "version" => self.version = Some(value),
                    _ => {}
                }
                Ok(())
            }
            StructuralEvent::SectionOpen { label, title } => {
                self.stack.push(DraftSection {
                    label,
                    title,
                    children: Vec::new(),
                });
                Ok(())
            }
            StructuralEvent::SectionClose => {
                if self.stack.len() == 1 {
                    return Err(GaebError::structural(
                        "section close without matching open",
                        None,
                    ));
                }
                let closed = self.stack.pop().expect("stack is never empty");
                self.stack
                    .last_mut()
                    .expect("root remains after pop")
                    .children
                    .push(DraftNode::Section(closed));
                Ok(())
            }
            StructuralEvent::Position(fields) => {
                let oz_path = self.current_path().child(&fields.label);
                if !self.seen_paths.insert(oz_path.to_string()) {
                    return Err(GaebError::duplicate_path(oz_path.to_string()));
                }
                self.stack
                    .last_mut()
                    .expect("stack is never empty")
                    .children
                    .push(DraftNode::Position(DraftPosition { oz_path, fields }));
                Ok(())
            }
        }
    }

    fn finish(mut self) -> GaebResult<DraftTree> {
        if self.stack.len() > 1 {
            let open = self.current_path().to_string();
            return Err(GaebError::structural(
                format!(
                    "document ended with {} unclosed section(s)",
                    self.stack.len() - 1
                ),
                Some(open),
            ));
        }
        let root = self.stack.pop().expect("root section");
        Ok(DraftTree {
            phase: self.phase,
            project: self.project,
            version: self.version,
            root,
        })
    }
}
