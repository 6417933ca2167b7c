//! Structural reader for GAEB exchange documents.
//!
//! Streams the raw XML and yields typed structural events in document order,
//! independent of phase. The reader is lazy and non-restartable: it consumes
//! its input once and stops at the first fatal error. Numeric fields are kept
//! as raw strings here; decimal parsing is the validator's job so that format
//! errors can be aggregated per path instead of aborting the parse.
//!
//! Wire mapping (GAEB DA XML): `BoQCtgy`/`RNoPart` opens a section and its
//! `LblTx` child carries the title; `Item` elements carry positions with
//! `Qty`, `QU`, `ShortText`, `LongText` and, in priced documents, `UP` and
//! `IT`. The `GAEBInfo/DP` marker names the data phase and must agree with
//! the declared one.

use std::collections::VecDeque;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use gaeb_models::Phase;

use crate::error::{GaebError, GaebResult};

/// Raw field set of one `Item` element. All values verbatim from the wire
/// (decimal commas included); `None` means the element was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionEvent {
    pub label: String,
    pub item_id: Option<String>,
    pub short_text: String,
    pub long_text: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub total_price: Option<String>,
}

/// One structural event of the document stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralEvent {
    SectionOpen { label: String, title: String },
    SectionClose,
    Position(PositionEvent),
    /// Document-level metadata such as the project name or format version.
    Attribute { name: String, value: String },
}

/// Normalizes whitespace: NBSP variants become spaces, runs collapse to one.
pub(crate) fn clean_text(raw: &str) -> String {
    raw.replace(['\u{00a0}', '\u{202f}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which element's text content we are currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    DataPhase,
    Version,
    ProjectName,
    SectionTitle,
    ItemField(ItemField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Quantity,
    Unit,
    ShortText,
    LongText,
    UnitPrice,
    TotalPrice,
}

/// A section whose open tag was seen but whose title may still follow.
#[derive(Debug, Default)]
struct PendingSection {
    label: String,
    title: String,
}

/// Owned snapshot of one XML event, so the scratch buffer can be reused.
enum RawEvent {
    Start {
        name: Vec<u8>,
        rno_part: Option<String>,
        item_id: Option<String>,
        self_closing: bool,
    },
    Text(String),
    End { name: Vec<u8> },
    Eof,
    Skip,
}

/// Lazy iterator over the structural events of one GAEB document.
pub struct DocumentReader<'a> {
    reader: Reader<&'a [u8]>,
    declared_phase: Phase,
    buf: Vec<u8>,
    queue: VecDeque<StructuralEvent>,
    pending_section: Option<PendingSection>,
    current_item: Option<PositionEvent>,
    text_target: TextTarget,
    in_boq_info: bool,
    phase_checked: bool,
    finished: bool,
}

impl<'a> DocumentReader<'a> {
    pub fn new(content: &'a [u8], declared_phase: Phase) -> Self {
        let mut reader = Reader::from_reader(content);
        reader.trim_text(true);
        Self {
            reader,
            declared_phase,
            buf: Vec::new(),
            queue: VecDeque::new(),
            pending_section: None,
            current_item: None,
            text_target: TextTarget::None,
            in_boq_info: false,
            phase_checked: false,
            finished: false,
        }
    }

    /// A `SectionOpen` is held back until its title (`LblTx`) is known; any
    /// structural child forces it out first so document order is preserved.
    fn flush_pending_section(&mut self) {
        if let Some(pending) = self.pending_section.take() {
            self.queue.push_back(StructuralEvent::SectionOpen {
                label: pending.label,
                title: clean_text(&pending.title),
            });
        }
    }

    /// Associated function on purpose: start events borrow the scratch
    /// buffer, which `read_raw` holds mutably through `self`.
    fn snapshot_start(e: &BytesStart<'_>, self_closing: bool) -> GaebResult<RawEvent> {
        let name = e.local_name().as_ref().to_vec();
        let mut rno_part = None;
        let mut item_id = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|err| GaebError::malformed(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| GaebError::malformed(err.to_string()))?
                .into_owned();
            match attr.key.local_name().as_ref() {
                b"RNoPart" | b"RNo" => rno_part = Some(value),
                b"ID" => item_id = Some(value),
                _ => {}
            }
        }
        Ok(RawEvent::Start {
            name,
            rno_part,
            item_id,
            self_closing,
        })
    }

    fn handle_start(
        &mut self,
        name: &[u8],
        rno_part: Option<String>,
        item_id: Option<String>,
    ) -> GaebResult<()> {
        match name {
            b"DP" => self.text_target = TextTarget::DataPhase,
            b"Version" => self.text_target = TextTarget::Version,
            b"BoQInfo" => self.in_boq_info = true,
            b"Name" if self.in_boq_info => self.text_target = TextTarget::ProjectName,
            b"BoQCtgy" => {
                self.flush_pending_section();
                let label = rno_part.ok_or_else(|| {
                    GaebError::malformed("BoQCtgy element without RNoPart attribute")
                })?;
                self.pending_section = Some(PendingSection {
                    label,
                    title: String::new(),
                });
            }
            b"LblTx" if self.pending_section.is_some() => {
                self.text_target = TextTarget::SectionTitle;
            }
            b"Item" => {
                self.flush_pending_section();
                let label = rno_part.ok_or_else(|| {
                    GaebError::malformed("Item element without RNoPart attribute")
                })?;
                self.current_item = Some(PositionEvent {
                    label,
                    item_id,
                    ..PositionEvent::default()
                });
            }
            b"Qty" | b"QU" | b"ShortText" | b"LongText" | b"UP" | b"IT"
                if self.current_item.is_some() =>
            {
                let field = match name {
                    b"Qty" => ItemField::Quantity,
                    b"QU" => ItemField::Unit,
                    b"ShortText" => ItemField::ShortText,
                    b"LongText" => ItemField::LongText,
                    b"UP" => ItemField::UnitPrice,
                    _ => ItemField::TotalPrice,
                };
                self.text_target = TextTarget::ItemField(field);
                // record presence even if the element carries no text
                if let Some(item) = self.current_item.as_mut() {
                    match field {
                        ItemField::Quantity => item.quantity.get_or_insert_with(String::new),
                        ItemField::Unit => item.unit.get_or_insert_with(String::new),
                        ItemField::LongText => item.long_text.get_or_insert_with(String::new),
                        ItemField::UnitPrice => item.unit_price.get_or_insert_with(String::new),
                        ItemField::TotalPrice => item.total_price.get_or_insert_with(String::new),
                        ItemField::ShortText => &mut item.short_text,
                    };
                }
            }
            // wrappers (Award, BoQ, BoQBody, Itemlist, Description, ...) and
            // unknown elements are structural noise here
            _ => {}
        }
        Ok(())
    }

    fn handle_text(&mut self, text: &str) -> GaebResult<()> {
        match self.text_target {
            TextTarget::None => {}
            TextTarget::DataPhase => {
                self.phase_checked = true;
                let found = text.trim();
                if found != self.declared_phase.data_phase() {
                    return Err(GaebError::UnsupportedPhase {
                        expected: self.declared_phase.data_phase().to_string(),
                        found: found.to_string(),
                    });
                }
                self.queue.push_back(StructuralEvent::Attribute {
                    name: "data_phase".to_string(),
                    value: found.to_string(),
                });
            }
            TextTarget::Version => {
                self.queue.push_back(StructuralEvent::Attribute {
                    name: "version".to_string(),
                    value: text.trim().to_string(),
                });
            }
            TextTarget::ProjectName => {
                self.queue.push_back(StructuralEvent::Attribute {
                    name: "project".to_string(),
                    value: clean_text(text),
                });
            }
            TextTarget::SectionTitle => {
                if let Some(pending) = self.pending_section.as_mut() {
                    if !pending.title.is_empty() {
                        pending.title.push(' ');
                    }
                    pending.title.push_str(text);
                }
            }
            TextTarget::ItemField(field) => {
                if let Some(item) = self.current_item.as_mut() {
                    let slot = match field {
                        ItemField::Quantity => item.quantity.get_or_insert_with(String::new),
                        ItemField::Unit => item.unit.get_or_insert_with(String::new),
                        ItemField::LongText => item.long_text.get_or_insert_with(String::new),
                        ItemField::UnitPrice => item.unit_price.get_or_insert_with(String::new),
                        ItemField::TotalPrice => item.total_price.get_or_insert_with(String::new),
                        ItemField::ShortText => &mut item.short_text,
                    };
                    if !slot.is_empty() {
                        slot.push(' ');
                    }
                    slot.push_str(text);
                }
            }
        }
        Ok(())
    }

    /// Whether this end tag closes the element whose text is being
    /// collected. Inline markup (`<p>`, `<span>`, style runs) nested inside
    /// a text field must not stop collection early.
    fn closes_text_target(&self, name: &[u8]) -> bool {
        match self.text_target {
            TextTarget::None => false,
            TextTarget::DataPhase => name == b"DP",
            TextTarget::Version => name == b"Version",
            TextTarget::ProjectName => name == b"Name",
            TextTarget::SectionTitle => name == b"LblTx",
            TextTarget::ItemField(field) => match field {
                ItemField::Quantity => name == b"Qty",
                ItemField::Unit => name == b"QU",
                ItemField::ShortText => name == b"ShortText",
                ItemField::LongText => name == b"LongText",
                ItemField::UnitPrice => name == b"UP",
                ItemField::TotalPrice => name == b"IT",
            },
        }
    }

    fn handle_end(&mut self, name: &[u8]) {
        if self.closes_text_target(name) {
            self.text_target = TextTarget::None;
        }
        match name {
            b"BoQCtgy" => {
                self.flush_pending_section();
                self.queue.push_back(StructuralEvent::SectionClose);
            }
            b"Item" => {
                if let Some(mut item) = self.current_item.take() {
                    item.short_text = clean_text(&item.short_text);
                    item.long_text = item.long_text.map(|t| clean_text(&t));
                    self.queue.push_back(StructuralEvent::Position(item));
                }
                self.text_target = TextTarget::None;
            }
            b"BoQInfo" => self.in_boq_info = false,
            _ => {}
        }
    }

    fn read_raw(&mut self) -> GaebResult<RawEvent> {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(ref e)) => Self::snapshot_start(e, false),
            Ok(Event::Empty(ref e)) => Self::snapshot_start(e, true),
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| GaebError::malformed(err.to_string()))?;
                Ok(RawEvent::Text(text.into_owned()))
            }
            Ok(Event::CData(ref c)) => {
                Ok(RawEvent::Text(String::from_utf8_lossy(c).into_owned()))
            }
            Ok(Event::End(ref e)) => Ok(RawEvent::End {
                name: e.local_name().as_ref().to_vec(),
            }),
            Ok(Event::Eof) => Ok(RawEvent::Eof),
            Ok(_) => Ok(RawEvent::Skip),
            Err(err) => Err(GaebError::malformed(err.to_string())),
        }
    }

    fn advance(&mut self) -> GaebResult<()> {
        match self.read_raw()? {
            RawEvent::Start {
                name,
                rno_part,
                item_id,
                self_closing,
            } => {
                self.handle_start(&name, rno_part, item_id)?;
                if self_closing {
                    self.handle_end(&name);
                }
            }
            RawEvent::Text(text) => self.handle_text(&text)?,
            RawEvent::End { name } => self.handle_end(&name),
            RawEvent::Eof => {
                self.finished = true;
                if !self.phase_checked {
                    return Err(GaebError::malformed(
                        "document carries no data phase marker (GAEBInfo/DP)",
                    ));
                }
                self.flush_pending_section();
            }
            RawEvent::Skip => {}
        }
        Ok(())
    }
}

impl Iterator for DocumentReader<'_> {
    type Item = GaebResult<StructuralEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.advance() {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_X83: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GAEB xmlns="http://www.gaeb.de/GAEB_DA_XML/DA83/3.2">
  <GAEBInfo><Version>3.2</Version><DP>83</DP></GAEBInfo>
  <Award>
    <BoQ>
      <BoQInfo><Name>Neubau Halle 3</Name></BoQInfo>
      <BoQBody>
        <BoQCtgy RNoPart="01">
          <LblTx>Erdarbeiten</LblTx>
          <BoQBody>
            <Itemlist>
              <Item RNoPart="001" ID="A1">
                <Qty>10,000</Qty>
                <QU>m</QU>
                <Description>
                  <ShortText>Aushub Graben</ShortText>
                  <LongText>Graben ausheben und verfuellen</LongText>
                </Description>
              </Item>
            </Itemlist>
          </BoQBody>
        </BoQCtgy>
      </BoQBody>
    </BoQ>
  </Award>
</GAEB>"#;

    fn collect(content: &str, phase: Phase) -> GaebResult<Vec<StructuralEvent>> {
        DocumentReader::new(content.as_bytes(), phase).collect()
    }

    #[test]
    fn test_events_in_document_order() {
        let events = collect(SAMPLE_X83, Phase::A).unwrap();
        assert_eq!(
            events[0],
            StructuralEvent::Attribute {
                name: "version".to_string(),
                value: "3.2".to_string()
            }
        );
        assert_eq!(
            events[1],
            StructuralEvent::Attribute {
                name: "data_phase".to_string(),
                value: "83".to_string()
            }
        );
        assert_eq!(
            events[2],
            StructuralEvent::Attribute {
                name: "project".to_string(),
                value: "Neubau Halle 3".to_string()
            }
        );
        assert_eq!(
            events[3],
            StructuralEvent::SectionOpen {
                label: "01".to_string(),
                title: "Erdarbeiten".to_string()
            }
        );
        match &events[4] {
            StructuralEvent::Position(item) => {
                assert_eq!(item.label, "001");
                assert_eq!(item.item_id.as_deref(), Some("A1"));
                assert_eq!(item.short_text, "Aushub Graben");
                assert_eq!(item.long_text.as_deref(), Some("Graben ausheben und verfuellen"));
                // raw wire value, decimal comma untouched
                assert_eq!(item.quantity.as_deref(), Some("10,000"));
                assert_eq!(item.unit.as_deref(), Some("m"));
                assert_eq!(item.unit_price, None);
            }
            other => panic!("expected position event, got {other:?}"),
        }
        assert_eq!(events[5], StructuralEvent::SectionClose);
        assert_eq!(events.len(), 6);
    }

    #[test]
    fn test_phase_marker_mismatch() {
        let err = collect(SAMPLE_X83, Phase::B).unwrap_err();
        match err {
            GaebError::UnsupportedPhase { expected, found } => {
                assert_eq!(expected, "84");
                assert_eq!(found, "83");
            }
            other => panic!("expected UnsupportedPhase, got {other:?}"),
        }
    }

    #[test]
    fn test_priced_fields_are_read() {
        let doc = r#"<GAEB><GAEBInfo><DP>84</DP></GAEBInfo><Award><BoQ><BoQBody>
            <BoQCtgy RNoPart="01"><LblTx>Rohbau</LblTx><BoQBody><Itemlist>
              <Item RNoPart="001"><Qty>2</Qty><QU>h</QU><UP>2,50</UP><IT>5,00</IT></Item>
            </Itemlist></BoQBody></BoQCtgy>
        </BoQBody></BoQ></Award></GAEB>"#;
        let events = collect(doc, Phase::B).unwrap();
        let item = events
            .iter()
            .find_map(|e| match e {
                StructuralEvent::Position(item) => Some(item.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(item.unit_price.as_deref(), Some("2,50"));
        assert_eq!(item.total_price.as_deref(), Some("5,00"));
    }

    #[test]
    fn test_empty_section_opens_and_closes() {
        let doc = r#"<GAEB><GAEBInfo><DP>83</DP></GAEBInfo><Award><BoQ><BoQBody>
            <BoQCtgy RNoPart="02"/>
        </BoQBody></BoQ></Award></GAEB>"#;
        let events = collect(doc, Phase::A).unwrap();
        assert_eq!(
            events,
            vec![
                StructuralEvent::Attribute {
                    name: "data_phase".to_string(),
                    value: "83".to_string()
                },
                StructuralEvent::SectionOpen {
                    label: "02".to_string(),
                    title: String::new()
                },
                StructuralEvent::SectionClose,
            ]
        );
    }

    #[test]
    fn test_inline_markup_inside_text_fields() {
        let doc = r#"<GAEB><GAEBInfo><DP>83</DP></GAEBInfo><Award><BoQ><BoQBody>
            <BoQCtgy RNoPart="01"><LblTx><p><span>Erd</span><span>arbeiten</span></p></LblTx>
              <BoQBody><Itemlist>
                <Item RNoPart="001"><Qty>1</Qty><QU>m</QU>
                  <Description>
                    <ShortText><p><span>Aushub</span><span> Graben</span></p></ShortText>
                    <LongText><p>Graben ausheben</p><p>und verfuellen</p></LongText>
                  </Description>
                </Item>
              </Itemlist></BoQBody>
            </BoQCtgy>
        </BoQBody></BoQ></Award></GAEB>"#;
        let events = collect(doc, Phase::A).unwrap();
        match &events[1] {
            StructuralEvent::SectionOpen { title, .. } => assert_eq!(title, "Erd arbeiten"),
            other => panic!("expected section open, got {other:?}"),
        }
        match &events[2] {
            StructuralEvent::Position(item) => {
                assert_eq!(item.short_text, "Aushub Graben");
                assert_eq!(
                    item.long_text.as_deref(),
                    Some("Graben ausheben und verfuellen")
                );
            }
            other => panic!("expected position event, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_phase_marker_is_malformed() {
        let doc = r#"<GAEB><Award><BoQ><BoQBody>
            <BoQCtgy RNoPart="01"><LblTx>Erdarbeiten</LblTx></BoQCtgy>
        </BoQBody></BoQ></Award></GAEB>"#;
        let err = collect(doc, Phase::A).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
        assert!(err.to_string().contains("data phase marker"));
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let doc = "<GAEB><Award><BoQ></Award></GAEB>";
        let err = collect(doc, Phase::A).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_section_without_label_is_malformed() {
        let doc = r#"<GAEB><BoQBody><BoQCtgy><LblTx>x</LblTx></BoQCtgy></BoQBody></GAEB>"#;
        let err = collect(doc, Phase::A).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_clean_text_normalizes_whitespace() {
        assert_eq!(clean_text("  Aushub\u{00a0} Graben \n"), "Aushub Graben");
    }

    proptest::proptest! {
        #[test]
        fn property_clean_text_is_idempotent(s in "\\PC{0,80}") {
            let once = clean_text(&s);
            proptest::prop_assert_eq!(clean_text(&once), once.clone());
        }
    }
}
