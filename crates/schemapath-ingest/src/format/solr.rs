//! Solr `schema.xml` adapter: the `/schema/fields/field` declarations.

use crate::error::{IngestError, IngestResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolrField {
    pub name: String,
    /// `multiValued` attribute; absent → unset.
    pub multi_valued: Option<bool>,
}

pub fn parse_fields(contents: &str, label: &str) -> IngestResult<Vec<SolrField>> {
    let mut reader = Reader::from_str(contents);
    reader.trim_text(true);

    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut fields = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                if is_field_declaration(&open, &element) {
                    fields.extend(field_from(&element, label)?);
                }
                open.push(element.local_name().as_ref().to_vec());
            }
            Ok(Event::Empty(element)) => {
                if is_field_declaration(&open, &element) {
                    fields.extend(field_from(&element, label)?);
                }
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(IngestError::unreadable(
                    label,
                    format!("XML error at byte {}: {err}", reader.buffer_position()),
                ));
            }
        }
    }

    tracing::debug!(location = %label, fields = fields.len(), "read Solr field declarations");
    Ok(fields)
}

fn is_field_declaration(open: &[Vec<u8>], element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref() == b"field"
        && open.len() == 2
        && open[0] == b"schema"
        && open[1] == b"fields"
}

fn field_from(element: &BytesStart<'_>, label: &str) -> IngestResult<Option<SolrField>> {
    let mut name = None;
    let mut multi_valued = None;

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|err| IngestError::unreadable(label, err))?;
        let value = attribute
            .unescape_value()
            .map_err(|err| IngestError::unreadable(label, err))?;
        match attribute.key.local_name().as_ref() {
            b"name" => name = Some(value.trim().to_string()),
            b"multiValued" => multi_valued = Some(value.trim().eq_ignore_ascii_case("true")),
            _ => {}
        }
    }

    match name {
        Some(name) if !name.is_empty() => Ok(Some(SolrField { name, multi_valued })),
        _ => {
            tracing::warn!(location = %label, "skipping Solr field without a name");
            Ok(None)
        }
    }
}
