//! Packing composite records into the flat scalar metadata the index
//! accepts, and the sanitization rules applied on the way in.

use paper_model::{PaperChunk, Section};
use serde_json::{json, Map, Value};

/// Converts a value to an index-compatible primitive: nulls become
/// empty strings, scalars pass through, arrays and objects are carried
/// as JSON strings.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => value,
        Value::Array(_) | Value::Object(_) => {
            Value::String(serde_json::to_string(&value).unwrap_or_default())
        }
    }
}

/// Sanitizes every value of a metadata map.
pub fn prepare_metadata(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter().map(|(k, v)| (k, sanitize_value(v))).collect()
}

/// Serializable view of a section as stored alongside a chunk.
pub fn section_data_value(section: &Section) -> Value {
    json!({
        "id": section.section_id(),
        "start_page": section.start_page,
        "name": section.name,
        "title": section.title,
        "is_subsection": section.is_subsection,
        "parent_name": section.parent_name,
    })
}

/// Builds the flat metadata map stored with one chunk. Composite
/// fields (`chunk_metadata`, `paper_metadata`, `section_data`) end up
/// as JSON-string scalars; [`crate::retrieval`] decodes them again.
pub fn pack_chunk_metadata(
    chunk: &PaperChunk,
    paper_metadata: &Map<String, Value>,
    section: Option<&Section>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(
        "paper_id".into(),
        Value::String(chunk.metadata.paper_id.clone()),
    );
    data.insert(
        "paper_url".into(),
        paper_metadata
            .get("paper_url")
            .cloned()
            .unwrap_or(Value::Null),
    );
    data.insert(
        "chunk_metadata".into(),
        serde_json::to_value(&chunk.metadata).unwrap_or(Value::Null),
    );
    data.insert(
        "paper_metadata".into(),
        Value::Object(paper_metadata.clone()),
    );
    data.insert(
        "section_data".into(),
        section.map(section_data_value).unwrap_or(Value::Null),
    );
    prepare_metadata(data)
}
