//! Baseline index mapping.
//!
//! The baseline covers the system fields every object document carries.
//! User metadata fields are left to dynamic mapping and are never managed
//! here.

use serde_json::{json, Value};

use crate::types::{EngineVersion, FieldMapping};
use metadata_sync_shared::fields;

/// Type declaration of a baseline field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Long,
    Date,
    Boolean,
    /// Textual field. `analyzed: false` marks identifiers that must only be
    /// matched exactly.
    String { analyzed: bool },
}

/// One field of the baseline mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl MappingEntry {
    const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }

    /// Declaration in the legacy format, with the generic `string` type.
    pub fn legacy_declaration(&self) -> Value {
        match self.field_type {
            FieldType::Long => json!({ "type": "long" }),
            FieldType::Date => json!({ "type": "date" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::String { analyzed: true } => json!({ "type": "string" }),
            FieldType::String { analyzed: false } => {
                json!({ "type": "string", "index": "not_analyzed" })
            }
        }
    }

    /// Declaration suitable for the given engine.
    ///
    /// Engines without the `string` type get `keyword` for non-analyzed
    /// fields and analyzed `text` with a `keyword` sub-field otherwise.
    pub fn declaration(&self, version: &EngineVersion) -> Value {
        if version.supports_string_type() {
            return self.legacy_declaration();
        }
        match self.field_type {
            FieldType::String { analyzed: false } => json!({ "type": "keyword" }),
            FieldType::String { analyzed: true } => json!({
                "type": "text",
                "fields": {
                    "keyword": { "type": "keyword" }
                }
            }),
            _ => self.legacy_declaration(),
        }
    }
}

const BASELINE: &[MappingEntry] = &[
    MappingEntry::new(fields::CONTENT_LENGTH, FieldType::Long),
    MappingEntry::new(fields::CONTENT_TYPE, FieldType::String { analyzed: true }),
    MappingEntry::new(fields::ETAG, FieldType::String { analyzed: false }),
    MappingEntry::new(fields::LAST_MODIFIED, FieldType::Date),
    MappingEntry::new(fields::MANIFEST, FieldType::String { analyzed: true }),
    MappingEntry::new(fields::STATIC_LARGE_OBJECT, FieldType::Boolean),
    MappingEntry::new(fields::CONTAINER, FieldType::String { analyzed: true }),
    MappingEntry::new(fields::ACCOUNT, FieldType::String { analyzed: true }),
    MappingEntry::new(fields::OBJECT, FieldType::String { analyzed: true }),
    MappingEntry::new(fields::TIMESTAMP, FieldType::Date),
    MappingEntry::new(fields::TRANS_ID, FieldType::String { analyzed: false }),
];

/// The fixed set of fields the sync requires in the index mapping.
pub fn baseline_mapping() -> &'static [MappingEntry] {
    BASELINE
}

/// Render a set of entries as a mapping for the given engine.
pub fn render_mapping<'a>(
    entries: impl IntoIterator<Item = &'a MappingEntry>,
    version: &EngineVersion,
) -> FieldMapping {
    entries
        .into_iter()
        .map(|entry| (entry.name.to_string(), entry.declaration(version)))
        .collect()
}
