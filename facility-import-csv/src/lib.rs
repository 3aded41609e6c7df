//! CSV to facility batch pipeline: tokenize, auto-map, transform, report.

mod mapping;
mod report;
mod tokenizer;
mod transform;
mod writer;

use facility_import_core::{ColumnMapping, ImportConfig, ParsedTable, PreparedBatch};

pub use mapping::{auto_map, auto_map_with, normalize_header, AliasTable, FIELD_ALIASES};
pub use report::{build_report, format_row_error, merge_rejections, remap_rows};
pub use tokenizer::{display_header, parse_csv};
pub use transform::{map_facility_type, prepare_batch, transform_row};
pub use writer::{template_csv, write_csv};

/// Tokenized file plus the mapping proposed for it, before user review.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPreview {
    pub table: ParsedTable,
    pub mapping: ColumnMapping,
}

impl ImportPreview {
    /// Tokenize `text` and seed a mapping from its headers.
    pub fn from_csv_str(text: &str) -> Self {
        let table = parse_csv(text);
        let mapping = auto_map(&table.headers);
        Self { table, mapping }
    }

    pub fn prepare(&self, config: &ImportConfig) -> PreparedBatch {
        prepare_batch(&self.table, &self.mapping, config)
    }
}

/// Run the whole pipeline with the auto-detected mapping.
pub fn prepare_csv_str(text: &str, config: &ImportConfig) -> PreparedBatch {
    ImportPreview::from_csv_str(text).prepare(config)
}
