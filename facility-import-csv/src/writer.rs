//! CSV output: table serialization and the starter template.

use csv::{Terminator, WriterBuilder};
use facility_import_core::{ImportError, ParsedTable, TargetField};

/// Example values for the template, in `TargetField::ALL` order.
const TEMPLATE_EXAMPLE: [&str; 16] = [
    "Kissy MCHP",
    "WU-0101",
    "MCHP",
    "1",
    "Western Area Urban",
    "WU",
    "12 Kissy Road, Freetown",
    "8.4781",
    "-13.2089",
    "+232 76 000000",
    "kissy.mchp@example.org",
    "Government",
    "Open",
    "Functional",
    "Aminata Kamara",
    "Western",
];

/// Serialize a table back to CSV. Fields holding commas, quotes or line
/// breaks are quoted, so [`crate::parse_csv`] reads the output back unchanged.
pub fn write_csv(table: &ParsedTable) -> Result<String, ImportError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&table.headers).map_err(csv_error)?;
    for row in &table.rows {
        let cells = table
            .headers
            .iter()
            .map(|header| row.get(header).map(String::as_str).unwrap_or_default());
        writer.write_record(cells).map_err(csv_error)?;
    }

    finish(writer)
}

/// Header row of every target field plus one example facility.
pub fn template_csv() -> Result<String, ImportError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(TargetField::ALL.iter().map(|field| field.label()))
        .map_err(csv_error)?;
    writer.write_record(TEMPLATE_EXAMPLE).map_err(csv_error)?;

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ImportError> {
    let bytes = writer
        .into_inner()
        .map_err(|err| ImportError::Csv(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ImportError::Csv(err.to_string()))
}

fn csv_error(err: csv::Error) -> ImportError {
    ImportError::Csv(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auto_map, parse_csv};

    #[test]
    fn quotes_only_where_needed() {
        let table = parse_csv("Name,Note\nKissy,\"a, b\"\nBo,\"say \"\"hi\"\"\"\n");
        let written = write_csv(&table).unwrap();
        assert_eq!(
            written,
            "Name,Note\nKissy,\"a, b\"\nBo,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn template_headers_auto_map_onto_their_own_fields() {
        let template = parse_csv(&template_csv().unwrap());
        let mapping = auto_map(&template.headers);

        for field in TargetField::ALL {
            assert_eq!(mapping.get(field), Some(field.label()), "{field}");
        }
        assert_eq!(template.rows.len(), 1);
        assert_eq!(template.cell(0, "Address"), "12 Kissy Road, Freetown");
    }
}
