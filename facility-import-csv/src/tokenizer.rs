//! Character-level CSV tokenizer tolerant of the files field staff export.

use std::collections::HashSet;

use facility_import_core::{ParsedTable, RawRow};

const BOM: char = '\u{feff}';

/// Parse raw CSV text into a [`ParsedTable`].
///
/// Never fails: malformed quoting degrades to best-effort field boundaries,
/// blank records are dropped and the first remaining record becomes the
/// header row.
pub fn parse_csv(text: &str) -> ParsedTable {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut records = tokenize(text).into_iter();

    let Some(header_record) = records.next() else {
        return ParsedTable::default();
    };
    let headers = unique_headers(header_record.iter().map(|cell| display_header(cell)));

    let rows = records
        .map(|record| zip_row(&headers, record))
        .collect::<Vec<_>>();

    tracing::debug!(
        columns = headers.len(),
        rows = rows.len(),
        "Tokenized CSV input"
    );

    ParsedTable { headers, rows }
}

/// Collapse whitespace runs (including embedded newlines) and trim.
pub fn display_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into records of fields, dropping records that are entirely blank.
fn tokenize(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            '\r' => {}
            other => field.push(other),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|cell| !cell.trim().is_empty()) {
        records.push(record);
    }
}

/// Rows are keyed by header text, so repeated headers get a ` (n)` suffix.
/// A repeated blank header becomes `(n)`.
fn unique_headers(headers: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .map(|header| {
            if seen.insert(header.clone()) {
                return header;
            }
            let mut n = 2;
            loop {
                let candidate = display_header(&format!("{header} ({n})"));
                if seen.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        })
        .collect()
}

fn zip_row(headers: &[String], record: Vec<String>) -> RawRow {
    let mut cells = record.into_iter();
    headers
        .iter()
        .map(|header| (header.clone(), cells.next().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn quoted_comma_stays_in_field() {
        let table = parse_csv("Name,Code\n\"Acme, Inc\",A1");
        assert_eq!(table.headers, vec!["Name", "Code"]);
        assert_eq!(table.rows, vec![row(&[("Name", "Acme, Inc"), ("Code", "A1")])]);
    }

    #[test]
    fn doubled_quote_is_literal() {
        let table = parse_csv("Name,Note\nKissy,\"the \"\"old\"\" clinic\"\n");
        assert_eq!(table.cell(0, "Note"), "the \"old\" clinic");
    }

    #[test]
    fn newline_inside_quotes_is_content() {
        let table = parse_csv("Name,Address\nLumley,\"12 Main Rd\nFreetown\"\n");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.cell(0, "Address"), "12 Main Rd\nFreetown");
    }

    #[test]
    fn strips_bom_and_carriage_returns() {
        let table = parse_csv("\u{feff}Name,Code\r\nKissy,K1\r\n");
        assert_eq!(table.headers, vec!["Name", "Code"]);
        assert_eq!(table.cell(0, "Code"), "K1");
    }

    #[test]
    fn carriage_return_inside_quotes_is_kept() {
        let table = parse_csv("Name\n\"a\r\nb\"\n");
        assert_eq!(table.cell(0, "Name"), "a\r\nb");
    }

    #[test]
    fn blank_records_are_dropped() {
        let table = parse_csv("\n\nName,Code\n , \nKissy,K1\n\n,,\n");
        assert_eq!(table.headers, vec!["Name", "Code"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_truncated() {
        let table = parse_csv("A,B,C\n1\n1,2,3,4\n");
        assert_eq!(table.rows[0], row(&[("A", "1"), ("B", ""), ("C", "")]));
        assert_eq!(table.rows[1], row(&[("A", "1"), ("B", "2"), ("C", "3")]));
    }

    #[test]
    fn headers_are_display_normalized() {
        let table = parse_csv("\"Facility\nName\",  HF   Code \nx,y\n");
        assert_eq!(table.headers, vec!["Facility Name", "HF Code"]);
        assert_eq!(table.cell(0, "HF Code"), "y");
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let table = parse_csv("Phone,Phone,Phone\n1,2,3\n");
        assert_eq!(table.headers, vec!["Phone", "Phone (2)", "Phone (3)"]);
        assert_eq!(table.cell(0, "Phone (2)"), "2");
    }

    #[test]
    fn repeated_blank_headers_are_trimmed() {
        let table = parse_csv("Name,Code,,\nKissy,K1,x,y\n");
        assert_eq!(table.headers, vec!["Name", "Code", "", "(2)"]);
        assert_eq!(table.cell(0, ""), "x");
        assert_eq!(table.cell(0, "(2)"), "y");
    }

    #[test]
    fn empty_and_whitespace_input_give_empty_table() {
        assert_eq!(parse_csv(""), ParsedTable::default());
        assert_eq!(parse_csv("  \n\t\r\n "), ParsedTable::default());
        assert_eq!(parse_csv("\u{feff}"), ParsedTable::default());
    }

    #[test]
    fn unterminated_quote_swallows_rest_of_input() {
        let table = parse_csv("Name,Code\n\"Kissy,K1\nLumley,L1\n");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.cell(0, "Name"), "Kissy,K1\nLumley,L1\n");
        assert_eq!(table.cell(0, "Code"), "");
    }

    #[test]
    fn quote_mid_field_toggles_quoting() {
        let table = parse_csv("Name,Code\nSt \"Mary, Bo\" Clinic,M1\n");
        assert_eq!(table.cell(0, "Name"), "St Mary, Bo Clinic");
        assert_eq!(table.cell(0, "Code"), "M1");
    }

    #[test]
    fn one_header_row_plus_data_rows_per_non_blank_line() {
        let text = "Name,Code\nA,1\n\nB,2\nC,3";
        let non_blank = text.lines().filter(|l| !l.trim().is_empty()).count();
        let table = parse_csv(text);
        assert_eq!(1 + table.rows.len(), non_blank);
    }
}
