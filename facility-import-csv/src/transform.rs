//! Row to [`BulkUploadItem`] conversion and pre-submission validation.

use facility_import_core::{
    BulkUploadItem, ColumnMapping, FacilityType, ImportConfig, MissingFunctionalPolicy,
    ParsedTable, PreparedBatch, RawRow, RowError, TargetField,
};

use crate::mapping::normalize_header;

/// Source vocabulary for peripheral health units, normalized.
const PHU_SYNONYMS: [&str; 10] = [
    "mchp",
    "chp",
    "chc",
    "phu",
    "clinic",
    "healthpost",
    "healthcentre",
    "healthcenter",
    "maternalclinic",
    "peripheralhealthunit",
];

const HOSPITAL_SYNONYMS: [&str; 9] = [
    "hospital",
    "governmenthospital",
    "privatehospital",
    "missionhospital",
    "districthospital",
    "regionalhospital",
    "referralhospital",
    "teachinghospital",
    "specialisthospital",
];

/// Convert one raw row into a facility record. Pure and infallible.
///
/// Required fields are not checked here; see [`prepare_batch`].
pub fn transform_row(row: &RawRow, mapping: &ColumnMapping, config: &ImportConfig) -> BulkUploadItem {
    let get = |field: TargetField| cell(row, mapping, field);
    let text = |field: TargetField| -> Option<String> { non_empty(get(field)) };

    let ownership = get(TargetField::Ownership);

    BulkUploadItem {
        name: get(TargetField::Name).to_string(),
        facility_code: get(TargetField::FacilityCode).to_string(),
        facility_type: map_facility_type(get(TargetField::FacilityType)),
        level: parse_leading_int(get(TargetField::Level)),
        district_name: text(TargetField::DistrictName),
        district_code: text(TargetField::DistrictCode),
        address: text(TargetField::Address),
        latitude: parse_leading_float(get(TargetField::Latitude)),
        longitude: parse_leading_float(get(TargetField::Longitude)),
        phone: text(TargetField::Phone),
        email: text(TargetField::Email),
        manager_name: text(TargetField::ManagerName),
        region: text(TargetField::Region),
        is_active: derive_is_active(
            get(TargetField::Status),
            get(TargetField::Functional),
            config.missing_functional,
        ),
        services: if ownership.is_empty() {
            Vec::new()
        } else {
            vec![ownership.to_string()]
        },
    }
}

/// Transform every row and split off rows lacking a name or facility code.
pub fn prepare_batch(
    table: &ParsedTable,
    mapping: &ColumnMapping,
    config: &ImportConfig,
) -> PreparedBatch {
    let mut batch = PreparedBatch::default();

    for (index, row) in table.rows.iter().enumerate() {
        let row_number = index + 1;
        let item = transform_row(row, mapping, config);

        match missing_required_message(&item) {
            Some(message) => batch.rejected.push(RowError {
                row: row_number,
                name: non_empty(&item.name),
                code: non_empty(&item.facility_code),
                message,
            }),
            None => {
                batch.items.push(item);
                batch.source_rows.push(row_number);
            }
        }
    }

    tracing::debug!(
        accepted = batch.items.len(),
        rejected = batch.rejected.len(),
        "Prepared facility batch"
    );

    batch
}

/// Translate a source-vocabulary facility type. Unknown or blank → PHU.
pub fn map_facility_type(raw: &str) -> FacilityType {
    let key = normalize_header(raw);
    if HOSPITAL_SYNONYMS.contains(&key.as_str()) {
        FacilityType::Hospital
    } else if PHU_SYNONYMS.contains(&key.as_str()) {
        FacilityType::PrimaryHealthUnit
    } else {
        FacilityType::default()
    }
}

fn cell<'a>(row: &'a RawRow, mapping: &ColumnMapping, field: TargetField) -> &'a str {
    mapping
        .get(field)
        .and_then(|header| row.get(header))
        .map(|value| value.trim())
        .unwrap_or_default()
}

fn derive_is_active(status: &str, functional: &str, policy: MissingFunctionalPolicy) -> bool {
    if status.eq_ignore_ascii_case("closed") {
        return false;
    }
    if functional.is_empty() {
        return policy == MissingFunctionalPolicy::Active;
    }
    functional.eq_ignore_ascii_case("functional")
}

fn missing_required_message(item: &BulkUploadItem) -> Option<String> {
    match (item.name.is_empty(), item.facility_code.is_empty()) {
        (false, false) => None,
        (true, true) => Some("Missing facility name and facility code".to_string()),
        (true, false) => Some("Missing facility name".to_string()),
        (false, true) => Some("Missing facility code".to_string()),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_leading_int(value: &str) -> Option<i32> {
    let mut end = 0;
    for (index, c) in value.char_indices() {
        let sign = index == 0 && (c == '-' || c == '+');
        if !(sign || c.is_ascii_digit()) {
            break;
        }
        end = index + c.len_utf8();
    }
    value[..end].parse::<i32>().ok()
}

/// Longest prefix of the form `[+-]digits[.digits][(e|E)[+-]digits]`.
fn parse_leading_float(value: &str) -> Option<f64> {
    let bytes = value.as_bytes();
    let skip_digits = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    end = skip_digits(end);
    if bytes.get(end) == Some(&b'.') {
        end = skip_digits(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_end = skip_digits(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }

    value[..end].parse::<f64>().ok().filter(|v| v.is_finite())
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

    fn mapping(pairs: &[(TargetField, &str)]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        for (field, header) in pairs {
            mapping.set(*field, *header);
        }
        mapping
    }

    #[test]
    fn mchp_translates_to_primary_care() {
        let item = transform_row(
            &row(&[("type", "MCHP")]),
            &mapping(&[(TargetField::FacilityType, "type")]),
            &ImportConfig::default(),
        );
        assert_eq!(item.facility_type, FacilityType::PrimaryHealthUnit);
    }

    #[test]
    fn facility_type_synonyms() {
        assert_eq!(map_facility_type("Mission Hospital"), FacilityType::Hospital);
        assert_eq!(map_facility_type("GOVERNMENT_HOSPITAL"), FacilityType::Hospital);
        assert_eq!(map_facility_type("chc"), FacilityType::PrimaryHealthUnit);
        assert_eq!(map_facility_type("Clinic"), FacilityType::PrimaryHealthUnit);
        assert_eq!(map_facility_type(""), FacilityType::PrimaryHealthUnit);
        assert_eq!(map_facility_type("Laboratory"), FacilityType::PrimaryHealthUnit);
    }

    #[test]
    fn unparsable_level_is_omitted() {
        let item = transform_row(
            &row(&[("level", "two")]),
            &mapping(&[(TargetField::Level, "level")]),
            &ImportConfig::default(),
        );
        assert_eq!(item.level, None);
    }

    #[test]
    fn level_uses_leading_integer() {
        assert_eq!(parse_leading_int("3"), Some(3));
        assert_eq!(parse_leading_int("3rd"), Some(3));
        assert_eq!(parse_leading_int("2.5"), Some(2));
        assert_eq!(parse_leading_int("-1"), Some(-1));
        assert_eq!(parse_leading_int("Level 2"), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn coordinates_parse_or_are_omitted() {
        let item = transform_row(
            &row(&[("Lat", " 8.4844 "), ("Long", "n/a")]),
            &mapping(&[
                (TargetField::Latitude, "Lat"),
                (TargetField::Longitude, "Long"),
            ]),
            &ImportConfig::default(),
        );
        assert_eq!(item.latitude, Some(8.4844));
        assert_eq!(item.longitude, None);
        assert_eq!(parse_leading_float("-13.2317 W"), Some(-13.2317));
        assert_eq!(parse_leading_float("."), None);
    }

    #[test]
    fn coordinates_keep_exponent_and_stop_at_second_dot() {
        assert_eq!(parse_leading_float("1.5e-3"), Some(0.0015));
        assert_eq!(parse_leading_float("8.4844E0"), Some(8.4844));
        assert_eq!(parse_leading_float("-1.2E+1 deg"), Some(-12.0));
        assert_eq!(parse_leading_float("1.2.3"), Some(1.2));
        assert_eq!(parse_leading_float("7e"), Some(7.0));
        assert_eq!(parse_leading_float("3e-x"), Some(3.0));
        assert_eq!(parse_leading_float("inf"), None);
        assert_eq!(parse_leading_float("1e999"), None);

        let item = transform_row(
            &row(&[("Lat", "8.4e-1")]),
            &mapping(&[(TargetField::Latitude, "Lat")]),
            &ImportConfig::default(),
        );
        assert_eq!(item.latitude, Some(0.84));
    }

    #[test]
    fn closed_status_makes_facility_inactive() {
        let policy = MissingFunctionalPolicy::Active;
        assert!(!derive_is_active("CLOSED", "functional", policy));
        assert!(!derive_is_active("open", "Not Functional", policy));
        assert!(derive_is_active("open", "Functional", policy));
        assert!(derive_is_active("", "", policy));
    }

    #[test]
    fn missing_functional_value_follows_policy() {
        let item_for = |policy| {
            let config = ImportConfig {
                missing_functional: policy,
                ..ImportConfig::default()
            };
            transform_row(
                &row(&[("Name", "Kissy")]),
                &mapping(&[(TargetField::Name, "Name")]),
                &config,
            )
        };
        assert!(item_for(MissingFunctionalPolicy::Active).is_active);
        assert!(!item_for(MissingFunctionalPolicy::Inactive).is_active);
    }

    #[test]
    fn ownership_seeds_services() {
        let map = mapping(&[(TargetField::Ownership, "Owner")]);
        let config = ImportConfig::default();
        let owned = transform_row(&row(&[("Owner", " Government ")]), &map, &config);
        assert_eq!(owned.services, vec!["Government".to_string()]);
        let blank = transform_row(&row(&[("Owner", "  ")]), &map, &config);
        assert!(blank.services.is_empty());
    }

    #[test]
    fn blank_optional_text_is_omitted_and_values_trimmed() {
        let item = transform_row(
            &row(&[("Name", "  Lumley CHC "), ("Phone", " "), ("District", "Western Urban")]),
            &mapping(&[
                (TargetField::Name, "Name"),
                (TargetField::Phone, "Phone"),
                (TargetField::DistrictName, "District"),
                (TargetField::Email, "Email"),
            ]),
            &ImportConfig::default(),
        );
        assert_eq!(item.name, "Lumley CHC");
        assert_eq!(item.phone, None);
        assert_eq!(item.email, None);
        assert_eq!(item.district_name.as_deref(), Some("Western Urban"));
    }

    #[test]
    fn prepare_batch_rejects_rows_without_name_or_code() {
        let table = ParsedTable {
            headers: vec!["Name".to_string(), "Code".to_string()],
            rows: vec![
                row(&[("Name", "Kissy MCHP"), ("Code", "K1")]),
                row(&[("Name", ""), ("Code", "K2")]),
                row(&[("Name", "Lumley CHC"), ("Code", " ")]),
                row(&[("Name", ""), ("Code", "")]),
                row(&[("Name", "Bo Govt Hospital"), ("Code", "B1")]),
            ],
        };
        let map = mapping(&[(TargetField::Name, "Name"), (TargetField::FacilityCode, "Code")]);

        let batch = prepare_batch(&table, &map, &ImportConfig::default());

        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.source_rows, vec![1, 5]);
        assert_eq!(batch.total_rows(), 5);
        let rejected: Vec<(usize, &str)> = batch
            .rejected
            .iter()
            .map(|err| (err.row, err.message.as_str()))
            .collect();
        assert_eq!(
            rejected,
            vec![
                (2, "Missing facility name"),
                (3, "Missing facility code"),
                (4, "Missing facility name and facility code"),
            ]
        );
        assert_eq!(batch.rejected[0].code.as_deref(), Some("K2"));
        assert_eq!(batch.rejected[1].name.as_deref(), Some("Lumley CHC"));
    }

    #[test]
    fn unmapped_required_fields_reject_everything() {
        let table = ParsedTable {
            headers: vec!["Name".to_string()],
            rows: vec![row(&[("Name", "Kissy")])],
        };
        let batch = prepare_batch(&table, &ColumnMapping::default(), &ImportConfig::default());
        assert!(batch.is_empty());
        assert_eq!(batch.rejected.len(), 1);
    }
}
