use std::fs;

use facility_import_core::{BulkUploadResult, ImportConfig, TargetField};
use facility_import_csv::{build_report, merge_rejections, remap_rows, ImportPreview};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture should be readable")
}

#[test]
fn facility_export_matches_golden_batch() {
    let preview = ImportPreview::from_csv_str(&read_fixture("facilities.csv"));

    assert_eq!(preview.table.headers[0], "Health Facility Name");
    assert_eq!(
        preview.mapping.get(TargetField::Name),
        Some("Health Facility Name")
    );
    assert_eq!(preview.mapping.get(TargetField::DistrictCode), None);

    let batch = preview.prepare(&ImportConfig::default());
    let actual = serde_json::to_value(&batch).expect("batch should serialize");

    let expected: Value = serde_json::from_str(&read_fixture("facilities_batch.json"))
        .expect("golden batch should be valid JSON");

    assert_eq!(actual, expected);
}

#[test]
fn api_result_renders_golden_report() {
    let config = ImportConfig::default();
    let batch = ImportPreview::from_csv_str(&read_fixture("facilities.csv")).prepare(&config);

    let result: BulkUploadResult = serde_json::from_str(&read_fixture("api_result.json"))
        .expect("API result fixture should parse");
    result.validate().expect("API result should be consistent");

    let merged = merge_rejections(remap_rows(result, &batch), &batch);
    merged.validate().expect("merged result should stay consistent");

    let mut actual = serde_json::to_value(build_report(&merged, &config))
        .expect("report should serialize");
    normalize_dynamic_fields(&mut actual);

    let mut expected: Value = serde_json::from_str(&read_fixture("upload_report.json"))
        .expect("golden report should be valid JSON");
    normalize_dynamic_fields(&mut expected);

    assert_eq!(actual, expected);
}

fn normalize_dynamic_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("generated_at") {
            obj.insert(
                "generated_at".to_string(),
                Value::String("__DYNAMIC_TIMESTAMP__".to_string()),
            );
        }
    }
}
