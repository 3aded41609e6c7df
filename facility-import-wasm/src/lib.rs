//! Framework-neutral WASM <-> JavaScript bridge for the facility import dialog.

use facility_import_core::{
    BulkUploadResult, ColumnMapping, ImportConfig, MissingFunctionalPolicy, ParsedTable,
    PreparedBatch, UploadReport,
};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
struct JsImportConfig {
    #[serde(default)]
    max_visible_errors: Option<usize>,
    #[serde(default)]
    missing_functional: Option<MissingFunctionalPolicy>,
}

impl From<JsImportConfig> for ImportConfig {
    fn from(cfg: JsImportConfig) -> Self {
        let mut base = ImportConfig::default();
        if let Some(limit) = cfg.max_visible_errors {
            base.max_visible_errors = limit;
        }
        if let Some(policy) = cfg.missing_functional {
            base.missing_functional = policy;
        }
        base
    }
}

/// Tokenize file text into `{ headers, rows }`; rows are plain objects.
#[wasm_bindgen]
pub fn parse_csv(text: &str) -> Result<JsValue, JsValue> {
    init_panic_hook();
    to_js(&facility_import_csv::parse_csv(text))
}

/// Propose a `{ field: header }` mapping for the given header list.
#[wasm_bindgen]
pub fn auto_map_columns(headers: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let headers: Vec<String> = from_value(headers)
        .map_err(|err| JsValue::from_str(&format!("Could not read headers: {err}")))?;
    to_js(&facility_import_csv::auto_map(&headers))
}

/// Transform the table with the user-confirmed mapping.
#[wasm_bindgen]
pub fn prepare_batch(
    table: JsValue,
    mapping: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let table: ParsedTable = from_value(table)
        .map_err(|err| JsValue::from_str(&format!("Could not read table: {err}")))?;
    let mapping: ColumnMapping = from_value(mapping)
        .map_err(|err| JsValue::from_str(&format!("Could not read mapping: {err}")))?;
    let cfg = read_config(config)?;

    to_js(&facility_import_csv::prepare_batch(&table, &mapping, &cfg))
}

/// Render the API response. When the prepared batch is passed, row numbers
/// are mapped back to the file and locally rejected rows are included.
#[wasm_bindgen]
pub fn summarize_result(
    result: JsValue,
    batch: Option<JsValue>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let mut result: BulkUploadResult = from_value(result)
        .map_err(|err| JsValue::from_str(&format!("Could not read upload result: {err}")))?;
    result
        .validate()
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

    if let Some(batch) = batch {
        let batch: PreparedBatch = from_value(batch)
            .map_err(|err| JsValue::from_str(&format!("Could not read batch: {err}")))?;
        result = facility_import_csv::remap_rows(result, &batch);
        result = facility_import_csv::merge_rejections(result, &batch);
    }

    let cfg = read_config(config)?;
    to_js(&facility_import_csv::build_report(&result, &cfg))
}

/// Report for a submission that failed as a whole.
#[wasm_bindgen]
pub fn upload_failed_report(message: &str) -> Result<JsValue, JsValue> {
    to_js(&UploadReport::failed(message))
}

/// Starter CSV offered by the "download template" link.
#[wasm_bindgen]
pub fn template_csv() -> Result<String, JsValue> {
    facility_import_csv::template_csv().map_err(|err| JsValue::from_str(&err.to_string()))
}

fn read_config(config: Option<JsValue>) -> Result<ImportConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsImportConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Could not read config: {err}")))?;
            Ok(ImportConfig::from(cfg))
        }
        _ => Ok(ImportConfig::default()),
    }
}

/// Plain objects instead of `Map`s, so rows read like `row["HF Code"]`.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Could not serialize value: {err}")))
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}
