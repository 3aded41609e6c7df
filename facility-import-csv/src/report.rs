//! Rendering of upload results for the import dialog and the CLI.

use chrono::Utc;
use facility_import_core::{
    BulkUploadResult, ImportConfig, PreparedBatch, RowError, UploadOutcome, UploadReport,
};

/// Render an API result. Error lines are capped at `config.max_visible_errors`.
pub fn build_report(result: &BulkUploadResult, config: &ImportConfig) -> UploadReport {
    let summary = format!(
        "Processed {} facilities: {} created, {} skipped, {} failed",
        result.total_processed, result.successful, result.skipped, result.failed
    );

    let error_lines: Vec<String> = result
        .errors
        .iter()
        .take(config.max_visible_errors)
        .map(format_row_error)
        .collect();
    let hidden_errors = result.errors.len() - error_lines.len();

    let outcome = if result.has_failures() {
        UploadOutcome::PartiallyFailed
    } else {
        UploadOutcome::Completed
    };

    UploadReport {
        generated_at: Utc::now(),
        outcome,
        summary,
        error_lines,
        hidden_errors,
        can_retry: outcome != UploadOutcome::Completed,
    }
}

/// `Row 4 (Kissy MCHP): Duplicate facility code`
pub fn format_row_error(error: &RowError) -> String {
    match error.name.as_deref().or(error.code.as_deref()) {
        Some(label) => format!("Row {} ({label}): {}", error.row, error.message),
        None => format!("Row {}: {}", error.row, error.message),
    }
}

/// Rewrite API row numbers (positions in the submitted batch) to the data
/// rows of the source file. Rows outside the batch are left untouched.
pub fn remap_rows(mut result: BulkUploadResult, batch: &PreparedBatch) -> BulkUploadResult {
    for error in &mut result.errors {
        if let Some(source) = error
            .row
            .checked_sub(1)
            .and_then(|index| batch.source_rows.get(index))
        {
            error.row = *source;
        }
    }
    result
}

/// Count rows refused before submission as failures of the upload.
pub fn merge_rejections(mut result: BulkUploadResult, batch: &PreparedBatch) -> BulkUploadResult {
    let rejected = batch.rejected.len();
    result.total_processed += rejected;
    result.failed += rejected;
    result.errors.extend(batch.rejected.iter().cloned());
    result.errors.sort_by_key(|error| error.row);
    result
}
