//! Shared data model for the bulk facility import pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tunables shared by the pipeline, the HTTP client and the front ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    /// Base URL of the facility API, without a trailing slash.
    pub api_base_url: String,
    /// Path of the bulk upload endpoint, appended to `api_base_url`.
    pub upload_path: String,
    /// Path of the token refresh endpoint, appended to `api_base_url`.
    pub refresh_path: String,
    pub request_timeout_secs: u64,
    /// Number of per-row errors listed in a report before the rest are folded
    /// into a "more" counter.
    pub max_visible_errors: usize,
    /// What `isActive` becomes when a row carries no functional value.
    pub missing_functional: MissingFunctionalPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            upload_path: "/facilities/bulk-upload".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            request_timeout_secs: 30,
            max_visible_errors: 50,
            missing_functional: MissingFunctionalPolicy::Active,
        }
    }
}

impl ImportConfig {
    pub fn upload_url(&self) -> String {
        join_url(&self.api_base_url, &self.upload_path)
    }

    pub fn refresh_url(&self) -> String {
        join_url(&self.api_base_url, &self.refresh_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Policy for rows whose functional column is unmapped or blank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingFunctionalPolicy {
    /// Treat the facility as functional.
    #[default]
    Active,
    /// Treat the facility as non-functional (blank never equals "functional").
    Inactive,
}

/// Facility attribute a CSV column can be mapped onto.
///
/// Declaration order is the auto-mapper's priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TargetField {
    Name,
    FacilityCode,
    FacilityType,
    Level,
    DistrictName,
    DistrictCode,
    Address,
    Latitude,
    Longitude,
    Phone,
    Email,
    Ownership,
    Status,
    Functional,
    ManagerName,
    Region,
}

impl TargetField {
    pub const ALL: [TargetField; 16] = [
        TargetField::Name,
        TargetField::FacilityCode,
        TargetField::FacilityType,
        TargetField::Level,
        TargetField::DistrictName,
        TargetField::DistrictCode,
        TargetField::Address,
        TargetField::Latitude,
        TargetField::Longitude,
        TargetField::Phone,
        TargetField::Email,
        TargetField::Ownership,
        TargetField::Status,
        TargetField::Functional,
        TargetField::ManagerName,
        TargetField::Region,
    ];

    /// Wire name of the field (camelCase).
    pub fn as_str(self) -> &'static str {
        match self {
            TargetField::Name => "name",
            TargetField::FacilityCode => "facilityCode",
            TargetField::FacilityType => "facilityType",
            TargetField::Level => "level",
            TargetField::DistrictName => "districtName",
            TargetField::DistrictCode => "districtCode",
            TargetField::Address => "address",
            TargetField::Latitude => "latitude",
            TargetField::Longitude => "longitude",
            TargetField::Phone => "phone",
            TargetField::Email => "email",
            TargetField::Ownership => "ownership",
            TargetField::Status => "status",
            TargetField::Functional => "functional",
            TargetField::ManagerName => "managerName",
            TargetField::Region => "region",
        }
    }

    /// Human readable label used in mapping tables and templates.
    pub fn label(self) -> &'static str {
        match self {
            TargetField::Name => "Facility Name",
            TargetField::FacilityCode => "Facility Code",
            TargetField::FacilityType => "Facility Type",
            TargetField::Level => "Level",
            TargetField::DistrictName => "District Name",
            TargetField::DistrictCode => "District Code",
            TargetField::Address => "Address",
            TargetField::Latitude => "Latitude",
            TargetField::Longitude => "Longitude",
            TargetField::Phone => "Phone",
            TargetField::Email => "Email",
            TargetField::Ownership => "Ownership",
            TargetField::Status => "Status",
            TargetField::Functional => "Functional Status",
            TargetField::ManagerName => "Manager Name",
            TargetField::Region => "Region",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, TargetField::Name | TargetField::FacilityCode)
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetField {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        TargetField::ALL
            .into_iter()
            .find(|field| {
                field.as_str().eq_ignore_ascii_case(wanted)
                    || field.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ImportError::UnknownField(wanted.to_string()))
    }
}

/// One data row: original header text to raw cell value.
pub type RawRow = BTreeMap<String, String>;

/// Untyped result of tokenizing an uploaded CSV file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedTable {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Cell text for `header` in data row `index`, empty when absent.
    pub fn cell(&self, index: usize, header: &str) -> &str {
        self.rows
            .get(index)
            .and_then(|row| row.get(header))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Target field to source header assignment. An empty header means unmapped.
///
/// Every [`TargetField`] is always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "BTreeMap<TargetField, String>",
    into = "BTreeMap<TargetField, String>"
)]
pub struct ColumnMapping {
    columns: BTreeMap<TargetField, String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            columns: TargetField::ALL
                .into_iter()
                .map(|field| (field, String::new()))
                .collect(),
        }
    }
}

impl From<BTreeMap<TargetField, String>> for ColumnMapping {
    fn from(columns: BTreeMap<TargetField, String>) -> Self {
        let mut mapping = Self::default();
        for (field, header) in columns {
            mapping.set(field, header);
        }
        mapping
    }
}

impl From<ColumnMapping> for BTreeMap<TargetField, String> {
    fn from(mapping: ColumnMapping) -> Self {
        mapping.columns
    }
}

impl ColumnMapping {
    /// Source header assigned to `field`, `None` when unmapped.
    pub fn get(&self, field: TargetField) -> Option<&str> {
        self.columns
            .get(&field)
            .map(String::as_str)
            .filter(|header| !header.is_empty())
    }

    pub fn set(&mut self, field: TargetField, header: impl Into<String>) {
        self.columns.insert(field, header.into());
    }

    pub fn clear(&mut self, field: TargetField) {
        self.columns.insert(field, String::new());
    }

    pub fn is_mapped(&self, field: TargetField) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetField, &str)> {
        self.columns
            .iter()
            .map(|(field, header)| (*field, header.as_str()))
    }

    pub fn unmapped(&self) -> Vec<TargetField> {
        TargetField::ALL
            .into_iter()
            .filter(|field| !self.is_mapped(*field))
            .collect()
    }

    /// Required fields the user still has to map before submitting.
    pub fn missing_required(&self) -> Vec<TargetField> {
        self.unmapped()
            .into_iter()
            .filter(|field| field.is_required())
            .collect()
    }
}

/// Facility category understood by the upload endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FacilityType {
    /// Peripheral health unit: MCHP, CHP, CHC, clinics.
    #[default]
    #[serde(rename = "PHU")]
    PrimaryHealthUnit,
    #[serde(rename = "HOSPITAL")]
    Hospital,
}

/// One facility record, shaped for the bulk upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadItem {
    pub name: String,
    pub facility_code: String,
    pub facility_type: FacilityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub services: Vec<String>,
}

/// Per-row failure, either reported by the API or found before submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Outcome of one bulk upload round trip, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadResult {
    pub total_processed: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

impl BulkUploadResult {
    /// Checks `successful + skipped + failed == total_processed`.
    pub fn validate(&self) -> Result<(), ImportError> {
        let accounted = self
            .successful
            .saturating_add(self.skipped)
            .saturating_add(self.failed);
        if accounted != self.total_processed {
            return Err(ImportError::InconsistentResult {
                total: self.total_processed,
                accounted,
            });
        }
        Ok(())
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.errors.is_empty()
    }
}

/// Items ready for submission plus the rows refused before submission.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreparedBatch {
    pub items: Vec<BulkUploadItem>,
    /// `source_rows[i]` is the 1-based data row that produced `items[i]`.
    pub source_rows: Vec<usize>,
    pub rejected: Vec<RowError>,
}

impl PreparedBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Data rows seen, accepted or not.
    pub fn total_rows(&self) -> usize {
        self.items.len() + self.rejected.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed,
    PartiallyFailed,
    Failed,
}

/// Human readable rendering of an upload outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadReport {
    pub generated_at: DateTime<Utc>,
    pub outcome: UploadOutcome,
    pub summary: String,
    /// Visible `row, name, message` lines, at most `max_visible_errors`.
    pub error_lines: Vec<String>,
    /// Error lines left out of `error_lines`.
    pub hidden_errors: usize,
    pub can_retry: bool,
}

impl UploadReport {
    /// Report for a submission that failed as a whole (network, 4xx/5xx).
    pub fn failed(message: impl fmt::Display) -> Self {
        Self {
            generated_at: Utc::now(),
            outcome: UploadOutcome::Failed,
            summary: format!("Upload failed: {message}"),
            error_lines: Vec::new(),
            hidden_errors: 0,
            can_retry: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unknown target field: {0}")]
    UnknownField(String),
    #[error("Upload result does not add up: {accounted} accounted for, {total} processed")]
    InconsistentResult { total: usize, accounted: usize },
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}
