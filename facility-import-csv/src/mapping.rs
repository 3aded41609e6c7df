//! Header normalization and alias-based column auto-mapping.
//!
//! The auto-mapper is a heuristic. An alias matches a header when the two
//! normalized strings are equal or either contains the other, so a short
//! header such as `Name` can satisfy several fields at once. Results are
//! deterministic but advisory: callers let the user override them.

use facility_import_core::{ColumnMapping, TargetField};

/// Candidate aliases per target field, most specific first.
pub type AliasTable = [(TargetField, &'static [&'static str])];

/// Built-in aliases, already in normalized form.
pub const FIELD_ALIASES: &AliasTable = &[
    (
        TargetField::Name,
        &["facilityname", "healthfacilityname", "hfname", "nameoffacility", "name"],
    ),
    (
        TargetField::FacilityCode,
        &["facilitycode", "hfcode", "hfuid", "mflcode", "code"],
    ),
    (
        TargetField::FacilityType,
        &["facilitytype", "hftype", "type", "category"],
    ),
    (TargetField::Level, &["level", "facilitylevel", "tier"]),
    (TargetField::DistrictName, &["districtname", "district"]),
    (TargetField::DistrictCode, &["districtcode", "districtid"]),
    (
        TargetField::Address,
        &["address", "physicaladdress", "location", "town"],
    ),
    (TargetField::Latitude, &["latitude", "lat", "gpslat"]),
    (
        TargetField::Longitude,
        &["longitude", "long", "lng", "lon", "gpslong"],
    ),
    (
        TargetField::Phone,
        &["phone", "phonenumber", "telephone", "mobile", "contact"],
    ),
    (TargetField::Email, &["email", "emailaddress", "mail"]),
    (
        TargetField::Ownership,
        &["ownership", "owner", "ownedby", "authority"],
    ),
    (
        TargetField::Status,
        &["status", "operationalstatus", "openclosed"],
    ),
    (
        TargetField::Functional,
        &["functional", "functionality", "isfunctional"],
    ),
    (
        TargetField::ManagerName,
        &["managername", "manager", "incharge", "officerincharge"],
    ),
    (TargetField::Region, &["region", "province"]),
];

/// Lowercase and strip everything outside `[a-z0-9]`.
///
/// `Facility Name`, `facility_name` and `FacilityName` all become
/// `facilityname`. Idempotent.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Propose a mapping for `headers` using [`FIELD_ALIASES`].
pub fn auto_map(headers: &[String]) -> ColumnMapping {
    auto_map_with(headers, FIELD_ALIASES)
}

/// Propose a mapping for `headers` using a caller supplied alias table.
///
/// Fields are visited in table order; within a field, aliases in list order,
/// and for each alias the first matching header by position wins. A header
/// may be assigned to more than one field.
pub fn auto_map_with(headers: &[String], aliases: &AliasTable) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut mapping = ColumnMapping::default();

    for (field, candidates) in aliases {
        if let Some(index) = find_header(&normalized, candidates) {
            tracing::debug!(
                field = field.as_str(),
                header = %headers[index],
                "Auto-mapped column"
            );
            mapping.set(*field, headers[index].clone());
        }
    }

    mapping
}

fn find_header(normalized: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|alias| {
        let alias = normalize_header(alias);
        if alias.is_empty() {
            return None;
        }
        normalized
            .iter()
            .position(|header| header_matches(header, &alias))
    })
}

fn header_matches(header: &str, alias: &str) -> bool {
    !header.is_empty() && (header == alias || header.contains(alias) || alias.contains(header))
}
