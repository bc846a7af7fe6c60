use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One institutional affiliation as delivered by the paper backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Affiliation {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub geocoded: bool,
}

/// An affiliation whose coordinates were checked field by field.
///
/// Only [`validate`] builds one, so holding a `ValidAffiliation` means the
/// location is present, finite and in range.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidAffiliation {
    institution: String,
    country: String,
    location: GeoPoint,
}

impl ValidAffiliation {
    pub fn institution(&self) -> &str {
        &self.institution
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotGeocoded,
    MissingLatitude,
    MissingLongitude,
    NonFinite,
    LatitudeOutOfRange,
    LongitudeOutOfRange,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotGeocoded => write!(f, "not geocoded"),
            SkipReason::MissingLatitude => write!(f, "latitude missing"),
            SkipReason::MissingLongitude => write!(f, "longitude missing"),
            SkipReason::NonFinite => write!(f, "coordinates are not finite"),
            SkipReason::LatitudeOutOfRange => write!(f, "latitude outside [-90, 90]"),
            SkipReason::LongitudeOutOfRange => write!(f, "longitude outside [-180, 180]"),
        }
    }
}

#[derive(Debug)]
pub enum AffiliationError {
    Json(String),
}

impl std::fmt::Display for AffiliationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AffiliationError::Json(msg) => write!(f, "invalid affiliation list: {msg}"),
        }
    }
}

impl std::error::Error for AffiliationError {}

/// Re-checks the raw fields; the `geocoded` flag alone is never trusted.
pub fn validate(affiliation: &Affiliation) -> Result<ValidAffiliation, SkipReason> {
    if !affiliation.geocoded {
        return Err(SkipReason::NotGeocoded);
    }
    let latitude = affiliation.latitude.ok_or(SkipReason::MissingLatitude)?;
    let longitude = affiliation.longitude.ok_or(SkipReason::MissingLongitude)?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(SkipReason::NonFinite);
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SkipReason::LatitudeOutOfRange);
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SkipReason::LongitudeOutOfRange);
    }

    Ok(ValidAffiliation {
        institution: affiliation.institution.clone(),
        country: affiliation.country.clone(),
        location: GeoPoint::new(latitude, longitude),
    })
}

/// Keeps the valid subset in input order. Skips are informational only.
pub fn filter_valid(affiliations: &[Affiliation]) -> Vec<ValidAffiliation> {
    affiliations
        .iter()
        .enumerate()
        .filter_map(|(index, affiliation)| match validate(affiliation) {
            Ok(valid) => Some(valid),
            Err(reason) => {
                info!(
                    index,
                    institution = %affiliation.institution,
                    %reason,
                    "skipping affiliation"
                );
                None
            }
        })
        .collect()
}

/// Parses the backend payload. `null` (or blank input) means "no list".
pub fn parse_affiliations(payload: &str) -> Result<Option<Vec<Affiliation>>, AffiliationError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() || trimmed == "undefined" {
        return Ok(None);
    }
    serde_json::from_str::<Option<Vec<Affiliation>>>(trimmed)
        .map_err(|e| AffiliationError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{Affiliation, SkipReason, filter_valid, parse_affiliations, validate};
    use pretty_assertions::assert_eq;

    fn geocoded(institution: &str, lat: Option<f64>, lon: Option<f64>) -> Affiliation {
        Affiliation {
            institution: institution.to_string(),
            country: "Nowhere".to_string(),
            latitude: lat,
            longitude: lon,
            geocoded: true,
            ..Default::default()
        }
    }

    #[test]
    fn keeps_only_fully_geocoded_entries() {
        let list = vec![
            geocoded("first", Some(10.0), Some(20.0)),
            Affiliation {
                institution: "second".to_string(),
                geocoded: false,
                ..Default::default()
            },
            geocoded("third", None, Some(30.0)),
        ];

        let valid = filter_valid(&list);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].institution(), "first");
        assert_eq!(valid[0].location().latitude, 10.0);
        assert_eq!(valid[0].location().longitude, 20.0);
    }

    #[test]
    fn flag_is_not_trusted_alone() {
        assert_eq!(
            validate(&geocoded("a", Some(91.0), Some(0.0))),
            Err(SkipReason::LatitudeOutOfRange)
        );
        assert_eq!(
            validate(&geocoded("b", Some(0.0), Some(-180.5))),
            Err(SkipReason::LongitudeOutOfRange)
        );
        assert_eq!(
            validate(&geocoded("c", Some(f64::NAN), Some(0.0))),
            Err(SkipReason::NonFinite)
        );
        assert_eq!(
            validate(&geocoded("d", Some(1.0), None)),
            Err(SkipReason::MissingLongitude)
        );
    }

    #[test]
    fn coordinates_without_flag_are_skipped() {
        let mut a = geocoded("e", Some(1.0), Some(2.0));
        a.geocoded = false;
        assert_eq!(validate(&a), Err(SkipReason::NotGeocoded));
    }

    #[test]
    fn preserves_input_order() {
        let list = vec![
            geocoded("x", Some(1.0), Some(1.0)),
            geocoded("y", Some(2.0), Some(2.0)),
            geocoded("z", Some(3.0), Some(3.0)),
        ];
        let valid = filter_valid(&list);
        let names: Vec<&str> = valid.iter().map(|v| v.institution()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn parses_backend_payload_with_nulls() {
        let payload = r#"[
            {"institution": "MIT", "address": null, "country": "USA",
             "latitude": 42.36, "longitude": -71.09, "geocoded": true},
            {"institution": "Unknown Lab", "country": "",
             "latitude": null, "longitude": null, "geocoded": false}
        ]"#;
        let list = parse_affiliations(payload).unwrap().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].latitude, Some(42.36));
        assert_eq!(list[1].address, None);
        assert!(!list[1].geocoded);
    }

    #[test]
    fn null_and_blank_mean_no_list() {
        assert_eq!(parse_affiliations("null").unwrap(), None);
        assert_eq!(parse_affiliations("  ").unwrap(), None);
        assert_eq!(parse_affiliations("undefined").unwrap(), None);
        assert!(parse_affiliations("{not json").is_err());
    }
}
