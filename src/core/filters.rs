use chrono::{Datelike, NaiveDate};

use crate::core::compatibility::CompatibilityClause;
use crate::core::distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
use crate::error::{AppError, AppResult};
use crate::models::{Candidate, Coordinates, ProfileId};

/// A typed, parameterized predicate over candidate profiles.
///
/// Stores AND-combine a slice of criteria; no criterion carries SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Only verified profiles
    Verified,
    /// Exclude one profile (the caller)
    ExcludeProfile(ProfileId),
    /// OR of the clauses; an empty list matches nothing
    Compatible(Vec<CompatibilityClause>),
    /// Birth year within `[min_year, max_year]`; profiles without a birthday fail
    BirthYearBetween { min_year: i32, max_year: i32 },
    /// Fame rating at least this value
    MinFame(f64),
    /// Within `max_km` of `origin`, or no stored location at all
    WithinDistance { origin: Coordinates, max_km: f64 },
    /// Has a stored location within `radius_km` of `origin`
    LocatedWithin { origin: Coordinates, radius_km: f64 },
}

impl Criterion {
    /// Evaluate the criterion against a candidate row
    pub fn matches(&self, candidate: &Candidate) -> bool {
        let profile = &candidate.profile;
        match self {
            Criterion::Verified => profile.verified,
            Criterion::ExcludeProfile(id) => profile.id != *id,
            Criterion::Compatible(clauses) => clauses.iter().any(|c| c.matches(profile)),
            Criterion::BirthYearBetween { min_year, max_year } => profile
                .birth_year()
                .is_some_and(|year| year >= *min_year && year <= *max_year),
            Criterion::MinFame(min) => profile.fame_rating >= *min,
            Criterion::WithinDistance { origin, max_km } => match &candidate.location {
                Some(location) => {
                    haversine_distance(origin.latitude, origin.longitude, location.latitude, location.longitude)
                        <= *max_km
                }
                None => true,
            },
            Criterion::LocatedWithin { origin, radius_km } => match &candidate.location {
                Some(location) => {
                    let bbox = calculate_bounding_box(origin.latitude, origin.longitude, *radius_km);
                    is_within_bounding_box(location.latitude, location.longitude, &bbox)
                        && haversine_distance(origin.latitude, origin.longitude, location.latitude, location.longitude)
                            <= *radius_km
                }
                None => false,
            },
        }
    }
}

/// Whether a candidate satisfies every criterion
pub fn matches_all(criteria: &[Criterion], candidate: &Candidate) -> bool {
    criteria.iter().all(|c| c.matches(candidate))
}

/// Age bounds applied when only one side of the range is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBounds {
    pub min_age: u32,
    pub max_age: u32,
}

impl Default for AgeBounds {
    fn default() -> Self {
        Self { min_age: 18, max_age: 99 }
    }
}

/// Optional suggestion filters, already parsed from the request
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterParams {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_fame: Option<f64>,
    pub max_distance_km: Option<f64>,
}

impl FilterParams {
    /// Parse string-encoded query parameters. Empty strings count as absent;
    /// anything else that fails to parse is `BadInput`.
    pub fn parse(
        min_age: Option<&str>,
        max_age: Option<&str>,
        min_fame: Option<&str>,
        max_distance: Option<&str>,
    ) -> AppResult<Self> {
        Ok(Self {
            min_age: parse_optional(min_age, "minAge")?,
            max_age: parse_optional(max_age, "maxAge")?,
            min_fame: parse_optional_finite(min_fame, "minFame")?,
            max_distance_km: parse_optional_finite(max_distance, "maxDistance")?,
        })
    }
}

pub(crate) fn parse_optional<T: std::str::FromStr>(value: Option<&str>, name: &str) -> AppResult<Option<T>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::bad_input(format!("Invalid {} parameter: {}", name, raw))),
    }
}

pub(crate) fn parse_optional_finite(value: Option<&str>, name: &str) -> AppResult<Option<f64>> {
    match parse_optional::<f64>(value, name)? {
        Some(v) if !v.is_finite() => Err(AppError::bad_input(format!("Invalid {} parameter: {}", name, v))),
        other => Ok(other),
    }
}

/// Assemble the optional filter criteria for a suggestions request.
///
/// - Age: `[min_age, max_age]` becomes a birth-year range relative to `today`.
/// - Fame: fame rating `>= min_fame`.
/// - Distance: skipped when the caller has no stored location or the bound is
///   not positive; otherwise profiles without a location still pass.
pub fn build_filters(
    params: &FilterParams,
    caller_location: Option<Coordinates>,
    today: NaiveDate,
    defaults: AgeBounds,
) -> Vec<Criterion> {
    let mut criteria = Vec::new();

    if params.min_age.is_some() || params.max_age.is_some() {
        let min_age = params.min_age.unwrap_or(defaults.min_age);
        let max_age = params.max_age.unwrap_or(defaults.max_age);
        let current_year = today.year();
        criteria.push(Criterion::BirthYearBetween {
            min_year: current_year.saturating_sub(age_to_years(max_age)),
            max_year: current_year.saturating_sub(age_to_years(min_age)),
        });
    }

    if let Some(min_fame) = params.min_fame {
        criteria.push(Criterion::MinFame(min_fame));
    }

    if let Some(max_km) = params.max_distance_km.filter(|d| *d > 0.0) {
        match caller_location {
            Some(origin) => criteria.push(Criterion::WithinDistance { origin, max_km }),
            None => tracing::debug!("Distance filter skipped: caller has no stored location"),
        }
    }

    criteria
}

fn age_to_years(age: u32) -> i32 {
    i32::try_from(age).unwrap_or(i32::MAX)
}
