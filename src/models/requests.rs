use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query for `GET /nearby`; numbers stay strings until parsed so malformed
/// values become a `BadInput` instead of an extractor rejection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub radius: Option<String>,
    pub limit: Option<String>,
}

/// Query for `GET /suggestions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsQuery {
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub min_fame: Option<String>,
    pub max_distance: Option<String>,
}

/// Request to store the caller's location
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Partial profile update; omitted fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub gender: Option<String>,
    pub orientation: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`
    pub birthday: Option<String>,
}

/// Request to replace the caller's tag set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTagsRequest {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `?tag=` for adding or removing a single tag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagQuery {
    pub tag: Option<String>,
}
