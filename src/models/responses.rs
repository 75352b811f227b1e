use serde::{Deserialize, Serialize};

use crate::models::domain::{Coordinates, EnrichedProfile, Location, NearbyMatch, ProfileId};

/// Response for the nearby endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub nearby_users: Vec<NearbyMatch>,
    pub count: usize,
    pub radius_km: f64,
    pub your_location: Coordinates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub users: Vec<EnrichedProfile>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeStatusResponse {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub profile_id: ProfileId,
    pub views: i64,
    pub likes: i64,
    pub fame_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileListResponse {
    pub users: Vec<EnrichedProfile>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResponse {
    pub profile_id: ProfileId,
    pub location: Location,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
