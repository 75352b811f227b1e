// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Candidate, Coordinates, EnrichedProfile, Gender, Location, LocationUpdate, LongitudeSpan,
    NearbyMatch, Orientation, Profile, ProfileId, ProfileStats, ProfileUpdate, TagRemoval,
};
pub use requests::{
    NearbyQuery, SuggestionsQuery, TagQuery, UpdateLocationRequest, UpdateProfileRequest, UpdateTagsRequest,
};
pub use responses::{
    ErrorResponse, HealthResponse, LikeResponse, LikeStatusResponse, LocationResponse, NearbyResponse,
    ProfileListResponse, StatsResponse, SuggestionsResponse, TagsResponse, ViewResponse,
};
