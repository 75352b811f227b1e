use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::filters::Criterion;
use crate::models::{Candidate, Location, LocationUpdate, Profile, ProfileId, ProfileUpdate, TagRemoval};

/// Maximum stored tag name length (`tags.name VARCHAR(64)`)
pub const MAX_TAG_LEN: usize = 64;

/// Errors raised by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to profile records
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile regardless of verification state
    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>>;

    /// Fetch candidates (profile + optional location) matching every criterion
    async fn find_candidates(&self, criteria: &[Criterion]) -> StoreResult<Vec<Candidate>>;

    /// Fetch the given profiles with their locations, in no particular order
    async fn get_candidates(&self, ids: &[ProfileId]) -> StoreResult<Vec<Candidate>>;

    /// Apply a partial update; returns false when the profile does not exist
    async fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> StoreResult<bool>;

    /// Stored fame rating, `None` when the profile does not exist
    async fn fame_rating(&self, id: ProfileId) -> StoreResult<Option<f64>>;
}

/// Read/write access to profile locations
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn get_location(&self, id: ProfileId) -> StoreResult<Option<Location>>;

    /// Insert or overwrite the single location row of a profile
    async fn upsert_location(&self, id: ProfileId, update: LocationUpdate) -> StoreResult<Location>;
}

/// Read/write access to tag assignments
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Tag names per profile; profiles without tags may be absent from the map
    async fn tags_for(&self, ids: &[ProfileId]) -> StoreResult<HashMap<ProfileId, Vec<String>>>;

    /// Create the tag if needed and assign it; assigning twice is a no-op
    async fn add_tag(&self, id: ProfileId, name: &str) -> StoreResult<()>;

    async fn remove_tag(&self, id: ProfileId, name: &str) -> StoreResult<TagRemoval>;

    /// Replace the whole tag set atomically; on error the previous set is kept
    async fn replace_tags(&self, id: ProfileId, names: &[String]) -> StoreResult<Vec<String>>;
}

/// View and like edges
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Record (or refresh the timestamp of) a view edge; true if the edge is new
    async fn record_view(&self, viewer: ProfileId, viewed: ProfileId) -> StoreResult<bool>;

    /// Flip the like edge and return the resulting "liked" state
    async fn toggle_like(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool>;

    async fn like_exists(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool>;

    async fn count_viewers(&self, id: ProfileId) -> StoreResult<i64>;

    async fn count_likers(&self, id: ProfileId) -> StoreResult<i64>;

    /// Viewer ids, most recent view first
    async fn viewers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>>;

    /// Liker ids, most recent like first
    async fn likers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>>;
}

/// Session token resolution owned by the authentication collaborator
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<ProfileId>>;
}

/// Full store capability set handed to the engine and handlers
#[async_trait]
pub trait DatingStore: ProfileStore + LocationStore + TagStore + SignalStore + SessionStore {
    async fn health_check(&self) -> StoreResult<bool>;
}

/// Trim, drop empty names and de-duplicate while keeping first-seen order
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let trimmed = name.trim();
        if !trimmed.is_empty() && !out.iter().any(|n| n == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}
