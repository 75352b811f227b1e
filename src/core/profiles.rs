use std::sync::Arc;

use chrono::NaiveDate;
use validator::Validate;

use crate::core::discovery::enrich;
use crate::core::filters::Criterion;
use crate::error::{AppError, AppResult};
use crate::models::{
    EnrichedProfile, Gender, Location, LocationUpdate, Orientation, ProfileId, ProfileUpdate, TagRemoval,
    UpdateLocationRequest, UpdateProfileRequest,
};
use crate::services::store::normalize_tag_names;
use crate::services::{DatingStore, MAX_TAG_LEN};

/// Profile, location and tag operations on behalf of a caller.
///
/// Input is checked before any write reaches the store.
#[derive(Clone)]
pub struct ProfileDirectory {
    store: Arc<dyn DatingStore>,
}

impl ProfileDirectory {
    pub fn new(store: Arc<dyn DatingStore>) -> Self {
        Self { store }
    }

    /// A verified profile with its tags and location
    pub async fn get_profile(&self, id: ProfileId) -> AppResult<EnrichedProfile> {
        let candidates = self.store.get_candidates(&[id]).await?;
        let visible: Vec<_> = candidates.into_iter().filter(|c| c.profile.verified).collect();

        enrich(self.store.as_ref(), visible)
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("profile not found"))
    }

    /// Every verified profile, ascending by id
    pub async fn list_profiles(&self) -> AppResult<Vec<EnrichedProfile>> {
        let candidates = self.store.find_candidates(&[Criterion::Verified]).await?;
        enrich(self.store.as_ref(), candidates).await
    }

    /// The caller's own profile, verified or not
    pub async fn current_profile(&self, caller: ProfileId) -> AppResult<EnrichedProfile> {
        let candidates = self.store.get_candidates(&[caller]).await?;

        enrich(self.store.as_ref(), candidates)
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("profile not found"))
    }

    pub async fn update_profile(&self, caller: ProfileId, request: UpdateProfileRequest) -> AppResult<EnrichedProfile> {
        let update = parse_profile_update(request)?;

        if !self.store.update_profile(caller, &update).await? {
            return Err(AppError::not_found("profile not found"));
        }
        tracing::info!("Updated profile {}", caller);

        self.current_profile(caller).await
    }

    pub async fn update_location(&self, caller: ProfileId, request: UpdateLocationRequest) -> AppResult<Location> {
        request.validate()?;
        if !request.latitude.is_finite() || !request.longitude.is_finite() {
            return Err(AppError::bad_input("coordinates must be finite numbers"));
        }

        let update = LocationUpdate {
            latitude: request.latitude,
            longitude: request.longitude,
            accuracy_m: request.accuracy,
        };
        let location = self.store.upsert_location(caller, update).await?;
        tracing::debug!("Location of {} set to ({}, {})", caller, location.latitude, location.longitude);
        Ok(location)
    }

    pub async fn get_location(&self, id: ProfileId) -> AppResult<Location> {
        self.store
            .get_location(id)
            .await?
            .ok_or_else(|| AppError::not_found("location not found"))
    }

    pub async fn list_tags(&self, caller: ProfileId) -> AppResult<Vec<String>> {
        let mut tags = self.store.tags_for(&[caller]).await?;
        Ok(tags.remove(&caller).unwrap_or_default())
    }

    pub async fn add_tag(&self, caller: ProfileId, name: &str) -> AppResult<Vec<String>> {
        let name = checked_tag_name(name)?;
        self.store.add_tag(caller, name).await?;
        self.list_tags(caller).await
    }

    pub async fn remove_tag(&self, caller: ProfileId, name: &str) -> AppResult<Vec<String>> {
        let name = checked_tag_name(name)?;
        match self.store.remove_tag(caller, name).await? {
            TagRemoval::Removed => self.list_tags(caller).await,
            TagRemoval::UnknownTag => Err(AppError::not_found(format!("tag '{}' does not exist", name))),
            TagRemoval::NotAssigned => Err(AppError::not_found(format!("tag '{}' is not assigned", name))),
        }
    }

    /// Replace the caller's whole tag set in one store transaction
    pub async fn replace_tags(&self, caller: ProfileId, names: &[String]) -> AppResult<Vec<String>> {
        let names = normalize_tag_names(names);
        if let Some(bad) = names.iter().find(|n| n.chars().count() > MAX_TAG_LEN) {
            return Err(AppError::bad_input(format!(
                "tag names are limited to {} characters: {}",
                MAX_TAG_LEN, bad
            )));
        }

        let stored = self.store.replace_tags(caller, &names).await?;
        tracing::info!("Replaced tags of {} ({} tags)", caller, stored.len());
        Ok(stored)
    }
}

fn checked_tag_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_input("tag name is required"));
    }
    if name.chars().count() > MAX_TAG_LEN {
        return Err(AppError::bad_input(format!("tag names are limited to {} characters", MAX_TAG_LEN)));
    }
    Ok(name)
}

/// Validate a profile update request into a typed partial update
pub fn parse_profile_update(request: UpdateProfileRequest) -> AppResult<ProfileUpdate> {
    request.validate()?;

    let gender = match request.gender.as_deref() {
        Some(raw) => Some(Gender::parse(raw).ok_or_else(|| AppError::bad_input("gender must be Man or Woman"))?),
        None => None,
    };
    let birthday = match request.birthday.as_deref() {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| AppError::bad_input("birthday must be formatted as YYYY-MM-DD"))?,
        ),
        None => None,
    };

    let update = ProfileUpdate {
        gender,
        orientation: request.orientation.as_deref().map(Orientation::normalize),
        bio: request.bio,
        first_name: request.first_name,
        last_name: request.last_name,
        birthday,
    };

    if update.is_empty() {
        return Err(AppError::bad_input("no fields to update"));
    }
    Ok(update)
}
