use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::{
    normalize_tag_names, DatingStore, LocationStore, ProfileStore, SessionStore, SignalStore, StoreError,
    StoreResult, TagStore, MAX_TAG_LEN,
};
use crate::core::filters::{matches_all, Criterion};
use crate::models::{Candidate, Location, LocationUpdate, Profile, ProfileId, ProfileUpdate, TagRemoval};

/// A directed view or like edge with its insertion order
#[derive(Debug, Clone, Copy)]
struct Edge {
    seq: u64,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    profiles: HashMap<ProfileId, Profile>,
    locations: HashMap<ProfileId, Location>,
    tag_names: BTreeSet<String>,
    assignments: HashMap<ProfileId, Vec<String>>,
    views: HashMap<(ProfileId, ProfileId), Edge>,
    likes: HashMap<(ProfileId, ProfileId), Edge>,
    sessions: HashMap<String, ProfileId>,
    seq: u64,
}

impl State {
    fn next_edge(&mut self) -> Edge {
        self.seq += 1;
        Edge { seq: self.seq, at: Utc::now() }
    }

    fn require_profiles(&self, a: ProfileId, b: ProfileId) -> StoreResult<()> {
        for id in [a, b] {
            if !self.profiles.contains_key(&id) {
                return Err(StoreError::Constraint(format!("profile {} does not exist", id)));
            }
        }
        Ok(())
    }

    fn candidate(&self, profile: &Profile) -> Candidate {
        Candidate {
            profile: profile.clone(),
            location: self.locations.get(&profile.id).cloned(),
        }
    }

    /// Sources of edges pointing at `id`, most recent first
    fn incoming(edges: &HashMap<(ProfileId, ProfileId), Edge>, id: ProfileId) -> Vec<ProfileId> {
        let mut sources: Vec<(ProfileId, Edge)> = edges
            .iter()
            .filter(|((_, target), _)| *target == id)
            .map(|((source, _), edge)| (*source, *edge))
            .collect();
        sources.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));
        sources.into_iter().map(|(source, _)| source).collect()
    }
}

/// In-process store with the same observable semantics as the PostgreSQL store.
///
/// Every operation runs under a single lock acquisition, so multi-step writes
/// (tag replacement, like toggling) are atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.state.write().await.profiles.insert(profile.id, profile);
    }

    pub async fn insert_session(&self, token: impl Into<String>, id: ProfileId) {
        self.state.write().await.sessions.insert(token.into(), id);
    }

    pub async fn set_fame_rating(&self, id: ProfileId, fame_rating: f64) {
        if let Some(profile) = self.state.write().await.profiles.get_mut(&id) {
            profile.fame_rating = fame_rating;
        }
    }

    pub async fn view_timestamp(&self, viewer: ProfileId, viewed: ProfileId) -> Option<DateTime<Utc>> {
        self.state.read().await.views.get(&(viewer, viewed)).map(|e| e.at)
    }

    pub async fn view_edge_count(&self) -> usize {
        self.state.read().await.views.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(&id).cloned())
    }

    async fn find_candidates(&self, criteria: &[Criterion]) -> StoreResult<Vec<Candidate>> {
        let state = self.state.read().await;
        let mut candidates: Vec<Candidate> = state
            .profiles
            .values()
            .map(|p| state.candidate(p))
            .filter(|c| matches_all(criteria, c))
            .collect();
        candidates.sort_by_key(|c| c.profile.id);
        Ok(candidates)
    }

    async fn get_candidates(&self, ids: &[ProfileId]) -> StoreResult<Vec<Candidate>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.profiles.get(id))
            .map(|p| state.candidate(p))
            .collect())
    }

    async fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(profile) = state.profiles.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(gender) = update.gender {
            profile.gender = Some(gender);
        }
        if let Some(orientation) = update.orientation {
            profile.orientation = Some(orientation);
        }
        if let Some(bio) = &update.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(first_name) = &update.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(birthday) = update.birthday {
            profile.birthday = Some(birthday);
        }
        Ok(true)
    }

    async fn fame_rating(&self, id: ProfileId) -> StoreResult<Option<f64>> {
        Ok(self.state.read().await.profiles.get(&id).map(|p| p.fame_rating))
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn get_location(&self, id: ProfileId) -> StoreResult<Option<Location>> {
        Ok(self.state.read().await.locations.get(&id).cloned())
    }

    async fn upsert_location(&self, id: ProfileId, update: LocationUpdate) -> StoreResult<Location> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(&id) {
            return Err(StoreError::Constraint(format!("profile {} does not exist", id)));
        }
        let location = Location {
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy_m: update.accuracy_m,
            updated_at: Utc::now(),
        };
        state.locations.insert(id, location.clone());
        Ok(location)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn tags_for(&self, ids: &[ProfileId]) -> StoreResult<HashMap<ProfileId, Vec<String>>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.assignments.get(id).map(|tags| (*id, tags.clone())))
            .collect())
    }

    async fn add_tag(&self, id: ProfileId, name: &str) -> StoreResult<()> {
        if name.chars().count() > MAX_TAG_LEN {
            return Err(StoreError::Constraint(format!("tag name longer than {} characters", MAX_TAG_LEN)));
        }
        let mut state = self.state.write().await;
        state.tag_names.insert(name.to_string());
        let assigned = state.assignments.entry(id).or_default();
        if !assigned.iter().any(|t| t == name) {
            assigned.push(name.to_string());
        }
        Ok(())
    }

    async fn remove_tag(&self, id: ProfileId, name: &str) -> StoreResult<TagRemoval> {
        let mut state = self.state.write().await;
        if !state.tag_names.contains(name) {
            return Ok(TagRemoval::UnknownTag);
        }
        let Some(assigned) = state.assignments.get_mut(&id) else {
            return Ok(TagRemoval::NotAssigned);
        };
        let before = assigned.len();
        assigned.retain(|t| t != name);
        if assigned.len() == before {
            Ok(TagRemoval::NotAssigned)
        } else {
            Ok(TagRemoval::Removed)
        }
    }

    async fn replace_tags(&self, id: ProfileId, names: &[String]) -> StoreResult<Vec<String>> {
        let staged = normalize_tag_names(names);
        // every insert is checked before anything is written
        if let Some(bad) = staged.iter().find(|n| n.chars().count() > MAX_TAG_LEN) {
            return Err(StoreError::Constraint(format!(
                "tag name longer than {} characters: {}",
                MAX_TAG_LEN, bad
            )));
        }

        let mut state = self.state.write().await;
        for name in &staged {
            state.tag_names.insert(name.clone());
        }
        state.assignments.insert(id, staged.clone());
        Ok(staged)
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn record_view(&self, viewer: ProfileId, viewed: ProfileId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        state.require_profiles(viewer, viewed)?;
        let edge = state.next_edge();
        Ok(state.views.insert((viewer, viewed), edge).is_none())
    }

    async fn toggle_like(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        state.require_profiles(liker, liked)?;
        if state.likes.remove(&(liker, liked)).is_some() {
            return Ok(false);
        }
        let edge = state.next_edge();
        state.likes.insert((liker, liked), edge);
        Ok(true)
    }

    async fn like_exists(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool> {
        Ok(self.state.read().await.likes.contains_key(&(liker, liked)))
    }

    async fn count_viewers(&self, id: ProfileId) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state.views.keys().filter(|(_, viewed)| *viewed == id).count() as i64)
    }

    async fn count_likers(&self, id: ProfileId) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state.likes.keys().filter(|(_, liked)| *liked == id).count() as i64)
    }

    async fn viewers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>> {
        Ok(State::incoming(&self.state.read().await.views, id))
    }

    async fn likers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>> {
        Ok(State::incoming(&self.state.read().await.likes, id))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<ProfileId>> {
        Ok(self.state.read().await.sessions.get(token).copied())
    }
}

#[async_trait]
impl DatingStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
