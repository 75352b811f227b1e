use std::collections::HashMap;
use std::sync::Arc;

use crate::core::discovery::enrich;
use crate::error::{AppError, AppResult};
use crate::models::{EnrichedProfile, ProfileId, ProfileStats};
use crate::services::DatingStore;

/// View and like tracking plus the derived popularity stats
#[derive(Clone)]
pub struct SignalTracker {
    store: Arc<dyn DatingStore>,
}

impl SignalTracker {
    pub fn new(store: Arc<dyn DatingStore>) -> Self {
        Self { store }
    }

    async fn require_profile(&self, id: ProfileId) -> AppResult<()> {
        match self.store.get_profile(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("profile not found")),
        }
    }

    /// Record that `viewer` looked at `viewed`.
    ///
    /// Viewing yourself succeeds without recording anything. Returns whether a
    /// new view edge was created.
    pub async fn record_view(&self, viewer: ProfileId, viewed: ProfileId) -> AppResult<bool> {
        if viewer == viewed {
            return Ok(false);
        }
        self.require_profile(viewed).await?;

        let created = self.store.record_view(viewer, viewed).await?;
        tracing::debug!("View {} -> {} (new: {})", viewer, viewed, created);
        Ok(created)
    }

    /// Flip the like edge and return the resulting state
    pub async fn toggle_like(&self, liker: ProfileId, liked: ProfileId) -> AppResult<bool> {
        if liker == liked {
            return Err(AppError::precondition("cannot like yourself"));
        }
        self.require_profile(liked).await?;

        let state = self.store.toggle_like(liker, liked).await?;
        tracing::info!("Like {} -> {}: {}", liker, liked, if state { "liked" } else { "unliked" });
        Ok(state)
    }

    pub async fn like_status(&self, liker: ProfileId, liked: ProfileId) -> AppResult<bool> {
        Ok(self.store.like_exists(liker, liked).await?)
    }

    /// Distinct viewers, distinct likers and fame rating.
    ///
    /// Each field falls back to zero when its lookup fails.
    pub async fn stats(&self, id: ProfileId) -> ProfileStats {
        let views = self.store.count_viewers(id).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to count viewers of {}: {}", id, e);
            0
        });
        let likes = self.store.count_likers(id).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to count likers of {}: {}", id, e);
            0
        });
        let fame_rating = match self.store.fame_rating(id).await {
            Ok(rating) => rating.unwrap_or(0.0),
            Err(e) => {
                tracing::warn!("Failed to read fame rating of {}: {}", id, e);
                0.0
            }
        };

        ProfileStats { views, likes, fame_rating }
    }

    /// Profiles that viewed `id`, most recent first
    pub async fn viewers(&self, id: ProfileId) -> AppResult<Vec<EnrichedProfile>> {
        let ids = self.store.viewers_of(id).await?;
        self.profiles_in_order(&ids).await
    }

    /// Profiles that like `id`, most recent first
    pub async fn likers(&self, id: ProfileId) -> AppResult<Vec<EnrichedProfile>> {
        let ids = self.store.likers_of(id).await?;
        self.profiles_in_order(&ids).await
    }

    async fn profiles_in_order(&self, ids: &[ProfileId]) -> AppResult<Vec<EnrichedProfile>> {
        let mut by_id: HashMap<ProfileId, _> = self
            .store
            .get_candidates(ids)
            .await?
            .into_iter()
            .map(|c| (c.profile.id, c))
            .collect();
        let ordered = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        enrich(self.store.as_ref(), ordered).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Orientation, Profile};
    use crate::services::MemoryStore;

    fn profile(id: i32) -> Profile {
        Profile {
            id,
            username: format!("user{}", id),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            verified: true,
            gender: Some(Gender::Woman),
            orientation: Some(Orientation::LikesBoth),
            birthday: None,
            bio: None,
            avatar_url: None,
            fame_rating: 0.0,
        }
    }

    async fn fixture(ids: &[i32]) -> (Arc<MemoryStore>, SignalTracker) {
        let store = Arc::new(MemoryStore::new());
        for id in ids {
            store.insert_profile(profile(*id)).await;
        }
        let tracker = SignalTracker::new(store.clone());
        (store, tracker)
    }

    #[tokio::test]
    async fn test_toggle_like_twice() {
        let (_store, tracker) = fixture(&[1, 2]).await;

        assert!(tracker.toggle_like(1, 2).await.unwrap());
        assert!(tracker.like_status(1, 2).await.unwrap());
        assert!(!tracker.toggle_like(1, 2).await.unwrap());
        assert!(!tracker.like_status(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_like_rejected() {
        let (_store, tracker) = fixture(&[1]).await;
        let err = tracker.toggle_like(1, 1).await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_self_view_is_noop() {
        let (store, tracker) = fixture(&[1]).await;
        assert!(!tracker.record_view(1, 1).await.unwrap());
        assert_eq!(store.view_edge_count().await, 0);
    }

    #[tokio::test]
    async fn test_view_is_idempotent() {
        let (store, tracker) = fixture(&[1, 2]).await;
        assert!(tracker.record_view(1, 2).await.unwrap());
        assert!(!tracker.record_view(1, 2).await.unwrap());
        assert_eq!(store.view_edge_count().await, 1);
        assert_eq!(tracker.stats(2).await.views, 1);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (_store, tracker) = fixture(&[1]).await;
        assert!(matches!(tracker.record_view(1, 7).await, Err(AppError::NotFound(_))));
        assert!(matches!(tracker.toggle_like(1, 7).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_counts_distinct_signals() {
        let (store, tracker) = fixture(&[1, 2, 3]).await;
        store.set_fame_rating(3, 42.5).await;
        tracker.record_view(1, 3).await.unwrap();
        tracker.record_view(2, 3).await.unwrap();
        tracker.record_view(2, 3).await.unwrap();
        tracker.toggle_like(1, 3).await.unwrap();

        let stats = tracker.stats(3).await;
        assert_eq!(stats, ProfileStats { views: 2, likes: 1, fame_rating: 42.5 });
    }

    #[tokio::test]
    async fn test_stats_for_missing_profile_are_zero() {
        let (_store, tracker) = fixture(&[]).await;
        assert_eq!(tracker.stats(99).await, ProfileStats { views: 0, likes: 0, fame_rating: 0.0 });
    }

    #[tokio::test]
    async fn test_likers_most_recent_first() {
        let (_store, tracker) = fixture(&[1, 2, 3, 4]).await;
        tracker.toggle_like(3, 1).await.unwrap();
        tracker.toggle_like(2, 1).await.unwrap();
        tracker.toggle_like(4, 1).await.unwrap();

        let likers: Vec<i32> = tracker.likers(1).await.unwrap().iter().map(|p| p.profile.id).collect();
        assert_eq!(likers, vec![4, 2, 3]);
    }
}
