use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::config::DiscoverySettings;
use crate::core::compatibility::{effective_orientation, resolve_clauses};
use crate::core::distance::distance_between;
use crate::core::filters::{build_filters, parse_optional, parse_optional_finite, AgeBounds, Criterion, FilterParams};
use crate::error::{AppError, AppResult};
use crate::models::{Candidate, Coordinates, EnrichedProfile, NearbyMatch, ProfileId};
use crate::services::DatingStore;

/// Fallbacks for parameters a discovery request leaves out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryDefaults {
    pub radius_km: f64,
    pub limit: usize,
    pub age_bounds: AgeBounds,
}

impl Default for DiscoveryDefaults {
    fn default() -> Self {
        Self {
            radius_km: 200.0,
            limit: 50,
            age_bounds: AgeBounds::default(),
        }
    }
}

impl From<&DiscoverySettings> for DiscoveryDefaults {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            radius_km: settings.default_radius_km,
            limit: settings.default_limit,
            age_bounds: settings.age_bounds(),
        }
    }
}

/// Caller overrides for a nearby search, already parsed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NearbyParams {
    pub radius_km: Option<f64>,
    pub limit: Option<i64>,
}

impl NearbyParams {
    /// Malformed numbers are `BadInput`; non-positive values are kept here and
    /// ignored by the engine.
    pub fn parse(radius: Option<&str>, limit: Option<&str>) -> AppResult<Self> {
        Ok(Self {
            radius_km: parse_optional_finite(radius, "radius")?,
            limit: parse_optional(limit, "limit")?,
        })
    }
}

/// Nearby search outcome
#[derive(Debug, Clone)]
pub struct NearbyResult {
    /// Ascending by distance
    pub matches: Vec<NearbyMatch>,
    /// Radius actually applied
    pub radius_km: f64,
    pub origin: Coordinates,
}

/// Discovery engine: proximity search and compatibility-filtered suggestions.
///
/// # Modes
/// 1. Nearby: verified profiles within a radius of the caller, closest first
/// 2. Suggestions: verified, mutually compatible profiles plus optional filters
#[derive(Clone)]
pub struct DiscoveryEngine {
    store: Arc<dyn DatingStore>,
    defaults: DiscoveryDefaults,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<dyn DatingStore>, defaults: DiscoveryDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &DiscoveryDefaults {
        &self.defaults
    }

    /// Profiles within `radius_km` of the caller's stored location.
    ///
    /// No compatibility filtering happens in this mode. The caller is removed
    /// before the result is truncated to `limit`.
    pub async fn nearby(&self, caller: ProfileId, params: NearbyParams) -> AppResult<NearbyResult> {
        let radius_km = params
            .radius_km
            .filter(|r| *r > 0.0)
            .unwrap_or(self.defaults.radius_km);
        let limit = params
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .filter(|l| *l > 0)
            .unwrap_or(self.defaults.limit);

        let location = self
            .store
            .get_location(caller)
            .await?
            .ok_or_else(|| AppError::precondition("location not set"))?;
        let origin = Coordinates::from(&location);

        let criteria = [
            Criterion::Verified,
            Criterion::ExcludeProfile(caller),
            Criterion::LocatedWithin { origin, radius_km },
        ];
        let candidates = self.store.find_candidates(&criteria).await?;
        let total = candidates.len();

        let mut ranked: Vec<(Candidate, f64)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let distance_km = distance_between(origin, candidate.location.as_ref()?.into());
                Some((candidate, distance_km))
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(limit);

        let (candidates, distances): (Vec<Candidate>, Vec<f64>) = ranked.into_iter().unzip();
        let matches = enrich(self.store.as_ref(), candidates)
            .await?
            .into_iter()
            .zip(distances)
            .map(|(profile, distance_km)| NearbyMatch { profile, distance_km })
            .collect::<Vec<_>>();

        tracing::info!(
            "Nearby for {}: {} of {} candidates within {}km",
            caller,
            matches.len(),
            total,
            radius_km
        );

        Ok(NearbyResult { matches, radius_km, origin })
    }

    /// Mutually compatible suggestions for the caller, ages measured against `today`.
    ///
    /// Order is not part of the contract.
    pub async fn suggestions(
        &self,
        caller: ProfileId,
        params: &FilterParams,
        today: NaiveDate,
    ) -> AppResult<Vec<EnrichedProfile>> {
        let me = self
            .store
            .get_candidates(&[caller])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("profile not found"))?;

        let clauses = resolve_clauses(me.profile.gender, effective_orientation(&me.profile));
        if clauses.is_empty() {
            tracing::debug!("No compatibility clause resolved for {}", caller);
        }

        let mut criteria = vec![
            Criterion::Verified,
            Criterion::ExcludeProfile(caller),
            Criterion::Compatible(clauses),
        ];
        criteria.extend(build_filters(
            params,
            me.location.as_ref().map(Coordinates::from),
            today,
            self.defaults.age_bounds,
        ));

        let candidates = self.store.find_candidates(&criteria).await?;
        tracing::info!("Suggestions for {}: {} candidates", caller, candidates.len());

        enrich(self.store.as_ref(), candidates).await
    }

    /// [`DiscoveryEngine::suggestions`] relative to the current UTC date
    pub async fn suggestions_now(&self, caller: ProfileId, params: &FilterParams) -> AppResult<Vec<EnrichedProfile>> {
        self.suggestions(caller, params, Utc::now().date_naive()).await
    }
}

/// Attach tag sets to candidates, keeping their order
pub async fn enrich(store: &dyn DatingStore, candidates: Vec<Candidate>) -> AppResult<Vec<EnrichedProfile>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<ProfileId> = candidates.iter().map(|c| c.profile.id).collect();
    let mut tags = store.tags_for(&ids).await?;

    Ok(candidates
        .into_iter()
        .map(|candidate| EnrichedProfile {
            tags: tags.remove(&candidate.profile.id).unwrap_or_default(),
            profile: candidate.profile,
            location: candidate.location,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, LocationUpdate, Orientation, Profile};
    use crate::services::{LocationStore, MemoryStore, TagStore};

    const PARIS: (f64, f64) = (48.8566, 2.3522);
    // ~111.19 km per degree of latitude
    const KM_PER_DEGREE: f64 = 111.194_93;

    fn profile(id: i32, gender: Gender, orientation: Orientation) -> Profile {
        Profile {
            id,
            username: format!("user{}", id),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            verified: true,
            gender: Some(gender),
            orientation: Some(orientation),
            birthday: None,
            bio: None,
            avatar_url: None,
            fame_rating: 0.0,
        }
    }

    async fn place(store: &MemoryStore, id: i32, km_north_of_paris: f64) {
        store
            .upsert_location(
                id,
                LocationUpdate {
                    latitude: PARIS.0 + km_north_of_paris / KM_PER_DEGREE,
                    longitude: PARIS.1,
                    accuracy_m: None,
                },
            )
            .await
            .unwrap();
    }

    async fn place_at(store: &MemoryStore, id: i32, latitude: f64, longitude: f64) {
        store
            .upsert_location(id, LocationUpdate { latitude, longitude, accuracy_m: None })
            .await
            .unwrap();
    }

    async fn two_profiles_at(caller: (f64, f64), other: (f64, f64)) -> DiscoveryEngine {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, Gender::Woman, Orientation::LikesMen)).await;
        store.insert_profile(profile(2, Gender::Man, Orientation::LikesWomen)).await;
        place_at(&store, 1, caller.0, caller.1).await;
        place_at(&store, 2, other.0, other.1).await;
        DiscoveryEngine::new(store, DiscoveryDefaults::default())
    }

    async fn nearby_fixture() -> (Arc<MemoryStore>, DiscoveryEngine) {
        let store = Arc::new(MemoryStore::new());
        for id in 1..=4 {
            store.insert_profile(profile(id, Gender::Man, Orientation::LikesWomen)).await;
        }
        place(&store, 1, 0.0).await;
        place(&store, 2, 10.0).await;
        place(&store, 3, 40.0).await;
        place(&store, 4, 60.0).await;
        let engine = DiscoveryEngine::new(store.clone(), DiscoveryDefaults::default());
        (store, engine)
    }

    #[tokio::test]
    async fn test_nearby_two_closest_within_radius() {
        let (_store, engine) = nearby_fixture().await;
        let params = NearbyParams { radius_km: Some(50.0), limit: Some(2) };

        let result = engine.nearby(1, params).await.unwrap();
        let ids: Vec<i32> = result.matches.iter().map(|m| m.profile.profile.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!((result.matches[0].distance_km - 10.0).abs() < 0.1);
        assert!((result.matches[1].distance_km - 40.0).abs() < 0.1);
        assert_eq!(result.radius_km, 50.0);
    }

    #[tokio::test]
    async fn test_nearby_non_positive_overrides_fall_back() {
        let (_store, engine) = nearby_fixture().await;
        let params = NearbyParams { radius_km: Some(-5.0), limit: Some(0) };

        let result = engine.nearby(1, params).await.unwrap();
        assert_eq!(result.radius_km, 200.0);
        assert_eq!(result.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_nearby_requires_location() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, Gender::Woman, Orientation::LikesMen)).await;
        let engine = DiscoveryEngine::new(store, DiscoveryDefaults::default());

        let err = engine.nearby(1, NearbyParams::default()).await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(ref m) if m == "location not set"));
    }

    #[tokio::test]
    async fn test_nearby_skips_unverified_and_ignores_orientation() {
        let (store, engine) = nearby_fixture().await;
        let mut hidden = profile(5, Gender::Woman, Orientation::LikesWomen);
        hidden.verified = false;
        store.insert_profile(hidden).await;
        place(&store, 5, 1.0).await;
        store.insert_profile(profile(6, Gender::Man, Orientation::LikesMen)).await;
        place(&store, 6, 2.0).await;

        let result = engine.nearby(1, NearbyParams { radius_km: Some(5.0), limit: None }).await.unwrap();
        let ids: Vec<i32> = result.matches.iter().map(|m| m.profile.profile.id).collect();
        assert_eq!(ids, vec![6]);
    }

    #[tokio::test]
    async fn test_nearby_across_the_pole() {
        let engine = two_profiles_at((85.0, 0.0), (89.8, 180.0)).await;
        let result = engine.nearby(1, NearbyParams { radius_km: Some(600.0), limit: None }).await.unwrap();

        assert_eq!(result.matches.len(), 1);
        assert!((result.matches[0].distance_km - 578.2).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_nearby_across_the_antimeridian() {
        let engine = two_profiles_at((0.0, 179.9), (0.0, -179.9)).await;
        let result = engine.nearby(1, NearbyParams { radius_km: Some(50.0), limit: None }).await.unwrap();

        assert_eq!(result.matches.len(), 1);
        assert!((result.matches[0].distance_km - 22.2).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_nearby_large_radius_east_edge() {
        let engine = two_profiles_at(PARIS, (48.91, 16.0452)).await;
        let result = engine.nearby(1, NearbyParams { radius_km: Some(1000.0), limit: None }).await.unwrap();

        assert_eq!(result.matches.len(), 1);
        assert!(result.matches[0].distance_km > 999.0 && result.matches[0].distance_km <= 1000.0);
    }

    #[tokio::test]
    async fn test_suggestions_apply_mutual_compatibility() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, Gender::Woman, Orientation::LikesMen)).await;
        store.insert_profile(profile(2, Gender::Man, Orientation::LikesWomen)).await;
        store.insert_profile(profile(3, Gender::Man, Orientation::LikesMen)).await;
        store.insert_profile(profile(4, Gender::Man, Orientation::LikesBoth)).await;
        store.insert_profile(profile(5, Gender::Woman, Orientation::LikesMen)).await;
        store.add_tag(2, "climbing").await.unwrap();

        let engine = DiscoveryEngine::new(store, DiscoveryDefaults::default());
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut found = engine.suggestions(1, &FilterParams::default(), today).await.unwrap();
        found.sort_by_key(|p| p.profile.id);

        let ids: Vec<i32> = found.iter().map(|p| p.profile.id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(found[0].tags, vec!["climbing"]);
        assert!(found[1].tags.is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_unknown_caller() {
        let engine = DiscoveryEngine::new(Arc::new(MemoryStore::new()), DiscoveryDefaults::default());
        let err = engine.suggestions_now(9, &FilterParams::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_nearby_params_parse() {
        let params = NearbyParams::parse(Some("12.5"), Some("-1")).unwrap();
        assert_eq!(params.radius_km, Some(12.5));
        assert_eq!(params.limit, Some(-1));
        assert!(NearbyParams::parse(Some("far"), None).is_err());
        assert!(NearbyParams::parse(None, Some("2.5")).is_err());
    }
}
