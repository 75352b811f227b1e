use actix_web::{web, HttpResponse};

use super::{AppState, AuthUser};
use crate::core::{FilterParams, NearbyParams};
use crate::error::AppResult;
use crate::models::{NearbyQuery, NearbyResponse, SuggestionsQuery, SuggestionsResponse};

/// Configure discovery routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/suggestions", web::get().to(suggestions))
        .route("/nearby", web::get().to(nearby));
}

/// Compatibility-filtered suggestions
///
/// GET /api/v1/suggestions?minAge=&maxAge=&minFame=&maxDistance=
async fn suggestions(
    user: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SuggestionsQuery>,
) -> AppResult<HttpResponse> {
    let params = FilterParams::parse(
        query.min_age.as_deref(),
        query.max_age.as_deref(),
        query.min_fame.as_deref(),
        query.max_distance.as_deref(),
    )?;

    let users = state.engine.suggestions_now(user.id, &params).await?;

    Ok(HttpResponse::Ok().json(SuggestionsResponse {
        count: users.len(),
        users,
    }))
}

/// Nearby profiles, closest first
///
/// GET /api/v1/nearby?radius=&limit=
async fn nearby(
    user: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<NearbyQuery>,
) -> AppResult<HttpResponse> {
    let params = NearbyParams::parse(query.radius.as_deref(), query.limit.as_deref())?;
    let result = state.engine.nearby(user.id, params).await?;

    Ok(HttpResponse::Ok().json(NearbyResponse {
        count: result.matches.len(),
        nearby_users: result.matches,
        radius_km: result.radius_km,
        your_location: result.origin,
    }))
}
