use actix_web::{web, HttpResponse};

use super::{parse_profile_id, AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{LikeResponse, LikeStatusResponse, ProfileListResponse, StatsResponse, ViewResponse};

/// Configure view/like routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/profiles/{id}/view", web::post().to(record_view))
        .route("/profiles/{id}/like", web::post().to(toggle_like))
        .route("/profiles/{id}/like", web::get().to(like_status))
        .route("/profiles/{id}/stats", web::get().to(stats))
        .route("/profiles/{id}/viewers", web::get().to(viewers))
        .route("/profiles/{id}/likers", web::get().to(likers));
}

async fn record_view(user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let target = parse_profile_id(&path)?;
    state.signals.record_view(user.id, target).await?;

    Ok(HttpResponse::Ok().json(ViewResponse {
        success: true,
        message: "View recorded".to_string(),
    }))
}

async fn toggle_like(user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let target = parse_profile_id(&path)?;
    let liked = state.signals.toggle_like(user.id, target).await?;

    let message = if liked { "Profile liked" } else { "Profile unliked" };
    Ok(HttpResponse::Ok().json(LikeResponse {
        liked,
        message: message.to_string(),
    }))
}

async fn like_status(user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let target = parse_profile_id(&path)?;
    let liked = state.signals.like_status(user.id, target).await?;

    Ok(HttpResponse::Ok().json(LikeStatusResponse { liked }))
}

async fn stats(_user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let profile_id = parse_profile_id(&path)?;
    let stats = state.signals.stats(profile_id).await;

    Ok(HttpResponse::Ok().json(StatsResponse {
        profile_id,
        views: stats.views,
        likes: stats.likes,
        fame_rating: stats.fame_rating,
    }))
}

async fn viewers(_user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let profile_id = parse_profile_id(&path)?;
    let users = state.signals.viewers(profile_id).await?;

    Ok(HttpResponse::Ok().json(ProfileListResponse { count: users.len(), users }))
}

async fn likers(_user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let profile_id = parse_profile_id(&path)?;
    let users = state.signals.likers(profile_id).await?;

    Ok(HttpResponse::Ok().json(ProfileListResponse { count: users.len(), users }))
}
