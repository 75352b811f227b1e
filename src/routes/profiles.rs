use actix_web::{web, HttpResponse};

use super::{parse_profile_id, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    LocationResponse, ProfileListResponse, TagQuery, TagsResponse, UpdateLocationRequest, UpdateProfileRequest,
    UpdateTagsRequest,
};

/// Configure profile, location and tag routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/me", web::get().to(current_profile))
        .route("/me", web::put().to(update_profile))
        .route("/users", web::get().to(list_profiles))
        .route("/users/{id}", web::get().to(get_profile))
        .route("/location", web::post().to(update_location))
        .route("/location/{id}", web::get().to(get_location))
        .route("/tags", web::get().to(list_tags))
        .route("/tags", web::post().to(add_tag))
        .route("/tags", web::delete().to(remove_tag))
        .route("/tags", web::put().to(replace_tags));
}

async fn current_profile(user: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let profile = state.directory.current_profile(user.id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

async fn update_profile(
    user: AuthUser,
    state: web::Data<AppState>,
    req: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let profile = state.directory.update_profile(user.id, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// All verified profiles with their tags and location
///
/// GET /api/v1/users
async fn list_profiles(_user: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let users = state.directory.list_profiles().await?;
    Ok(HttpResponse::Ok().json(ProfileListResponse { count: users.len(), users }))
}

async fn get_profile(_user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let id = parse_profile_id(&path)?;
    let profile = state.directory.get_profile(id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Store the caller's location
///
/// POST /api/v1/location
///
/// Request body:
/// ```json
/// { "latitude": 48.85, "longitude": 2.35, "accuracy": 15.0 }
/// ```
async fn update_location(
    user: AuthUser,
    state: web::Data<AppState>,
    req: web::Json<UpdateLocationRequest>,
) -> AppResult<HttpResponse> {
    let location = state.directory.update_location(user.id, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LocationResponse { profile_id: user.id, location }))
}

async fn get_location(_user: AuthUser, state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let id = parse_profile_id(&path)?;
    let location = state.directory.get_location(id).await?;
    Ok(HttpResponse::Ok().json(LocationResponse { profile_id: id, location }))
}

async fn list_tags(user: AuthUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let tags = state.directory.list_tags(user.id).await?;
    Ok(HttpResponse::Ok().json(TagsResponse { tags }))
}

fn required_tag(query: &TagQuery) -> AppResult<&str> {
    query
        .tag
        .as_deref()
        .ok_or_else(|| AppError::bad_input("tag query parameter is required"))
}

async fn add_tag(user: AuthUser, state: web::Data<AppState>, query: web::Query<TagQuery>) -> AppResult<HttpResponse> {
    let tags = state.directory.add_tag(user.id, required_tag(&query)?).await?;
    Ok(HttpResponse::Ok().json(TagsResponse { tags }))
}

async fn remove_tag(user: AuthUser, state: web::Data<AppState>, query: web::Query<TagQuery>) -> AppResult<HttpResponse> {
    let tags = state.directory.remove_tag(user.id, required_tag(&query)?).await?;
    Ok(HttpResponse::Ok().json(TagsResponse { tags }))
}

async fn replace_tags(
    user: AuthUser,
    state: web::Data<AppState>,
    req: web::Json<UpdateTagsRequest>,
) -> AppResult<HttpResponse> {
    let tags = state.directory.replace_tags(user.id, &req.tags).await?;
    Ok(HttpResponse::Ok().json(TagsResponse { tags }))
}
