pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;

use axum::{
    Json, Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use serde_json::{Value, json};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, redis::RedisClient, services::vote_engine::VoteEngine};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Option<Arc<RedisClient>>,
    pub config: Arc<Config>,
    pub engine: Arc<VoteEngine>,
}

pub fn create_app(state: AppState) -> Router {
    let origins = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let forum_routes = Router::new()
        .route(
            "/api/forum",
            get(handlers::forum::list_posts).post(handlers::forum::create_post),
        )
        .route("/api/forum/{post_id}", get(handlers::forum::get_post))
        .route("/api/forum/{post_id}/vote", post(handlers::forum::vote_post))
        .route(
            "/api/forum/{post_id}/upvote",
            post(handlers::forum::upvote_post),
        )
        .route(
            "/api/forum/{post_id}/downvote",
            post(handlers::forum::downvote_post),
        )
        .route(
            "/api/forum/{post_id}/audit",
            get(handlers::forum::audit_post),
        );

    Router::new()
        .route("/health", get(health))
        .merge(forum_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
