pub mod commissions;
pub mod health;
pub mod opportunities;

use crate::config::Config;
use crate::db::Repository;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/opportunities",
            get(opportunities::list_opportunities).post(opportunities::create_opportunity),
        )
        .route("/v1/opportunities/:id", get(opportunities::get_opportunity))
        .route(
            "/v1/opportunities/:id/stage",
            post(opportunities::change_stage),
        )
        .route(
            "/v1/opportunities/:id/history",
            get(opportunities::get_stage_history),
        )
        .route("/v1/pipeline/summary", get(opportunities::pipeline_summary))
        .route(
            "/v1/commissions/calculate",
            post(commissions::calculate_commission),
        )
        .route("/v1/commissions/split", post(commissions::split_commission))
        .layer(cors)
        .with_state(state)
}
