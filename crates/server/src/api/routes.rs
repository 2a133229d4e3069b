use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{events, handlers, middleware::auth_middleware, middleware::metrics_middleware, tasks};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything except health and metrics requires a validated identity.
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Tasks
        .route("/tasks", post(tasks::create_task))
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/data", get(tasks::get_all_task_data))
        .route("/tasks/{id}/data/{data_type}", get(tasks::get_task_data))
        .route(
            "/tasks/{id}/download/{data_type}",
            get(tasks::download_artifact),
        )
        .route("/tasks/{id}/structure", get(tasks::get_file_structure))
        // Streaming gateway
        .route("/tasks/{id}/events", get(events::stream_events))
        .route("/tasks/{id}/events/history", get(events::get_event_history))
        // Worker feedback path (same orchestrator entry points as any caller)
        .route("/tasks/{id}/progress", post(tasks::report_progress))
        .route("/tasks/{id}/status", post(tasks::report_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::get_metrics));

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
