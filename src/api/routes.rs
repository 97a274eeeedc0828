//! API route definitions
//!
//! Read endpoints serve snapshot sections; /sim/* controls the run loop;
//! /actions/* applies operator interventions; /eval/* drives the harness.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/thermal", get(handlers::get_thermal))
        .route("/thermal/:rack_id", get(handlers::get_thermal_rack))
        .route("/power", get(handlers::get_power))
        .route("/power/:rack_id", get(handlers::get_power_rack))
        .route("/gpu", get(handlers::get_gpu))
        .route("/gpu/:server_id", get(handlers::get_gpu_server))
        .route("/network", get(handlers::get_network))
        .route("/network/:rack_id", get(handlers::get_network_rack))
        .route("/storage", get(handlers::get_storage))
        .route("/storage/:rack_id", get(handlers::get_storage_rack))
        .route("/cooling", get(handlers::get_cooling))
        .route("/carbon", get(handlers::get_carbon))
        // Workload
        .route("/workload/queue", get(handlers::get_workload_queue))
        .route("/workload/running", get(handlers::get_workload_running))
        .route("/workload/completed", get(handlers::get_workload_completed))
        .route(
            "/workload/sla_violations",
            get(handlers::get_sla_violations),
        )
        .route("/workload/submit", post(handlers::submit_job))
        // Failures
        .route("/failures/active", get(handlers::get_active_failures))
        // Telemetry & audit
        .route("/telemetry/history", get(handlers::get_telemetry_history))
        .route("/audit", get(handlers::get_audit))
        // Simulation control
        .route("/sim/config", get(handlers::get_sim_config))
        .route("/sim/status", get(handlers::get_sim_status))
        .route("/sim/scenarios", get(handlers::get_scenarios))
        .route("/sim/tick", post(handlers::post_tick))
        .route("/sim/run", post(handlers::post_run))
        .route("/sim/pause", post(handlers::post_pause))
        .route("/sim/reset", post(handlers::post_reset))
        .route("/sim/inject_failure", post(handlers::post_inject_failure))
        // Operator actions
        .route(
            "/actions/migrate_workload",
            post(handlers::action_migrate_workload),
        )
        .route("/actions/adjust_cooling", post(handlers::action_adjust_cooling))
        .route("/actions/throttle_gpu", post(handlers::action_throttle_gpu))
        .route("/actions/preempt_job", post(handlers::action_preempt_job))
        .route(
            "/actions/resolve_failure",
            post(handlers::action_resolve_failure),
        )
        // Evaluation harness
        .route("/eval/agents", get(handlers::get_agents))
        .route("/eval/run-agent", post(handlers::post_run_agent))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_app;
    use crate::config::SimConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_route_responds() {
        let app = create_app(ApiState::new(SimConfig::default()));
        let resp = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_404s() {
        let app = create_app(ApiState::new(SimConfig::default()));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/definitely-not-a-route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
