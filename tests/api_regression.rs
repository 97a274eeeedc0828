//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the operator surface with `tower::ServiceExt::oneshot()`. No binary
//! spawn, no network port.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use rackops::api::{create_app, ApiState};
use rackops::config::SimConfig;
use rackops::Simulator;

fn test_state() -> ApiState {
    // Deterministic and quiet: no random failures disturb the assertions
    let mut cfg = SimConfig::default();
    cfg.workload.mean_job_arrival_interval_s = 1e18;
    let mut sim = Simulator::new(cfg);
    sim.failures.random_rate = 0.0;
    ApiState::with_simulator(sim)
}

async fn get(state: &ApiState, uri: &str) -> (StatusCode, Value) {
    let resp = create_app(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn post(state: &ApiState, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(v) => Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let resp = create_app(state.clone()).oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_all_read_endpoints_return_200() {
    let state = test_state();
    post(&state, "/sim/tick?n=2", None).await;

    let endpoints = [
        "/status",
        "/thermal",
        "/thermal/0",
        "/power",
        "/power/0",
        "/gpu",
        "/gpu/rack-0-srv-0",
        "/network",
        "/network/0",
        "/storage",
        "/storage/0",
        "/cooling",
        "/carbon",
        "/workload/queue",
        "/workload/running",
        "/workload/completed?last_n=10",
        "/workload/sla_violations",
        "/failures/active",
        "/telemetry/history?last_n=5",
        "/audit?last_n=5",
        "/sim/config",
        "/sim/status",
        "/sim/scenarios",
        "/eval/agents",
    ];
    for endpoint in endpoints {
        let (status, _) = get(&state, endpoint).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint}");
    }
}

#[tokio::test]
async fn test_unknown_subsystem_ids_404() {
    let state = test_state();
    post(&state, "/sim/tick", None).await;

    for endpoint in [
        "/thermal/99",
        "/power/99",
        "/gpu/rack-9-srv-9",
        "/network/99",
        "/storage/99",
    ] {
        let (status, body) = get(&state, endpoint).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {endpoint}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_tick_advances_clock() {
    let state = test_state();
    let (status, body) = post(&state, "/sim/tick?n=3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clock"]["tick"], 3);
    assert_eq!(body["clock"]["time_s"], 180.0);

    let (_, status_body) = get(&state, "/sim/status").await;
    assert_eq!(status_body["tick"], 3);
    assert_eq!(status_body["running"], false);
}

#[tokio::test]
async fn test_submit_and_migrate_workflow() {
    let state = test_state();

    let (status, body) = post(
        &state,
        "/workload/submit",
        Some(json!({
            "name": "api-test",
            "job_type": "batch",
            "gpus_required": 4,
            "priority": 3,
            "duration_s": 7200.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    post(&state, "/sim/tick", None).await;

    let (_, running) = get(&state, "/workload/running").await;
    assert_eq!(running.as_array().unwrap().len(), 1);
    assert!(running[0]["assigned_servers"][0]
        .as_str()
        .unwrap()
        .starts_with("rack-0-"));

    let (status, body) = post(
        &state,
        "/actions/migrate_workload",
        Some(json!({"job_id": job_id, "target_rack": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "ok");

    post(&state, "/sim/tick", None).await;
    let (_, running) = get(&state, "/workload/running").await;
    for server in running[0]["assigned_servers"].as_array().unwrap() {
        assert!(server.as_str().unwrap().starts_with("rack-5-"));
    }

    let (_, audit) = get(&state, "/audit?last_n=10").await;
    let entries = audit.as_array().unwrap();
    assert!(entries
        .iter()
        .any(|e| e["action"] == "migrate_workload" && e["result"] == "ok"));
}

#[tokio::test]
async fn test_migrate_unknown_job_404_and_audited() {
    let state = test_state();
    let (status, body) = post(
        &state,
        "/actions/migrate_workload",
        Some(json!({"job_id": "does-not-exist", "target_rack": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (_, audit) = get(&state, "/audit?last_n=5").await;
    let entry = &audit.as_array().unwrap()[0];
    assert_eq!(entry["action"], "migrate_workload");
    assert_eq!(entry["result"], "NOT_FOUND");
}

#[tokio::test]
async fn test_inject_failure_and_duplicate_conflict() {
    let state = test_state();

    let (status, body) = post(
        &state,
        "/sim/inject_failure",
        Some(json!({"type": "pdu_spike", "target": "rack-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let failure_id = body["failure_id"].as_str().unwrap().to_string();

    // Same type + target again: domain conflict
    let (status, body) = post(
        &state,
        "/sim/inject_failure",
        Some(json!({"type": "pdu_spike", "target": "rack-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, active) = get(&state, "/failures/active").await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    let (status, _) = post(
        &state,
        "/actions/resolve_failure",
        Some(json!({"failure_id": failure_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, active) = get(&state, "/failures/active").await;
    assert!(active.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_arguments_400() {
    let state = test_state();

    // Cap outside [0, 100]
    let (status, _) = post(
        &state,
        "/actions/throttle_gpu",
        Some(json!({"server_id": "rack-0-srv-0", "power_cap_pct": 150.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed target string
    let (status, _) = post(
        &state,
        "/sim/inject_failure",
        Some(json!({"type": "pdu_spike", "target": "not-a-target"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Syntactically malformed body
    let request = Request::builder()
        .method("POST")
        .uri("/actions/preempt_job")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = create_app(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_adjust_cooling_validation() {
    let state = test_state();

    let (status, _) = post(
        &state,
        "/actions/adjust_cooling",
        Some(json!({"rack_id": 0, "setpoint_c": 16.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &state,
        "/actions/adjust_cooling",
        Some(json!({"rack_id": 99, "setpoint_c": 16.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &state,
        "/actions/adjust_cooling",
        Some(json!({"rack_id": 0, "setpoint_c": 99.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The setpoint lands in the cooling telemetry on the next tick
    post(&state, "/sim/tick", None).await;
    let (_, cooling) = get(&state, "/cooling").await;
    assert_eq!(cooling["units"][0]["setpoint_c"], 16.0);
}

#[tokio::test]
async fn test_reset_restores_initial_state() {
    let state = test_state();
    post(&state, "/sim/tick?n=10", None).await;

    let (status, body) = post(&state, "/sim/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tick"], 0);
    assert_eq!(body["time_s"], 0.0);

    let (_, status_body) = get(&state, "/sim/status").await;
    assert_eq!(status_body["telemetry_buffered"], 0);
}

#[tokio::test]
async fn test_eval_run_agent() {
    let state = test_state();

    let (status, report) = post(
        &state,
        "/eval/run-agent",
        Some(json!({"agent_name": "noop", "scenario_id": "thermal_crisis"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["scenario_id"], "thermal_crisis");
    assert_eq!(report["agent_name"], "noop");
    let composite = report["scores"]["composite"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&composite));
    for dim in [
        "sla",
        "energy",
        "carbon",
        "thermal",
        "cost",
        "infra_health",
        "failure_response",
    ] {
        assert!(report["scores"][dim].is_f64(), "missing score {dim}");
    }

    let (status, _) = post(
        &state,
        "/eval/run-agent",
        Some(json!({"agent_name": "nonexistent", "scenario_id": "thermal_crisis"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &state,
        "/eval/run-agent",
        Some(json!({"agent_name": "noop", "scenario_id": "nonexistent"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preempt_conflict_on_queued_job() {
    let state = test_state();

    let (_, body) = post(
        &state,
        "/workload/submit",
        Some(json!({
            "job_type": "training",
            "gpus_required": 8,
            "duration_s": 3600.0,
        })),
    )
    .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // Not ticked yet: job is queued, preemption is a state conflict
    let (status, body) = post(
        &state,
        "/actions/preempt_job",
        Some(json!({"job_id": job_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}
