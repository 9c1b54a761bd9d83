use std::sync::{Arc, Mutex};

use super::*;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{AssignmentId, SessionContextId, SubjectType, TargetType};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
    csrf: Arc<Mutex<Vec<Option<String>>>>,
}

impl Captured {
    fn record(&self, headers: &HeaderMap, body: Value) {
        self.bodies.lock().expect("lock").push(body);
        self.csrf.lock().expect("lock").push(
            headers
                .get("x-csrf-token")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        );
    }

    fn last_body(&self) -> Value {
        self.bodies
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .expect("a request body")
    }
}

async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn client_for(base_url: &str) -> HttpSimulationClient {
    let config = ClientConfig::new(base_url)
        .expect("base url")
        .with_csrf(DEFAULT_CSRF_HEADER, "token-123");
    HttpSimulationClient::new(config)
}

fn session() -> SessionContext {
    SessionContext {
        id: SessionContextId::from("ctx-9"),
        subject: SubjectRef::new(5, SubjectType::User),
    }
}

fn group_diff() -> DiffPayload {
    DiffPayload {
        added: vec![TargetRef {
            target_id: AssignmentId::from("G3"),
            target_type: TargetType::Group,
        }],
        removed: vec![TargetRef {
            target_id: AssignmentId::from("G1"),
            target_type: TargetType::Group,
        }],
    }
}

#[tokio::test]
async fn start_session_posts_subject_with_csrf_header() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/api/access/sessions/start",
            post(
                |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    captured.record(&headers, body);
                    Json(json!({ "sessionContextId": "ctx-1" }))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    let subject = SubjectRef::new(5, SubjectType::User);
    let context = client_for(&base)
        .start_session(&subject)
        .await
        .expect("session");

    assert_eq!(context.id, SessionContextId::from("ctx-1"));
    assert_eq!(context.subject, subject);
    assert_eq!(
        captured.last_body(),
        json!({ "subjectId": 5, "subjectType": "USER" })
    );
    assert_eq!(
        captured.csrf.lock().expect("lock").as_slice(),
        &[Some("token-123".to_string())]
    );
}

#[tokio::test]
async fn simulate_sends_diff_and_validates_report() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/api/access/sessions/simulate",
            post(
                |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    captured.record(&headers, body);
                    Json(json!({
                        "summary": "1 gained, 1 lost",
                        "impactDetails": [
                            { "impactType": "PERMISSION_GAINED", "permissionName": "reports:read" },
                            { "impactType": "PERMISSION_LOST", "permissionDescription": "Manage billing", "reason": "via G1" }
                        ]
                    }))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    let report = client_for(&base)
        .simulate(&session(), &group_diff())
        .await
        .expect("report");

    assert_eq!(report.summary, "1 gained, 1 lost");
    assert_eq!(report.gained().count(), 1);
    let lost: Vec<_> = report.lost().collect();
    assert_eq!(lost[0].label, "Manage billing");
    assert_eq!(lost[0].reason.as_deref(), Some("via G1"));
    assert_eq!(
        captured.last_body(),
        json!({
            "sessionContextId": "ctx-9",
            "added": [{ "targetId": "G3", "targetType": "GROUP" }],
            "removed": [{ "targetId": "G1", "targetType": "GROUP" }]
        })
    );
}

#[tokio::test]
async fn rejection_message_is_surfaced_verbatim() {
    let router = Router::new().route(
        "/api/access/sessions/commit",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "서버 오류 (500)" })),
            )
        }),
    );
    let base = spawn_server(router).await;

    let err = client_for(&base)
        .commit(&session(), &group_diff(), &CommitMetadata::default())
        .await
        .expect_err("commit should fail");

    assert_eq!(
        err.failure(),
        &RemoteFailure::Rejected {
            status: 500,
            message: "서버 오류 (500)".to_string()
        }
    );
    assert_eq!(err.user_message(), "서버 오류 (500)");
}

#[tokio::test]
async fn rejection_without_json_body_falls_back_to_status() {
    let router = Router::new().route(
        "/api/access/sessions/start",
        post(|| async { (StatusCode::NOT_FOUND, "nope").into_response() }),
    );
    let base = spawn_server(router).await;

    let err = client_for(&base)
        .start_session(&SubjectRef::new(1, SubjectType::Group))
        .await
        .expect_err("start should fail");

    assert_eq!(
        err.failure(),
        &RemoteFailure::Rejected {
            status: 404,
            message: "404 Not Found".to_string()
        }
    );
}

#[tokio::test]
async fn commit_with_no_content_is_success_without_id() {
    let router = Router::new().route(
        "/api/access/sessions/commit",
        post(|| async { StatusCode::NO_CONTENT }),
    );
    let base = spawn_server(router).await;

    let result = client_for(&base)
        .commit(&session(), &group_diff(), &CommitMetadata::default())
        .await
        .expect("commit");

    assert_eq!(result, CommitResult { id: None });
}

#[tokio::test]
async fn commit_returns_server_id_and_metadata() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/api/access/sessions/commit",
            post(
                |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    captured.record(&headers, body);
                    Json(json!({ "id": 77 }))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    let metadata = CommitMetadata {
        name: Some("billing-admins".into()),
        description: Some("quarterly cleanup".into()),
    };
    let result = client_for(&base)
        .commit(&session(), &group_diff(), &metadata)
        .await
        .expect("commit");

    assert_eq!(result.id.map(|id| id.to_string()).as_deref(), Some("77"));
    let body = captured.last_body();
    assert_eq!(body["name"], json!("billing-admins"));
    assert_eq!(body["description"], json!("quarterly cleanup"));
}

#[tokio::test]
async fn empty_simulation_body_is_not_treated_as_no_impact() {
    let router = Router::new().route(
        "/api/access/sessions/simulate",
        post(|| async { StatusCode::NO_CONTENT }),
    );
    let base = spawn_server(router).await;

    let err = client_for(&base)
        .simulate(&session(), &group_diff())
        .await
        .expect_err("empty simulation must fail");

    assert!(matches!(err.failure(), RemoteFailure::Malformed(_)));
}

#[tokio::test]
async fn impact_detail_without_label_is_malformed() {
    let router = Router::new().route(
        "/api/access/sessions/simulate",
        post(|| async {
            Json(json!({
                "summary": "?",
                "impactDetails": [{ "impactType": "PERMISSION_LOST" }]
            }))
        }),
    );
    let base = spawn_server(router).await;

    let err = client_for(&base)
        .simulate(&session(), &group_diff())
        .await
        .expect_err("missing label must fail");

    assert!(matches!(err.failure(), RemoteFailure::Malformed(_)));
}

#[tokio::test]
async fn save_step_posts_selection() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/api/access/sessions/steps",
            post(
                |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    captured.record(&headers, body);
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    client_for(&base)
        .save_step(&session(), "subjects", &group_diff().added)
        .await
        .expect("save step");

    assert_eq!(
        captured.last_body(),
        json!({
            "sessionContextId": "ctx-9",
            "step": "subjects",
            "selected": [{ "targetId": "G3", "targetType": "GROUP" }]
        })
    );
}

#[tokio::test]
async fn fetch_snapshot_reads_subject_assignments() {
    let router = Router::new().route(
        "/api/access/subjects/:kind/:id/assignments",
        get(|Path((kind, id)): Path<(String, String)>| async move {
            assert_eq!(kind, "user");
            assert_eq!(id, "5");
            Json(json!({
                "assignments": [{ "targetId": "G1", "targetType": "GROUP", "label": "Ops" }],
                "candidates": [{ "targetId": "G2", "targetType": "GROUP", "label": "Billing" }],
                "effectivePermissions": [{ "permissionName": "ops:deploy", "grantedVia": "Ops" }]
            }))
        }),
    );
    let base = spawn_server(router).await;

    let snapshot = client_for(&base)
        .fetch_snapshot(&SubjectRef::new(5, SubjectType::User))
        .await
        .expect("snapshot");

    assert_eq!(snapshot.assignments.len(), 1);
    assert_eq!(snapshot.candidates[0].label, "Billing");
    assert_eq!(snapshot.effective_permissions[0].permission_name, "ops:deploy");
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client_for(&format!("http://{addr}"))
        .start_session(&SubjectRef::new(1, SubjectType::User))
        .await
        .expect_err("nothing listens");

    assert!(matches!(err.failure(), RemoteFailure::Network(_)));
}

#[test]
fn endpoint_root_joins_prefix_without_double_slashes() {
    let config = ClientConfig::new("http://localhost:8080/")
        .expect("url")
        .with_api_prefix("/admin/api/");
    assert_eq!(config.endpoint_root(), "http://localhost:8080/admin/api");

    let bare = ClientConfig::new("http://localhost:8080")
        .expect("url")
        .with_api_prefix("");
    assert_eq!(bare.endpoint_root(), "http://localhost:8080");
}
