//! Integration tests for the gcm-server HTTP API
//!
//! Each test runs against a fresh SQLite file in a temp directory.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::util::ServiceExt;
use uuid::Uuid;

use async_trait::async_trait;
use gcm_common::assistant::{Assistant, StatementDraft};
use gcm_common::clustering::{ClusterDraft, ClusterInput, ClusterSettings};
use gcm_common::config::TomlConfig;
use gcm_common::db::init_database;
use gcm_common::export::ProjectExport;
use gcm_common::GcmEvent;
use gcm_server::services::in_flight::AiOperation;
use gcm_server::{build_router, AppState};

/// Assistant whose upstream is always unreachable
struct UnreachableAssistant;

#[async_trait]
impl Assistant for UnreachableAssistant {
    async fn generate_statements(&self, _: &str, _: Option<&str>, _: u32) -> gcm_common::Result<Vec<StatementDraft>> {
        Err(gcm_common::Error::Connection("assistant unreachable".to_string()))
    }

    async fn generate_clusters(&self, _: &[ClusterInput], _: &ClusterSettings) -> gcm_common::Result<Vec<ClusterDraft>> {
        Err(gcm_common::Error::Connection("assistant unreachable".to_string()))
    }
}

/// Assistant that holds statement generation until released
#[derive(Default)]
struct GatedAssistant {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Assistant for GatedAssistant {
    async fn generate_statements(&self, _: &str, _: Option<&str>, count: u32) -> gcm_common::Result<Vec<StatementDraft>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok((0..count)
            .map(|i| StatementDraft {
                text: format!("Drafted idea {}", i + 1),
                confidence: 0.8,
            })
            .collect())
    }

    async fn generate_clusters(&self, _: &[ClusterInput], _: &ClusterSettings) -> gcm_common::Result<Vec<ClusterDraft>> {
        Ok(Vec::new())
    }
}

struct TestApp {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

async fn setup() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = init_database(&dir.path().join("gcm.db"))
        .await
        .expect("Failed to initialize database");
    let state = AppState::new(pool, &TomlConfig::default());
    TestApp {
        app: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    fn with_assistant(self, assistant: Arc<dyn Assistant>) -> Self {
        let state = self.state.with_assistant(assistant);
        TestApp {
            app: build_router(state.clone()),
            state,
            _dir: self._dir,
        }
    }

    async fn send(&self, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-gcm-user", user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), content_type)
    }

    async fn call(&self, method: &str, uri: &str, user: Uuid, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes, _) = self.send(method, uri, Some(user), body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Put `user` on `plan` with `credits` (-1 for unlimited)
    async fn set_account(&self, user: Uuid, plan: &str, credits: i64) {
        let (status, _) = self.call("GET", "/api/account", user, None).await;
        assert_eq!(status, StatusCode::OK);
        sqlx::query("UPDATE accounts SET plan = ?, credits = ? WHERE user_id = ?")
            .bind(plan)
            .bind(credits)
            .bind(user.to_string())
            .execute(&self.state.db)
            .await
            .unwrap();
    }

    async fn create_project(&self, owner: Uuid) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/projects",
                owner,
                Some(json!({
                    "title": "Retention Workshop",
                    "focus_question": "How can we improve customer retention?"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn add_statement(&self, project: &str, user: Uuid, text: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                &format!("/api/projects/{}/statements", project),
                user,
                Some(json!({ "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_cluster(&self, project: &str, owner: Uuid, name: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                &format!("/api/projects/{}/clusters", project),
                owner,
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn assign(&self, project: &str, owner: Uuid, statement: &str, cluster: Option<&str>) -> (StatusCode, Value) {
        self.call(
            "PUT",
            &format!("/api/projects/{}/clusters/assignments", project),
            owner,
            Some(json!({ "statement_id": statement, "cluster_id": cluster })),
        )
        .await
    }

    async fn advance(&self, project: &str, user: Uuid) -> (StatusCode, Value) {
        self.call("POST", &format!("/api/projects/{}/phase/advance", project), user, None)
            .await
    }

    async fn rate(&self, project: &str, user: Uuid, statement: &str, dimension: &str, value: i64) -> (StatusCode, Value) {
        self.call(
            "PUT",
            &format!("/api/projects/{}/ratings", project),
            user,
            Some(json!({ "statement_id": statement, "dimension": dimension, "value": value })),
        )
        .await
    }
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = setup().await;
    let (status, bytes, _) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "gcm-server");
}

#[tokio::test]
async fn api_requires_identity_header() {
    let app = setup().await;
    let (status, bytes, _) = app.send("GET", "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn customer_retention_workshop_end_to_end() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let participant = Uuid::new_v4();
    let project = app.create_project(owner).await;

    let s1 = app.add_statement(&project, owner, "Recognise team contributions monthly").await;
    let s2 = app.add_statement(&project, participant, "Run quarterly engagement surveys").await;
    let s3 = app.add_statement(&project, participant, "Offer loyalty discounts").await;
    let s4 = app.add_statement(&project, owner, "Publish a clear pricing page").await;

    let (status, body) = app.call("GET", &format!("/api/projects/{}", project), owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statement_count"], 4);
    assert_eq!(body["participant_count"], 2);

    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_phase"], "structuring");

    let engagement = app.create_cluster(&project, owner, "Engagement").await;
    let pricing = app.create_cluster(&project, owner, "Pricing").await;
    for s in [&s1, &s2] {
        assert_eq!(app.assign(&project, owner, s, Some(&engagement)).await.0, StatusCode::OK);
    }
    for s in [&s3, &s4] {
        assert_eq!(app.assign(&project, owner, s, Some(&pricing)).await.0, StatusCode::OK);
    }

    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_phase"], "rating");

    // Incomplete ratings block analysis
    assert_eq!(app.rate(&project, owner, &s1, "importance", 5).await.0, StatusCode::OK);
    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    for (s, value) in [(&s1, 5), (&s2, 4), (&s3, 2), (&s4, 1)] {
        assert_eq!(app.rate(&project, owner, s, "importance", value).await.0, StatusCode::OK);
        assert_eq!(app.rate(&project, owner, s, "feasibility", value).await.0, StatusCode::OK);
    }

    let (status, body) = app.call("GET", &format!("/api/projects/{}/progress", project), owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"]["rated"], 4);
    assert_eq!(body["readiness"]["can_advance"], true);

    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_phase"], "analysis");

    let (status, body) = app.call("GET", &format!("/api/projects/{}/analysis", project), owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matrix"]["quick_wins"][0]["name"], "Engagement");
    assert_eq!(body["matrix"]["questionable"][0]["name"], "Pricing");

    let (status, bytes, content_type) = app
        .send("GET", &format!("/api/projects/{}/export?format=json", project), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let export = ProjectExport::from_json(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert_eq!(export.statements.len(), 4);
    let exported_s3 = export
        .statements
        .iter()
        .find(|s| s.id.to_string() == s3)
        .unwrap();
    assert_eq!(exported_s3.text, "Offer loyalty discounts");
    assert_eq!(exported_s3.cluster.as_deref(), Some("Pricing"));
}

#[tokio::test]
async fn ai_statements_charge_the_requester() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/projects/{}/statements/generate", project),
            owner,
            Some(json!({ "count": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["statements"].as_array().unwrap().len(), 10);
    assert_eq!(body["credits_charged"], 3);
    assert_eq!(body["credits_remaining"], 7);

    let (_, account) = app.call("GET", "/api/account", owner, None).await;
    assert_eq!(account["credits"], 7);
    assert_eq!(account["plan"], "starter");

    sqlx::query("UPDATE accounts SET credits = 0 WHERE user_id = ?")
        .bind(owner.to_string())
        .execute(&app.state.db)
        .await
        .unwrap();

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/projects/{}/statements/generate", project),
            owner,
            Some(json!({ "count": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_CREDITS");
    assert_eq!(body["error"]["required"], 1);
    assert_eq!(body["error"]["available"], 0);

    let (_, statements) = app
        .call("GET", &format!("/api/projects/{}/statements", project), owner, None)
        .await;
    assert_eq!(statements.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn generation_count_is_bounded() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;

    for count in [0, 51] {
        let (status, body) = app
            .call(
                "POST",
                &format!("/api/projects/{}/statements/generate", project),
                owner,
                Some(json!({ "count": count })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "count");
    }
}

#[tokio::test]
async fn top_up_adds_package_credits() {
    let app = setup().await;
    let user = Uuid::new_v4();

    let (status, body) = app
        .call("POST", "/api/account/top-up", user, Some(json!({ "package": "small" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credits"], 35);
    assert_eq!(body["features"]["export"], true);

    let (_, packages) = app.call("GET", "/api/credit-packages", user, None).await;
    assert_eq!(packages.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn only_the_owner_manages_the_project() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let project = app.create_project(owner).await;

    // Participants contribute but do not steer
    app.add_statement(&project, other, "Call customers after their first month").await;

    let (status, body) = app.advance(&project, other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    let (status, _) = app
        .call("PATCH", &format!("/api/projects/{}", project), other, Some(json!({ "title": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &format!("/api/projects/{}", project), other, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &format!("/api/projects/{}", project), owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call("GET", &format!("/api/projects/{}", project), owner, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn starter_plan_limits_owned_projects() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    for _ in 0..3 {
        app.create_project(owner).await;
    }

    let (status, body) = app
        .call(
            "POST",
            "/api/projects",
            owner,
            Some(json!({ "title": "Fourth", "focus_question": "Why?" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn phases_cannot_be_skipped() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/projects/{}/phase", project),
            owner,
            Some(json!({ "phase": "analysis" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (_, body) = app.call("GET", &format!("/api/projects/{}", project), owner, None).await;
    assert_eq!(body["phase"], "brainstorming");
}

#[tokio::test]
async fn ratings_only_in_rating_phase() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let statement = app.add_statement(&project, owner, "Reward referrals").await;

    let (status, body) = app.rate(&project, owner, &statement, "importance", 4).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_PHASE");

    app.advance(&project, owner).await;
    app.advance(&project, owner).await;

    let (status, body) = app.rate(&project, owner, &statement, "importance", 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "value");

    let (status, _) = app.rate(&project, owner, &statement, "importance", 3).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.rate(&project, owner, &statement, "importance", 4).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 4);

    let (_, mine) = app.call("GET", &format!("/api/projects/{}/ratings", project), owner, None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, summary) = app
        .call("GET", &format!("/api/projects/{}/ratings/summary", project), owner, None)
        .await;
    assert_eq!(summary[0]["mean_importance"], 4.0);
    assert_eq!(summary[0]["rater_count"], 1);
}

#[tokio::test]
async fn moving_a_statement_twice_is_idempotent() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let statement = app.add_statement(&project, owner, "Simplify the cancellation flow").await;
    app.advance(&project, owner).await;

    let a = app.create_cluster(&project, owner, "Process").await;
    let b = app.create_cluster(&project, owner, "Experience").await;

    let (status, first) = app.assign(&project, owner, &statement, Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["from_cluster"], Value::Null);
    assert_eq!(first["to_cluster"], a.as_str());

    let (status, second) = app.assign(&project, owner, &statement, Some(&a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["from_cluster"], a.as_str());
    assert_eq!(second["to_cluster"], a.as_str());

    let (_, moved) = app.assign(&project, owner, &statement, Some(&b)).await;
    assert_eq!(moved["from_cluster"], a.as_str());

    let (_, listing) = app.call("GET", &format!("/api/projects/{}/clusters", project), owner, None).await;
    let holders: Vec<&Value> = listing["clusters"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["statement_ids"].as_array().unwrap().iter().any(|id| id == statement.as_str()))
        .collect();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0]["id"], b.as_str());

    let (_, unassigned) = app.assign(&project, owner, &statement, None).await;
    assert_eq!(unassigned["to_cluster"], Value::Null);
    let (_, listing) = app.call("GET", &format!("/api/projects/{}/clusters", project), owner, None).await;
    assert_eq!(listing["unassigned"][0], statement.as_str());
}

#[tokio::test]
async fn regeneration_requires_replace() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    for text in [
        "Improve customer support response times",
        "Train support staff on customer empathy",
        "Offer discounts to loyal customers",
        "Reward loyal customers with points",
    ] {
        app.add_statement(&project, owner, text).await;
    }
    app.advance(&project, owner).await;
    app.set_account(owner, "professional", 50).await;

    let uri = format!("/api/projects/{}/clusters/generate", project);
    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["archived_previous"], false);
    assert_eq!(body["credits_charged"], 1);
    let first_pass = body["pass"]["id"].clone();

    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = app
        .call("POST", &uri, owner, Some(json!({ "replace": true, "settings": { "method": "hybrid" } })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["archived_previous"], true);
    assert_eq!(body["pass"]["method"], "hybrid");
    assert_ne!(body["pass"]["id"], first_pass);

    let (_, listing) = app.call("GET", &format!("/api/projects/{}/clusters", project), owner, None).await;
    assert_eq!(listing["pass"]["id"], body["pass"]["id"]);

    let (status, history) = app
        .call("GET", &format!("/api/projects/{}/clusters/passes", project), owner, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], body["pass"]["id"]);
    assert_eq!(history[0]["active"], true);
    assert_eq!(history[1]["id"], first_pass);
    assert_eq!(history[1]["active"], false);
}

#[tokio::test]
async fn csv_export_has_header_and_attachment_name() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    app.add_statement(&project, owner, "Follow up, then follow up again").await;

    let (status, bytes, content_type) = app
        .send("GET", &format!("/api/projects/{}/export?format=csv", project), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/csv; charset=utf-8"));

    let csv = String::from_utf8(bytes).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("id,text,cluster,source,author,confidence,mean_importance,mean_feasibility")
    );
    assert!(lines.next().unwrap().contains("\"Follow up, then follow up again\""));

    let (status, _, _) = app
        .send("GET", &format!("/api/projects/{}/export?format=xml", project), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn changes_are_published_on_the_event_bus() {
    let app = setup().await;
    let mut rx = app.state.event_bus.subscribe();
    let owner = Uuid::new_v4();

    let project = app.create_project(owner).await;
    app.add_statement(&project, owner, "Host customer round tables").await;

    match rx.try_recv().unwrap() {
        GcmEvent::ProjectCreated { project_id, .. } => assert_eq!(project_id.to_string(), project),
        other => panic!("unexpected event {:?}", other),
    }
    match rx.try_recv().unwrap() {
        GcmEvent::StatementAdded { statement, .. } => assert_eq!(statement.text, "Host customer round tables"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn failed_generation_charges_nothing() {
    let app = setup().await.with_assistant(Arc::new(UnreachableAssistant));
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/projects/{}/statements/generate", project),
            owner,
            Some(json!({ "count": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CONNECTION_ERROR");

    let (_, account) = app.call("GET", "/api/account", owner, None).await;
    assert_eq!(account["credits"], 10);

    // The busy flag was released with the failed request
    assert!(!app
        .state
        .in_flight
        .is_running(project.parse().unwrap(), AiOperation::GenerateStatements));
}

#[tokio::test]
async fn generation_after_emptying_manual_clusters_needs_no_replace() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    for text in ["Call churned customers", "Survey new customers", "Reward referrals"] {
        app.add_statement(&project, owner, text).await;
    }
    app.advance(&project, owner).await;
    app.set_account(owner, "professional", 50).await;

    let draft = app.create_cluster(&project, owner, "Draft").await;
    let (status, _) = app
        .call("DELETE", &format!("/api/projects/{}/clusters/{}", project, draft), owner, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listing) = app.call("GET", &format!("/api/projects/{}/clusters", project), owner, None).await;
    assert!(listing["pass"].is_object());
    assert!(listing["clusters"].as_array().unwrap().is_empty());

    let (status, body) = app
        .call("POST", &format!("/api/projects/{}/clusters/generate", project), owner, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["archived_previous"], true);
    assert_eq!(body["pass"]["method"], "semantic");

    let (_, history) = app
        .call("GET", &format!("/api/projects/{}/clusters/passes", project), owner, None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(history[1]["method"], "manual");
    assert_eq!(history[1]["active"], false);
}

#[tokio::test]
async fn starter_plan_cannot_generate_clusters() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    app.add_statement(&project, owner, "Shorten onboarding").await;
    app.advance(&project, owner).await;

    let uri = format!("/api/projects/{}/clusters/generate", project);
    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    let (_, account) = app.call("GET", "/api/account", owner, None).await;
    assert_eq!(account["credits"], 10);

    app.set_account(owner, "professional", 50).await;
    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

#[tokio::test]
async fn ai_clustering_charges_a_credit_per_ten_statements() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    for i in 0..12 {
        app.add_statement(&project, owner, &format!("Retention idea number {}", i + 1)).await;
    }
    app.advance(&project, owner).await;
    let uri = format!("/api/projects/{}/clusters/generate", project);

    app.set_account(owner, "professional", 1).await;
    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_CREDITS");
    assert_eq!(body["error"]["required"], 2);
    assert_eq!(body["error"]["available"], 1);

    let (_, listing) = app.call("GET", &format!("/api/projects/{}/clusters", project), owner, None).await;
    assert!(listing["pass"].is_null());

    app.set_account(owner, "professional", 5).await;
    let (status, body) = app.call("POST", &uri, owner, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["credits_charged"], 2);
    assert_eq!(body["credits_remaining"], 3);
}

#[tokio::test]
async fn unlimited_balance_is_never_drawn_down() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    app.set_account(owner, "enterprise", -1).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/projects/{}/statements/generate", project),
            owner,
            Some(json!({ "count": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["credits_charged"], 3);
    assert_eq!(body["credits_remaining"], -1);

    let stored: i64 = sqlx::query_scalar("SELECT credits FROM accounts WHERE user_id = ?")
        .bind(owner.to_string())
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(stored, -1);

    let (_, account) = app.call("GET", "/api/account", owner, None).await;
    assert_eq!(account["credits"], -1);
}

#[tokio::test]
async fn only_authors_change_their_statements() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let participant = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let statement = app.add_statement(&project, participant, "Send a welcome kit").await;
    let uri = format!("/api/projects/{}/statements/{}", project, statement);

    let (status, body) = app
        .call("PATCH", &uri, owner, Some(json!({ "text": "Send a welcome box" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
    let (status, _) = app.call("DELETE", &uri, owner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PATCH", &uri, participant, Some(json!({ "text": "Send a welcome box" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["text"], "Send a welcome box");
}

#[tokio::test]
async fn statements_are_frozen_after_brainstorming() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let statement = app.add_statement(&project, owner, "Host a user conference").await;
    app.advance(&project, owner).await;
    let uri = format!("/api/projects/{}/statements/{}", project, statement);

    let (status, body) = app
        .call("PATCH", &uri, owner, Some(json!({ "text": "Host a user meetup" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_PHASE");

    let (status, body) = app.call("DELETE", &uri, owner, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_PHASE");

    let (_, statements) = app
        .call("GET", &format!("/api/projects/{}/statements", project), owner, None)
        .await;
    assert_eq!(statements[0]["text"], "Host a user conference");
}

#[tokio::test]
async fn analysis_needs_clusters_and_complete_ratings() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let mut statements = Vec::new();
    for text in ["Faster refunds", "Named account managers", "Quarterly business reviews"] {
        statements.push(app.add_statement(&project, owner, text).await);
    }

    let (status, _) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_phase"], "rating");

    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let cluster = app.create_cluster(&project, owner, "Service").await;
    for s in &statements {
        assert_eq!(app.assign(&project, owner, s, Some(&cluster)).await.0, StatusCode::OK);
        assert_eq!(app.rate(&project, owner, s, "importance", 4).await.0, StatusCode::OK);
        assert_eq!(app.rate(&project, owner, s, "feasibility", 3).await.0, StatusCode::OK);
    }

    let (status, body) = app.advance(&project, owner).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_phase"], "analysis");
}

#[tokio::test]
async fn duplicate_generation_is_rejected_while_running() {
    let assistant = Arc::new(GatedAssistant::default());
    let app = setup().await.with_assistant(assistant.clone());
    let owner = Uuid::new_v4();
    let project = app.create_project(owner).await;
    let uri = format!("/api/projects/{}/statements/generate", project);

    let first = app.call("POST", &uri, owner, Some(json!({ "count": 4 })));
    let second = async {
        assistant.entered.notified().await;
        assert!(app
            .state
            .in_flight
            .is_running(project.parse().unwrap(), AiOperation::GenerateStatements));
        let duplicate = app.call("POST", &uri, owner, Some(json!({ "count": 4 }))).await;
        assistant.release.notify_one();
        duplicate
    };
    let ((first_status, first_body), (second_status, second_body)) = tokio::join!(first, second);

    assert_eq!(first_status, StatusCode::CREATED, "{}", first_body);
    assert_eq!(second_status, StatusCode::CONFLICT);
    assert_eq!(second_body["error"]["code"], "CONFLICT");

    // Only the request that ran was charged
    let (_, account) = app.call("GET", "/api/account", owner, None).await;
    assert_eq!(account["credits"], 9);
}
