use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clinic_cell::router::admin_routes;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

fn create_test_app(config: &TestConfig) -> Router {
    admin_routes(config.to_state())
}

async fn send(app: Router, method: Method, uri: &str, auth: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth)
        .header("content-type", "application/json");
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn boss_cannot_manage_clinics() {
    let config = TestConfig::default();
    let boss = TestUser::boss(Uuid::new_v4());

    let (status, body) = send(
        create_test_app(&config),
        Method::GET,
        "/clinics",
        &JwtTestUtils::bearer(&boss, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn superadmin_creates_clinic() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockStoreResponses::clinic_row(clinic_id)])))
        .expect(1)
        .mount(&server)
        .await;
    let config = TestConfig::with_store(&server.uri());
    let admin = TestUser::superadmin();

    let (status, body) = send(
        create_test_app(&config),
        Method::POST,
        "/clinics",
        &JwtTestUtils::bearer(&admin, &config),
        Some(json!({"name": "Smile Dental", "timezone": "Asia/Tashkent"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], json!(clinic_id));
}

#[tokio::test]
async fn duplicate_clinic_name_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"clinics_name_key\""
        })))
        .mount(&server)
        .await;
    let config = TestConfig::with_store(&server.uri());
    let admin = TestUser::superadmin();

    let (status, body) = send(
        create_test_app(&config),
        Method::POST,
        "/clinics",
        &JwtTestUtils::bearer(&admin, &config),
        Some(json!({"name": "Smile Dental", "timezone": "Asia/Tashkent"})),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Clinic with this name already exists");
}

#[tokio::test]
async fn malformed_clinic_id_is_bad_request() {
    let config = TestConfig::default();
    let admin = TestUser::superadmin();

    let (status, body) = send(
        create_test_app(&config),
        Method::GET,
        "/clinics/not-a-uuid",
        &JwtTestUtils::bearer(&admin, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

async fn mount_clinic(server: &MockServer, clinic_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::clinic_row(clinic_id)])))
        .mount(server)
        .await;
}

fn invitation_row(clinic_id: Uuid, token: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "clinic_id": clinic_id,
        "email": "owner@clinic.test",
        "role": "boss",
        "token": token,
        "expires_at": Utc::now() + Duration::days(7),
        "used_at": null,
        "created_by": Uuid::new_v4(),
        "created_at": Utc::now(),
    })
}

#[tokio::test]
async fn pending_invitation_is_reused() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    mount_clinic(&server, clinic_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invitations"))
        .and(query_param("email", "eq.owner@clinic.test"))
        .and(query_param("used_at", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([invitation_row(clinic_id, "existing-token")])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/invitations"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let admin = TestUser::superadmin();

    let (status, body) = send(
        create_test_app(&config),
        Method::POST,
        &format!("/clinics/{}/invite", clinic_id),
        &JwtTestUtils::bearer(&admin, &config),
        Some(json!({"email": "Owner@Clinic.test"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token"], "existing-token");
    assert_eq!(
        body["invite_url"],
        "http://localhost:3000/invite/accept?token=existing-token"
    );
}

#[tokio::test]
async fn new_invitation_is_created_for_boss_role() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    mount_clinic(&server, clinic_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invitations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/invitations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([invitation_row(clinic_id, "fresh-token")])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let admin = TestUser::superadmin();

    let (status, body) = send(
        create_test_app(&config),
        Method::POST,
        &format!("/clinics/{}/invite", clinic_id),
        &JwtTestUtils::bearer(&admin, &config),
        Some(json!({"email": "owner@clinic.test"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "boss");
    assert_eq!(body["token"], "fresh-token");
}
