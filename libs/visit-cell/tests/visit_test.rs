use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};
use visit_cell::router::doctor_visit_routes;

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

async fn send_image(app: Router, auth: &str, filename: &str, content: &[u8]) -> (StatusCode, Value) {
    let boundary = "clinic-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/uploads/image")
        .header("Authorization", auth)
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn started_visit(clinic_id: Uuid, visit_id: Uuid, doctor: &TestUser, patient_id: Uuid) -> Value {
    MockStoreResponses::visit_row(clinic_id, visit_id, doctor.id, patient_id, "started")
}

async fn mount_visit(server: &MockServer, visit: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([visit])))
        .mount(server)
        .await;
}

async fn mount_audit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .mount(server)
        .await;
}

async fn patched_visit_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/visits")
        .expect("visit was not updated");
    serde_json::from_slice(&patch.body).unwrap()
}

#[tokio::test]
async fn completing_a_visit_freezes_totals_and_contract_share() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let filling = Uuid::new_v4();
    let xray = Uuid::new_v4();

    mount_visit(&server, started_visit(clinic_id, visit_id, &doctor, patient_id)).await;
    mount_audit(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::service_row(clinic_id, filling, "Filling", 100.0),
            MockStoreResponses::service_row(clinic_id, xray, "X-ray", 50.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_contracts"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::contract_row(clinic_id, doctor.id, 40.0, "2024-01-01")
        ])))
        .mount(&server)
        .await;

    let mut completed = MockStoreResponses::visit_row(clinic_id, visit_id, doctor.id, patient_id, "completed");
    completed["total"] = json!(225.0);
    completed["doctor_earning"] = json!(90.0);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("status", "eq.started"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/complete", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({
            "diagnosis": "Caries on 36",
            "services": [
                { "service_id": filling, "quantity": 1 },
                { "service_id": xray, "quantity": 1 },
                { "service_id": filling, "quantity": 1 }
            ],
            "discount_type": "percentage",
            "discount_value": 10,
            "payment_type": "cash"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let sent = patched_visit_body(&server).await;
    assert_eq!(sent["status"], "completed");
    assert_eq!(sent["services"].as_array().unwrap().len(), 2);
    assert_eq!(sent["services"][0]["quantity"], 2);
    assert_eq!(sent["services"][0]["subtotal"], 200.0);
    assert_eq!(sent["subtotal"], 250.0);
    assert_eq!(sent["discount_amount"], 25.0);
    assert_eq!(sent["total"], 225.0);
    assert_eq!(sent["doctor_share"], 40.0);
    assert_eq!(sent["doctor_earning"], 90.0);
    assert_eq!(sent["payment_type"], "cash");
}

#[tokio::test]
async fn completion_requires_a_diagnosis() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    mount_visit(&server, started_visit(clinic_id, visit_id, &doctor, Uuid::new_v4())).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/complete", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "diagnosis": "   ", "services": [], "payment_type": "card" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DIAGNOSIS_REQUIRED");
}

#[tokio::test]
async fn fixed_discount_above_subtotal_is_rejected() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let cleaning = Uuid::new_v4();

    let mut visit = started_visit(clinic_id, visit_id, &doctor, Uuid::new_v4());
    visit["diagnosis"] = json!("Gingivitis");
    mount_visit(&server, visit).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::service_row(clinic_id, cleaning, "Cleaning", 250.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/complete", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({
            "services": [{ "service_id": cleaning, "quantity": 1 }],
            "discount_type": "fixed",
            "discount_value": 300,
            "payment_type": "card"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_DISCOUNT");
    assert_eq!(body["error"]["message"], "Discount cannot exceed subtotal");
}

#[tokio::test]
async fn unknown_service_blocks_completion() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    let mut visit = started_visit(clinic_id, visit_id, &doctor, Uuid::new_v4());
    visit["diagnosis"] = json!("Pulpitis");
    mount_visit(&server, visit).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/complete", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({
            "services": [{ "service_id": Uuid::new_v4(), "quantity": 1 }],
            "payment_type": "cash"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "One or more services not found");
}

#[tokio::test]
async fn completed_visit_draft_is_locked() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    mount_visit(
        &server,
        MockStoreResponses::visit_row(clinic_id, visit_id, doctor.id, Uuid::new_v4(), "completed"),
    )
    .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/draft", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "comment": "late edit" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Cannot edit completed visit");
}

#[tokio::test]
async fn draft_skips_unknown_services_and_defaults_quantity() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let crown = Uuid::new_v4();

    let visit = started_visit(clinic_id, visit_id, &doctor, Uuid::new_v4());
    mount_visit(&server, visit.clone()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::service_row(clinic_id, crown, "Crown", 400.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([visit])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, _) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/visits/{}/draft", visit_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({
            "services": [
                { "service_id": crown, "quantity": 0 },
                { "service_id": Uuid::new_v4(), "quantity": 2 }
            ],
            "affected_teeth": ["11", "21"]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);

    let sent = patched_visit_body(&server).await;
    assert_eq!(sent["services"].as_array().unwrap().len(), 1);
    assert_eq!(sent["services"][0]["quantity"], 1);
    assert_eq!(sent["subtotal"], 400.0);
    assert_eq!(sent["total"], 400.0);
    assert_eq!(sent["affected_teeth"], json!(["11", "21"]));
    assert!(sent.get("status").is_none());
}

#[tokio::test]
async fn oversized_service_quantities_are_validation_errors() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let filling = Uuid::new_v4();

    mount_visit(&server, started_visit(clinic_id, visit_id, &doctor, Uuid::new_v4())).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::service_row(clinic_id, filling, "Filling", 100.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let auth = JwtTestUtils::bearer(&doctor, &config);
    let state = config.to_state();

    let (status, body) = send(
        doctor_visit_routes(state.clone()),
        Method::PUT,
        &format!("/visits/{}/complete", visit_id),
        &auth,
        Some(json!({
            "diagnosis": "Caries on 36",
            "services": [
                { "service_id": filling, "quantity": i32::MAX },
                { "service_id": filling, "quantity": 1 }
            ],
            "payment_type": "cash"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        doctor_visit_routes(state),
        Method::PUT,
        &format!("/visits/{}/draft", visit_id),
        &auth,
        Some(json!({
            "services": [
                { "service_id": filling, "quantity": 600 },
                { "service_id": filling, "quantity": 600 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn starting_a_visit_for_another_doctors_appointment_is_forbidden() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::patient_row(clinic_id, patient_id)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            Uuid::new_v4(),
            patient_id,
            "2025-03-01T09:00:00Z",
            "scheduled",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::POST,
        "/visits",
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "patient_id": patient_id, "appointment_id": appointment_id })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "This appointment is for another doctor");
}

#[tokio::test]
async fn second_visit_for_an_appointment_is_a_conflict() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::patient_row(clinic_id, patient_id)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor.id,
            patient_id,
            "2025-03-01T09:00:00Z",
            "in_progress",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/visits"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-0/1"))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::POST,
        "/visits",
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "patient_id": patient_id, "appointment_id": appointment_id })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn starting_a_visit_moves_the_appointment_and_audits() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    let appointment = MockStoreResponses::appointment_row(
        clinic_id,
        appointment_id,
        doctor.id,
        patient_id,
        "2025-03-01T09:00:00Z",
        "confirmed",
    );
    let mut moved = appointment.clone();
    moved["status"] = json!("in_progress");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::patient_row(clinic_id, patient_id)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;
    let mut visit = started_visit(clinic_id, visit_id, &doctor, patient_id);
    visit["appointment_id"] = json!(appointment_id);
    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([visit])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([moved])))
        .expect(1)
        .mount(&server)
        .await;
    mount_audit(&server).await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::POST,
        "/visits",
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "patient_id": patient_id, "appointment_id": appointment_id })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "started");

    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/appointments")
        .unwrap();
    let sent: Value = serde_json::from_slice(&patch.body).unwrap();
    assert_eq!(sent["status"], "in_progress");

    let mut actions = Vec::new();
    for _ in 0..50 {
        actions = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/rest/v1/audit_logs")
            .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap()["action"].clone())
            .collect();
        if actions.len() == 2 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert!(actions.contains(&json!("APPOINTMENT_STATUS_CHANGED")));
    assert!(actions.contains(&json!("VISIT_STARTED")));
}

#[tokio::test]
async fn doctors_only_see_their_own_visits() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::GET,
        &format!("/visits/{}", Uuid::new_v4()),
        &JwtTestUtils::bearer(&doctor, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Visit not found");
}

#[tokio::test]
async fn receptionist_cannot_reach_doctor_routes() {
    let config = TestConfig::default();
    let desk = TestUser::receptionist(Uuid::new_v4());

    let (status, _) = send(
        doctor_visit_routes(config.to_state()),
        Method::GET,
        "/visits",
        &JwtTestUtils::bearer(&desk, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completing_a_step_moves_plan_in_progress() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let plan_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    let plan = json!({
        "id": plan_id,
        "clinic_id": clinic_id,
        "patient_id": Uuid::new_v4(),
        "doctor_id": doctor.id,
        "title": "Root canal",
        "steps": [
            { "step_number": 1, "description": "Open and clean", "status": "pending" },
            { "step_number": 2, "description": "Fill and crown", "status": "pending" }
        ],
        "status": "pending",
        "created_at": "2025-03-01T09:00:00Z",
        "updated_at": "2025-03-01T09:00:00Z"
    });
    let mut updated = plan.clone();
    updated["steps"][0]["status"] = json!("completed");
    updated["status"] = json!("in_progress");

    Mock::given(method("GET"))
        .and(path("/rest/v1/treatment_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([plan])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/treatment_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/treatment-plans/{}/steps/1", plan_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "status": "completed", "notes": "done under anesthesia" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], "1/2");

    let requests = server.received_requests().await.unwrap();
    let patch = requests.iter().find(|r| r.method.as_str() == "PATCH").unwrap();
    let sent: Value = serde_json::from_slice(&patch.body).unwrap();
    assert_eq!(sent["status"], "in_progress");
    assert_eq!(sent["steps"][0]["status"], "completed");
    assert!(sent["steps"][0]["completed_at"].is_string());
    assert_eq!(sent["steps"][0]["notes"], "done under anesthesia");
}

#[tokio::test]
async fn unknown_plan_step_is_rejected() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let plan_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/treatment_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": plan_id,
            "clinic_id": clinic_id,
            "patient_id": Uuid::new_v4(),
            "doctor_id": doctor.id,
            "title": "Whitening",
            "steps": [{ "step_number": 1, "description": "Session", "status": "pending" }],
            "status": "pending",
            "created_at": "2025-03-01T09:00:00Z",
            "updated_at": "2025-03-01T09:00:00Z"
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_visit_routes(config.to_state()),
        Method::PUT,
        &format!("/treatment-plans/{}/steps/3", plan_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "status": "completed" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid step number");
}

#[tokio::test]
async fn uploaded_image_lands_in_upload_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestConfig::default();
    config.upload_dir = dir.path().display().to_string();
    let doctor = TestUser::doctor(Uuid::new_v4());

    let (status, body) = send_image(
        doctor_visit_routes(config.to_state()),
        &JwtTestUtils::bearer(&doctor, &config),
        "bitewing.PNG",
        b"\x89PNG\r\n\x1a\nfake image bytes",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("xray_"));
    assert!(filename.ends_with(".png"));
    assert_eq!(body["url"], format!("/uploads/{}", filename));
    assert!(dir.path().join(filename).exists());
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestConfig::default();
    config.upload_dir = dir.path().display().to_string();
    let doctor = TestUser::doctor(Uuid::new_v4());

    let (status, body) = send_image(
        doctor_visit_routes(config.to_state()),
        &JwtTestUtils::bearer(&doctor, &config),
        "report.pdf",
        b"%PDF-1.7",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid image format. Allowed: jpg, jpeg, png, webp, gif");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
