use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Timelike, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::{appointment_routes, doctor_schedule_routes};
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

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

/// Tomorrow at 10:14 UTC, which books the 10:00 slot.
fn tomorrow_at_ten_fourteen() -> chrono::DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .with_hour(10)
        .and_then(|t| t.with_minute(14))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap()
}

async fn mount_clinic_people(server: &MockServer, clinic_id: Uuid, patient_id: Uuid, doctor: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::patient_row(clinic_id, patient_id)])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::user_row(doctor, "")])))
        .mount(server)
        .await;
}

async fn mount_free_slot(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn booking_normalizes_to_slot_start() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let requested = tomorrow_at_ten_fourteen();
    let slot = requested.with_minute(0).unwrap();

    mount_clinic_people(&server, clinic_id, patient_id, &doctor).await;
    mount_free_slot(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            Uuid::new_v4(),
            doctor.id,
            patient_id,
            &slot.to_rfc3339(),
            "scheduled",
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::POST,
        "/",
        &JwtTestUtils::bearer(&desk, &config),
        Some(json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "start_time": requested.to_rfc3339(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "scheduled");

    let requests = server.received_requests().await.unwrap();
    let insert = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let sent: Value = serde_json::from_slice(&insert.body).unwrap();
    let start: chrono::DateTime<Utc> = serde_json::from_value(sent["start_time"].clone()).unwrap();
    let end: chrono::DateTime<Utc> = serde_json::from_value(sent["end_time"].clone()).unwrap();
    assert_eq!(start, slot);
    assert_eq!(end - start, Duration::minutes(30));
    assert_eq!(sent["date"], slot.format("%Y-%m-%d").to_string());
}

#[tokio::test]
async fn losing_a_booking_race_is_appointment_conflict() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    mount_clinic_people(&server, clinic_id, patient_id, &doctor).await;
    // The pre-check sees a free slot; the unique index then rejects the insert.
    mount_free_slot(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_active_slot_key\""
        })))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::POST,
        "/",
        &JwtTestUtils::bearer(&desk, &config),
        Some(json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "start_time": tomorrow_at_ten_fourteen().to_rfc3339(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "APPOINTMENT_CONFLICT");
    assert_eq!(body["error"]["message"], "Time slot is already booked for this doctor");
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_yield_one_winner() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let requested = tomorrow_at_ten_fourteen();
    let slot = requested.with_minute(0).unwrap();

    mount_clinic_people(&server, clinic_id, patient_id, &doctor).await;
    // Both pre-checks see a free slot; the store accepts the first insert only.
    mount_free_slot(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            Uuid::new_v4(),
            doctor.id,
            patient_id,
            &slot.to_rfc3339(),
            "scheduled",
        )])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_active_slot_key\""
        })))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);
    let auth = JwtTestUtils::bearer(&desk, &config);
    let state = config.to_state();
    let body = json!({
        "patient_id": patient_id,
        "doctor_id": doctor.id,
        "start_time": requested.to_rfc3339(),
    });

    let (first, second) = tokio::join!(
        send(appointment_routes(state.clone()), Method::POST, "/", &auth, Some(body.clone())),
        send(appointment_routes(state), Method::POST, "/", &auth, Some(body)),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let loser = if first.0 == StatusCode::CONFLICT { &first.1 } else { &second.1 };
    assert_eq!(loser["error"]["code"], "APPOINTMENT_CONFLICT");

    let inserts = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/rest/v1/appointments")
        .count();
    assert_eq!(inserts, 2);
}

#[tokio::test]
async fn occupied_slot_is_rejected_before_insert() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    mount_clinic_people(&server, clinic_id, patient_id, &doctor).await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let boss = TestUser::boss(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::POST,
        "/",
        &JwtTestUtils::bearer(&boss, &config),
        Some(json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "start_time": tomorrow_at_ten_fourteen().to_rfc3339(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "APPOINTMENT_CONFLICT");
}

#[tokio::test]
async fn past_slots_cannot_be_booked() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    mount_clinic_people(&server, clinic_id, patient_id, &doctor).await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::POST,
        "/",
        &JwtTestUtils::bearer(&desk, &config),
        Some(json!({
            "patient_id": patient_id,
            "doctor_id": doctor.id,
            "start_time": (Utc::now() - Duration::days(1)).to_rfc3339(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn reschedule_is_a_single_in_place_update() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);
    let old_slot = tomorrow_at_ten_fourteen().with_minute(0).unwrap();
    let new_slot = old_slot + Duration::hours(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor.id,
            patient_id,
            &old_slot.to_rfc3339(),
            "confirmed",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("neq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor.id,
            patient_id,
            &new_slot.to_rfc3339(),
            "confirmed",
        )])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::PUT,
        &format!("/{}/reschedule", appointment_id),
        &JwtTestUtils::bearer(&desk, &config),
        Some(json!({ "start_time": (new_slot + Duration::minutes(20)).to_rfc3339() })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(appointment_id));
    assert_eq!(body["status"], "confirmed");
}

#[tokio::test]
async fn doctor_cannot_touch_another_doctors_appointment() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &tomorrow_at_ten_fourteen().to_rfc3339(),
            "scheduled",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let doctor = TestUser::doctor(clinic_id);

    let (status, _) = send(
        doctor_schedule_routes(config.to_state()),
        Method::PUT,
        &format!("/appointments/{}/status", appointment_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "status": "confirmed" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completed_appointment_cannot_be_reopened() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let doctor = TestUser::doctor(clinic_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor.id,
            Uuid::new_v4(),
            &tomorrow_at_ten_fourteen().to_rfc3339(),
            "completed",
        )])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());

    let (status, body) = send(
        doctor_schedule_routes(config.to_state()),
        Method::PUT,
        &format!("/appointments/{}/status", appointment_id),
        &JwtTestUtils::bearer(&doctor, &config),
        Some(json!({ "status": "scheduled" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Cannot change appointment status from completed to scheduled"
    );
}

#[tokio::test]
async fn cancel_records_an_audit_entry() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let start = tomorrow_at_ten_fourteen().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor_id,
            Uuid::new_v4(),
            &start,
            "scheduled",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            doctor_id,
            Uuid::new_v4(),
            &start,
            "cancelled",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::PUT,
        &format!("/{}/cancel", appointment_id),
        &JwtTestUtils::bearer(&desk, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let mut audit_body = None;
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap();
        if let Some(req) = requests.iter().find(|r| r.url.path() == "/rest/v1/audit_logs") {
            audit_body = Some(serde_json::from_slice::<Value>(&req.body).unwrap());
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }

    let audit = audit_body.expect("audit entry was not written");
    assert_eq!(audit["action"], "APPOINTMENT_STATUS_CHANGED");
    assert_eq!(audit["entity_id"], json!(appointment_id));
    assert_eq!(audit["meta"]["from"], "scheduled");
    assert_eq!(audit["meta"]["to"], "cancelled");
}

#[tokio::test]
async fn status_write_is_guarded_by_the_validated_status() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let start = tomorrow_at_ten_fourteen().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockStoreResponses::appointment_row(
            clinic_id,
            appointment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &start,
            "scheduled",
        )])))
        .mount(&server)
        .await;
    // Another request completed the appointment in between, so the guarded update matches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_store(&server.uri());
    let desk = TestUser::receptionist(clinic_id);

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::PUT,
        &format!("/{}/cancel", appointment_id),
        &JwtTestUtils::bearer(&desk, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "Cannot change appointment status from scheduled to cancelled");

    let audited = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .any(|r| r.url.path() == "/rest/v1/audit_logs");
    assert!(!audited);
}

#[tokio::test]
async fn list_rejects_unknown_status_filter() {
    let config = TestConfig::default();
    let desk = TestUser::receptionist(Uuid::new_v4());

    let (status, body) = send(
        appointment_routes(config.to_state()),
        Method::GET,
        "/?status=postponed",
        &JwtTestUtils::bearer(&desk, &config),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
