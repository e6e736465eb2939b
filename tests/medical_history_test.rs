use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use neuroguard_portal::Portal;
use neuroguard_portal::api::error::ApiError;
use neuroguard_portal::config::PortalConfig;
use neuroguard_portal::forms::{MedicalHistoryForm, SubmitError};

#[derive(Clone, Default)]
struct GatewayState {
    create_hits: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
    files: Arc<Mutex<Vec<Value>>>,
    last_create_body: Arc<Mutex<Option<Value>>>,
}

fn record_json(patient_id: i64) -> Value {
    json!({
        "id": 3,
        "patientId": patient_id,
        "patientName": "James Wilson",
        "diagnosis": "Early-stage dementia",
        "diagnosisDate": "2024-02-10",
        "progressionStage": "MILD",
        "surgeries": [{"description": "Biopsy", "date": "2023-11-01"}],
        "providerIds": [1],
        "providerNames": ["Sarah Chen"],
        "caregiverIds": [9],
        "caregiverNames": ["jwilson"],
        "files": [],
        "createdAt": "2024-02-10T09:30:00",
        "updatedAt": "2024-03-01T14:00:00"
    })
}

async fn list_histories() -> axum::Json<Value> {
    axum::Json(json!([record_json(12)]))
}

async fn get_history(Path(patient_id): Path<i64>) -> impl IntoResponse {
    if patient_id == 404 {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    axum::Json(record_json(patient_id)).into_response()
}

async fn create_history(
    State(state): State<GatewayState>,
    body: axum::Json<Value>,
) -> axum::Json<Value> {
    state.create_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_create_body.lock().unwrap() = Some(body.0.clone());
    let patient_id = body.0["patientId"].as_i64().unwrap_or(0);
    axum::Json(record_json(patient_id))
}

async fn list_files(State(state): State<GatewayState>) -> axum::Json<Value> {
    axum::Json(Value::Array(state.files.lock().unwrap().clone()))
}

async fn upload_file(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> axum::Json<Value> {
    let mut uploaded = json!(null);
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("unnamed").to_string();
            let file_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            let data = field.bytes().await.unwrap();
            assert!(!data.is_empty());
            uploaded = json!({
                "id": 21,
                "fileName": file_name,
                "fileType": file_type,
                "fileUrl": "/files/21",
                "uploadedAt": "2025-05-01T10:00:00"
            });
            state.files.lock().unwrap().push(uploaded.clone());
        }
    }
    axum::Json(uploaded)
}

async fn delete_file(
    State(state): State<GatewayState>,
    Path(file_id): Path<i64>,
) -> impl IntoResponse {
    if state.fail_deletes.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage offline").into_response();
    }
    state
        .files
        .lock()
        .unwrap()
        .retain(|f| f["id"].as_i64() != Some(file_id));
    StatusCode::NO_CONTENT.into_response()
}

async fn download(Path(file_id): Path<i64>) -> impl IntoResponse {
    assert_eq!(file_id, 21);
    (StatusCode::OK, b"%PDF-1.5 fake scan".to_vec())
}

async fn picklist() -> axum::Json<Value> {
    axum::Json(json!([
        {"id": 1, "firstName": "Sarah", "lastName": "Chen", "username": "schen"},
        {"id": 2, "firstName": "Anand", "lastName": "Patel", "username": "apatel"}
    ]))
}

async fn spawn_gateway(state: GatewayState) -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/provider/medical-history",
            get(list_histories).post(create_history),
        )
        .route("/api/provider/medical-history/:patient_id", get(get_history))
        .route("/api/provider/medical-history/patients", get(picklist))
        .route("/api/provider/medical-history/caregivers", get(picklist))
        .route("/api/provider/medical-history/providers", get(picklist))
        .route(
            "/api/patient/medical-history/me/files",
            get(list_files).post(upload_file),
        )
        .route(
            "/api/patient/medical-history/me/files/:file_id",
            delete(delete_file),
        )
        .route("/files/:file_id", get(download))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn portal_for(addr: SocketAddr, dir: &tempfile::TempDir) -> Portal {
    let config = PortalConfig {
        gateway_url: format!("http://{addr}"),
        token_path: dir.path().join("authToken"),
        request_timeout_secs: 5,
        download_dir: dir.path().join("downloads"),
    };
    Portal::new(config).unwrap()
}

fn valid_form() -> MedicalHistoryForm {
    let mut form = MedicalHistoryForm::new_create();
    form.patient_id = Some(12);
    form.diagnosis = "Early-stage dementia".to_string();
    form.diagnosis_date = Some(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    form.progression_stage = "MILD".to_string();
    form
}

#[tokio::test]
async fn create_sends_normalized_camel_case_payload() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let mut form = valid_form();
    form.genetic_risk = "  APOE-e4 carrier  ".to_string();
    form.family_history = "   ".to_string();

    let request = form.try_begin_submit().unwrap();
    let saved = portal.medical_history.create(&request).await.unwrap();
    form.finish_submit(true);

    assert_eq!(saved.patient_name, "James Wilson");

    let body = state.last_create_body.lock().unwrap().clone().unwrap();
    let object = body.as_object().unwrap();
    assert_eq!(object["patientId"], 12);
    assert_eq!(object["diagnosis"], "Early-stage dementia");
    assert_eq!(object["diagnosisDate"], "2024-02-10");
    assert_eq!(object["progressionStage"], "MILD");
    assert_eq!(object["geneticRisk"], "APOE-e4 carrier");
    assert!(
        !object.contains_key("familyHistory"),
        "blank optional text must be absent, not empty"
    );
}

/// Scenario C: a future diagnosis date is rejected locally; no request
/// reaches the gateway.
#[tokio::test]
async fn future_date_rejected_before_any_network_call() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let _portal = portal_for(addr, &dir);

    let mut form = valid_form();
    form.diagnosis_date = Some(chrono::Local::now().date_naive() + chrono::Duration::days(1));

    match form.try_begin_submit() {
        Err(SubmitError::Validation(errors)) => {
            let field = errors.field_errors();
            assert!(
                field["diagnosisDate"]
                    .iter()
                    .any(|e| e.code == "future_date_not_allowed")
            );
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    assert_eq!(state.create_hits.load(Ordering::SeqCst), 0);
}

/// Scenario D: a confirmed delete removes the file from the list on
/// success; on failure the file stays listed.
#[tokio::test]
async fn failed_file_delete_keeps_item_in_list() {
    let state = GatewayState::default();
    state.files.lock().unwrap().push(json!({
        "id": 21,
        "fileName": "scan.pdf",
        "fileType": "application/pdf",
        "fileUrl": "/files/21",
        "uploadedAt": "2025-05-01T10:00:00"
    }));
    let addr = spawn_gateway(state.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    // failure leaves the displayed list as it was
    state.fail_deletes.store(true, Ordering::SeqCst);
    let err = portal.medical_history.delete_my_file(21).await.unwrap_err();
    assert!(matches!(err, ApiError::Unknown { status: 500, .. }));
    let files = portal.medical_history.my_files().await.unwrap();
    assert_eq!(files.len(), 1);

    // success removes it
    state.fail_deletes.store(false, Ordering::SeqCst);
    portal.medical_history.delete_my_file(21).await.unwrap();
    let files = portal.medical_history.my_files().await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn upload_round_trips_name_and_type() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let source = dir.path().join("mri-report.pdf");
    std::fs::write(&source, b"%PDF-1.5 report body").unwrap();

    let uploaded = portal.medical_history.upload_my_file(&source).await.unwrap();
    assert_eq!(uploaded.file_name, "mri-report.pdf");
    assert_eq!(uploaded.file_type, "application/pdf");
    assert_eq!(uploaded.id, 21);
}

#[tokio::test]
async fn download_writes_only_the_final_file() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let target_dir = dir.path().join("downloads");
    let saved = portal
        .medical_history
        .download_to(21, "scan.pdf", &target_dir)
        .await
        .unwrap();

    assert_eq!(saved, target_dir.join("scan.pdf"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-1.5 fake scan");

    // the transient write target is gone once the download landed
    let entries: Vec<_> = std::fs::read_dir(&target_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn download_strips_directory_components_from_server_names() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let target_dir = dir.path().join("downloads");
    let saved = portal
        .medical_history
        .download_to(21, "../../etc/scan.pdf", &target_dir)
        .await
        .unwrap();
    assert_eq!(saved, target_dir.join("scan.pdf"));
}

#[tokio::test]
async fn missing_record_classified_as_not_found() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let err = portal.medical_history.provider_history(404).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn picklists_fetch_concurrently() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let (patients, caregivers, providers) = portal.medical_history.picklists().await.unwrap();
    assert_eq!(patients.len(), 2);
    assert_eq!(caregivers[0].full_name(), "Sarah Chen");
    assert_eq!(providers[1].username, "apatel");
}

#[tokio::test]
async fn edit_flow_loads_populates_and_updates_selection() {
    let state = GatewayState::default();
    let addr = spawn_gateway(state).await;
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_for(addr, &dir);

    let existing = portal.medical_history.provider_history(12).await.unwrap();
    let mut form = MedicalHistoryForm::begin_load(12);
    form.populate(&existing);

    assert!(form.is_edit_mode());
    assert_eq!(form.provider_names(), &["Sarah Chen".to_string()]);

    // toggling the already-selected provider removes them; toggling twice
    // restores the loaded state
    let patients = portal.medical_history.patients().await.unwrap();
    let chen = &patients[0];
    form.toggle_provider(chen);
    assert!(form.provider_names().is_empty());
    form.toggle_provider(chen);
    assert_eq!(form.provider_names(), &["Sarah Chen".to_string()]);

    let request = form.try_begin_submit().unwrap();
    assert_eq!(request.patient_id, 12);
    assert_eq!(request.caregiver_names, vec!["jwilson".to_string()]);
}
