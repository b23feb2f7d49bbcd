//! Writes are gated on valueset membership confirmed by the lookup service.

use octofhir_server::bootstrap::build_manager;
use octofhir_server::{AppConfig, FilterMatch, LifecycleError, ResourceManager};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager_for(server: &MockServer) -> ResourceManager {
    let mut config = AppConfig::default();
    config.terminology.base_url = format!("{}/valuesets", server.uri());
    config.terminology.timeout_ms = 2_000;
    build_manager(&config).expect("manager builds")
}

async fn mock_lookup(server: &MockServer, valueset: &str, code: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/valuesets/{valueset}/")))
        .and(query_param("code", code))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_match_accepts_the_code() {
    let server = MockServer::start().await;
    mock_lookup(
        &server,
        "administrative_gender",
        "female",
        json!({"data": [{"code": "female", "display": "Female"}], "count": 1}),
    )
    .await;

    let manager = manager_for(&server);
    let created = manager
        .create("Patient", json!({"gender": "female"}))
        .await
        .expect("code is a member");
    assert_eq!(created.resource["gender"], "female");
}

#[tokio::test]
async fn no_match_rejects_the_write() {
    let server = MockServer::start().await;
    mock_lookup(&server, "administrative_gender", "robot", json!({"data": [], "count": 0})).await;

    let manager = manager_for(&server);
    let err = manager
        .create("Patient", json!({"gender": "robot"}))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Terminology(_)));
    assert_eq!(
        err.to_string(),
        format!(
            "The patient gender robot must be defined in {}/valuesets/administrative_gender/",
            server.uri()
        )
    );
    assert_eq!(err.into_api_error().status_code().as_u16(), 422);
    assert!(matches!(manager.filter("Patient", &[]).await.unwrap(), FilterMatch::None));
}

#[tokio::test]
async fn ambiguous_match_rejects_single_codes() {
    let server = MockServer::start().await;
    mock_lookup(
        &server,
        "administrative_gender",
        "male",
        json!({"data": [{"code": "male"}, {"code": "male"}], "count": 2}),
    )
    .await;

    let manager = manager_for(&server);
    let err = manager
        .create("Patient", json!({"gender": "male"}))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Terminology(_)));
}

#[tokio::test]
async fn concepts_accept_any_matching_entry() {
    let server = MockServer::start().await;
    mock_lookup(
        &server,
        "marital_status",
        "M",
        json!({"data": [{"code": "M"}, {"code": "M", "system": "local"}, {"code": "MX"}], "count": 3}),
    )
    .await;

    let manager = manager_for(&server);
    let created = manager
        .create(
            "Patient",
            json!({"maritalStatus": {"coding": [{"system": "http://hl7.org/fhir/v3/MaritalStatus", "code": "M"}]}}),
        )
        .await
        .expect("concept code accepted");
    assert_eq!(created.resource["maritalStatus"]["coding"][0]["code"], "M");
}

#[tokio::test]
async fn first_failure_stops_remaining_lookups() {
    let server = MockServer::start().await;
    mock_lookup(&server, "administrative_gender", "robot", json!({"data": [], "count": 0})).await;
    Mock::given(method("GET"))
        .and(path("/valuesets/marital_status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"code": "M"}], "count": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let err = manager
        .create(
            "Patient",
            json!({
                "gender": "robot",
                "maritalStatus": {"coding": [{"system": "http://hl7.org/fhir/v3/MaritalStatus", "code": "M"}]}
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Terminology(_)));
}

#[tokio::test]
async fn unavailable_service_fails_the_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/valuesets/administrative_gender/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let err = manager
        .create("Patient", json!({"gender": "female"}))
        .await
        .unwrap_err();
    let LifecycleError::Terminology(source) = &err else {
        panic!("expected terminology error, got {err:?}");
    };
    assert!(source.is_unavailable());
    assert_eq!(err.into_api_error().status_code().as_u16(), 422);
}
