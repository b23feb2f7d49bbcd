use octofhir_server::bootstrap::build_manager;
use octofhir_server::{
    AppConfig, FilterMatch, LifecycleError, OutcomeKind, ResourceManager, SummaryMode,
    parse_criteria,
};
use octofhir_storage::{DELETED_AT, VersionedStorage};
use serde_json::{Value, json};

fn manager() -> ResourceManager {
    let mut config = AppConfig::default();
    config.terminology.enabled = false;
    build_manager(&config).expect("manager builds")
}

fn status(err: LifecycleError) -> u16 {
    err.into_api_error().status_code().as_u16()
}

async fn create_org(manager: &ResourceManager, name: &str) -> String {
    let outcome = manager
        .create("Organization", json!({"resourceType": "Organization", "name": name}))
        .await
        .expect("create organization");
    outcome.id().expect("assigned id").to_string()
}

#[tokio::test]
async fn create_assigns_id_and_first_version() {
    let manager = manager();
    let outcome = manager
        .create(
            "Patient",
            json!({
                "resourceType": "Patient",
                "name": [{"given": ["Peter"], "family": "Chalmers"}],
                "gender": "male",
                "meta": {"versionId": "77", "tag": [{"system": "http://hl7.org/fhir/tags", "code": "vip"}]}
            }),
        )
        .await
        .expect("create patient");

    assert_eq!(outcome.kind, OutcomeKind::Created);
    assert_eq!(outcome.version, 1);
    let resource = &outcome.resource;
    assert_eq!(resource["meta"]["versionId"], "1");
    assert_eq!(resource["meta"]["tag"][0]["code"], "vip");
    assert!(resource["meta"]["lastUpdated"].is_string());
    assert_eq!(resource["text"]["status"], "generated");
    assert!(resource.get("deceasedBoolean").is_none());

    let id = outcome.id().unwrap();
    let read = manager.get_by_id("Patient", id).await.unwrap();
    assert_eq!(read.resource, outcome.resource);
}

#[tokio::test]
async fn create_rejects_client_id_and_invalid_bodies() {
    let manager = manager();
    let err = manager
        .create("Patient", json!({"id": "mine", "gender": "male"}))
        .await
        .unwrap_err();
    assert_eq!(status(err), 400);

    let err = manager
        .create(
            "Patient",
            json!({
                "gender": 3,
                "name": {"family": "Chalmers"},
                "deceasedBoolean": "yes"
            }),
        )
        .await
        .unwrap_err();
    let LifecycleError::Validation { errors, .. } = &err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 3);
    let api = err.into_api_error();
    assert_eq!(api.status_code().as_u16(), 422);
    assert_eq!(api.to_operation_outcome().issue.len(), 3);

    assert!(matches!(manager.filter("Patient", &[]).await.unwrap(), FilterMatch::None));
}

#[tokio::test]
async fn resource_rules_are_semantic_errors() {
    let manager = manager();
    let err = manager
        .create("Patient", json!({"deceasedBoolean": true, "deceasedDateTime": "2015-02-07T13:28:17Z"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Only one of deceasedBoolean and deceasedDateTime"));

    let err = manager
        .create(
            "HealthcareService",
            json!({
                "serviceName": "Night clinic",
                "availableTime": [{"availableStartTime": "22:00:00", "availableEndTime": "06:00:00"}]
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(status(err), 422);
}

#[tokio::test]
async fn versions_increase_by_one_per_changing_update() {
    let manager = manager();
    let id = create_org(&manager, "ACME").await;

    let v2 = manager
        .update("Organization", &id, json!({"name": "ACME Inc.", "alias": ["Acme"]}), Some("W/\"1\""))
        .await
        .unwrap();
    assert_eq!(v2.kind, OutcomeKind::Updated);
    assert_eq!(v2.version, 2);
    assert_eq!(v2.resource["meta"]["versionId"], "2");

    // identical body: no new version
    let same = manager
        .update("Organization", &id, json!({"name": "ACME Inc.", "alias": ["Acme"]}), Some("2"))
        .await
        .unwrap();
    assert_eq!(same.kind, OutcomeKind::Unchanged);
    assert_eq!(same.version, 2);
    assert_eq!(same.resource["meta"], v2.resource["meta"]);

    // full replace clears what the body omits
    let v3 = manager
        .update("Organization", &id, json!({"name": "ACME Inc."}), Some("\"2\""))
        .await
        .unwrap();
    assert_eq!(v3.version, 3);
    assert!(v3.resource.get("alias").is_none());

    let history = manager.history("Organization", &id).await.unwrap();
    let versions: Vec<u64> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, [1, 2, 3]);
    assert_eq!(history[0].resource["name"], "ACME");
    assert_eq!(history[1].resource["alias"], json!(["Acme"]));
}

#[tokio::test]
async fn stale_and_missing_tokens_are_rejected() {
    let manager = manager();
    let id = create_org(&manager, "ACME").await;

    let err = manager
        .update("Organization", &id, json!({"name": "x"}), None)
        .await
        .unwrap_err();
    assert_eq!(status(err), 428);

    let err = manager
        .update("Organization", &id, json!({"name": "x"}), Some("W/\"one\""))
        .await
        .unwrap_err();
    assert_eq!(status(err), 400);

    manager
        .update("Organization", &id, json!({"name": "first writer"}), Some("1"))
        .await
        .unwrap();
    let versions_before = manager.history("Organization", &id).await.unwrap().len();
    let err = manager
        .update("Organization", &id, json!({"name": "second writer"}), Some("1"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(err, LifecycleError::VersionConflict { expected: 1, actual: 2, .. }));
    assert_eq!(status(err), 409);
    let versions_after = manager.history("Organization", &id).await.unwrap().len();
    assert_eq!(versions_before, 2);
    assert_eq!(versions_after, versions_before);

    let current = manager.get_by_id("Organization", &id).await.unwrap();
    assert_eq!(current.resource["name"], "first writer");

    let err = manager
        .update("Organization", &id, json!({"id": "other", "name": "x"}), Some("2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::IdMismatch { .. }));
}

#[tokio::test]
async fn deleted_resources_are_gone_and_can_be_resurrected() {
    let manager = manager();
    let id = create_org(&manager, "ACME").await;
    manager
        .update("Organization", &id, json!({"name": "ACME Inc."}), Some("1"))
        .await
        .unwrap();

    let deleted = manager.delete("Organization", &id).await.unwrap();
    assert_eq!(deleted.kind, OutcomeKind::Deleted);
    assert_eq!(deleted.version, 3);

    let err = manager.get_by_id("Organization", &id).await.unwrap_err();
    assert!(err.is_gone());
    let last_known = err.gone_resource().expect("gone carries the deleted state");
    assert_eq!(last_known["name"], "ACME Inc.");
    assert_eq!(last_known["meta"]["versionId"], "3");
    assert!(last_known.get("is_deleted").is_none());
    let api = err.into_api_error();
    assert_eq!(api.status_code().as_u16(), 410);
    assert!(matches!(
        api,
        octofhir_api::ApiError::Gone { resource: Some(ref body), .. } if body["name"] == "ACME Inc."
    ));

    let again = manager.delete("Organization", &id).await.unwrap();
    assert_eq!(again.kind, OutcomeKind::AlreadyDeleted);
    assert_eq!(again.version, 3);

    assert_eq!(
        manager.get_by_vid("Organization", &id, 2).await.unwrap().resource["name"],
        "ACME Inc."
    );
    let err = manager.get_by_vid("Organization", &id, 3).await.unwrap_err();
    assert!(err.is_gone());
    assert_eq!(err.gone_resource().unwrap()["id"], id.as_str());
    assert!(manager.get_by_vid("Organization", &id, 9).await.unwrap_err().is_not_found());

    // a write that keeps the deleted flag leaves it deleted
    let still = manager
        .update("Organization", &id, json!({"name": "Hidden", "is_deleted": true}), Some("3"))
        .await
        .unwrap();
    assert_eq!(still.version, 4);
    assert!(manager.get_by_id("Organization", &id).await.unwrap_err().is_gone());

    let revived = manager
        .update("Organization", &id, json!({"name": "ACME Reborn"}), Some("4"))
        .await
        .unwrap();
    assert_eq!(revived.version, 5);
    let read = manager.get_by_id("Organization", &id).await.unwrap();
    assert_eq!(read.resource["name"], "ACME Reborn");
    assert!(read.resource.get("is_deleted").is_none());

    // the revive superseded a deleted state; history keeps it deleted
    let snapshots = manager.storage().history("Organization", &id).await.unwrap();
    let kept_deleted = snapshots.iter().find(|s| s.version == 4).unwrap();
    assert!(kept_deleted.is_deleted());
    assert!(kept_deleted.columns[DELETED_AT].is_string());
    assert_eq!(kept_deleted.columns["name"], "Hidden");
    let first_delete = snapshots.iter().find(|s| s.version == 3).unwrap();
    assert!(first_delete.is_deleted());
    assert_eq!(first_delete.columns[DELETED_AT], kept_deleted.columns[DELETED_AT]);
    assert!(!snapshots.iter().find(|s| s.version == 2).unwrap().is_deleted());

    let err = manager.get_by_vid("Organization", &id, 4).await.unwrap_err();
    assert_eq!(err.gone_resource().unwrap()["name"], "Hidden");
}

#[tokio::test]
async fn not_found_versus_gone_after_hard_delete() {
    let manager = manager();
    let err = manager.get_by_id("Organization", "missing").await.unwrap_err();
    assert_eq!(status(err), 404);
    let err = manager.get_by_id("Observation", "missing").await.unwrap_err();
    assert_eq!(status(err), 404);

    // no history: the resource leaves no trace
    let fresh = create_org(&manager, "Fresh").await;
    manager.hard_delete("Organization", &fresh).await.unwrap();
    assert!(manager.get_by_id("Organization", &fresh).await.unwrap_err().is_not_found());

    let updated = create_org(&manager, "Updated").await;
    manager
        .update("Organization", &updated, json!({"name": "Updated twice"}), Some("1"))
        .await
        .unwrap();
    manager.hard_delete("Organization", &updated).await.unwrap();
    let err = manager.get_by_id("Organization", &updated).await.unwrap_err();
    assert!(err.is_gone());
    assert_eq!(err.gone_resource().unwrap()["name"], "Updated");
    let history = manager.history("Organization", &updated).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].resource["name"], "Updated");

    let err = manager.hard_delete("Organization", &updated).await.unwrap_err();
    assert_eq!(status(err), 410);
    let err = manager.hard_delete("Organization", &fresh).await.unwrap_err();
    assert_eq!(status(err), 404);
    let err = manager.get_by_id("Organization", "not an id").await.unwrap_err();
    assert_eq!(status(err), 400);
}

#[tokio::test]
async fn meta_last_updated_matches_the_stored_change_time() {
    let manager = manager();
    let created = manager
        .create("Organization", json!({"name": "Clock"}))
        .await
        .unwrap();
    let id = created.id().unwrap().to_string();
    assert_eq!(created.resource["meta"]["lastUpdated"], created.last_updated.to_string());

    let updated = manager
        .update("Organization", &id, json!({"name": "Clock Inc."}), Some("1"))
        .await
        .unwrap();
    assert_eq!(updated.resource["meta"]["lastUpdated"], updated.last_updated.to_string());

    let deleted = manager.delete("Organization", &id).await.unwrap();
    assert_eq!(deleted.resource["meta"]["lastUpdated"], deleted.last_updated.to_string());

    let history = manager.history("Organization", &id).await.unwrap();
    assert_eq!(history[0].resource["meta"]["lastUpdated"], created.resource["meta"]["lastUpdated"]);
    assert_eq!(history[0].last_updated, updated.last_updated);
    assert_eq!(history[1].last_updated, deleted.last_updated);
}

#[tokio::test]
async fn conditional_operations_respect_match_counts() {
    let manager = manager();
    for _ in 0..2 {
        manager
            .create("Patient", json!({"identifier": [{"value": "dup"}], "gender": "female"}))
            .await
            .unwrap();
    }
    let solo = manager
        .create("Patient", json!({"identifier": [{"value": "solo"}]}))
        .await
        .unwrap();
    let solo_id = solo.id().unwrap().to_string();

    let existing = manager
        .conditional_create("Patient", json!({"gender": "male"}), "identifier=solo")
        .await
        .unwrap();
    assert_eq!(existing.kind, OutcomeKind::Read);
    assert_eq!(existing.id(), Some(solo_id.as_str()));

    let err = manager
        .conditional_create("Patient", json!({"gender": "male"}), "identifier=dup")
        .await
        .unwrap_err();
    assert_eq!(status(err), 412);

    let created = manager
        .conditional_create("Patient", json!({"identifier": [{"value": "new"}]}), "?identifier=new")
        .await
        .unwrap();
    assert_eq!(created.kind, OutcomeKind::Created);

    let updated = manager
        .conditional_update(
            "Patient",
            &parse_criteria("identifier=solo"),
            json!({"identifier": [{"value": "solo"}], "gender": "other"}),
        )
        .await
        .unwrap();
    assert_eq!(updated.kind, OutcomeKind::Updated);
    assert_eq!(updated.id(), Some(solo_id.as_str()));
    assert_eq!(updated.version, 2);

    let upserted = manager
        .conditional_update("Patient", &parse_criteria("identifier=absent"), json!({"gender": "male"}))
        .await
        .unwrap();
    assert_eq!(upserted.kind, OutcomeKind::Created);

    let err = manager
        .conditional_delete("Patient", &parse_criteria("identifier=absent&gender=unknown"))
        .await
        .unwrap_err();
    assert_eq!(status(err), 404);
    let err = manager
        .conditional_delete("Patient", &parse_criteria("gender=female"))
        .await
        .unwrap_err();
    assert_eq!(status(err), 412);

    let deleted = manager
        .conditional_delete("Patient", &parse_criteria("identifier=solo&unknownParam=1"))
        .await
        .unwrap();
    assert_eq!(deleted.kind, OutcomeKind::Deleted);
    let after = manager
        .filter("Patient", &parse_criteria("identifier=solo"))
        .await
        .unwrap();
    assert!(matches!(after, FilterMatch::None));
}

#[tokio::test]
async fn summary_projections() {
    let manager = manager();
    let outcome = manager
        .create(
            "Patient",
            json!({
                "identifier": [{"value": "12345"}],
                "name": [{"family": "Chalmers"}],
                "gender": "male",
                "birthDate": "1974-12-25"
            }),
        )
        .await
        .unwrap();
    let id = outcome.id().unwrap().to_string();

    let keys = |value: &Value| {
        let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    };

    let summary = manager.get_summary("Patient", &id, SummaryMode::True).await.unwrap();
    assert_eq!(keys(&summary.resource), ["id", "identifier", "meta", "name", "resourceType"]);
    assert_eq!(summary.resource["meta"]["tag"][0]["code"], "SUBSETTED");

    let text = manager.get_summary("Patient", &id, SummaryMode::Text).await.unwrap();
    assert_eq!(keys(&text.resource), ["id", "meta", "resourceType", "text"]);

    let data = manager.get_summary("Patient", &id, SummaryMode::Data).await.unwrap();
    assert!(data.resource.get("text").is_none());
    assert_eq!(data.resource["birthDate"], "1974-12-25");

    let full = manager.get_summary("Patient", &id, SummaryMode::False).await.unwrap();
    assert_eq!(full.resource, outcome.resource);
}

#[tokio::test]
async fn nested_expansions_survive_storage() {
    let manager = manager();
    let body = json!({
        "resourceType": "ValueSet",
        "name": "Body sites",
        "status": "active",
        "expansion": {
            "identifier": "urn:uuid:0f5a8c8e-3b7d-4d5e-9a61-2c4e8f1b7a90",
            "timestamp": "2016-01-05T10:00:00Z",
            "contains": [{
                "code": "limb",
                "contains": [{"code": "arm", "contains": [{"code": "hand", "display": "Hand"}]}]
            }]
        }
    });
    let created = manager.create("ValueSet", body).await.unwrap();
    let id = created.id().unwrap().to_string();
    assert_eq!(created.resource["text"]["status"], "generated");

    let read = manager.get_by_id("ValueSet", &id).await.unwrap();
    assert_eq!(
        read.resource["expansion"]["contains"][0]["contains"][0]["contains"][0]["display"],
        "Hand"
    );

    let summary = manager.get_summary("ValueSet", &id, SummaryMode::True).await.unwrap();
    assert!(summary.resource.get("expansion").is_none());
    assert_eq!(summary.resource["name"], "Body sites");
}
