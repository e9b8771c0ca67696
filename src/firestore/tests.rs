use super::models::{Document, Precondition, Value, ValueType};
use super::{FirebaseFirestore, FirestoreError};
use crate::dispatcher::update::StatusUpdate;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

const DOCUMENTS: &str = "/v1/projects/p/databases/(default)/documents";
const NAME: &str = "projects/p/databases/(default)/documents/notifications/n1";

fn firestore(server: &MockServer) -> FirebaseFirestore {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseFirestore::new_with_client(client, server.url(DOCUMENTS)).unwrap()
}

#[tokio::test]
async fn test_get_document() {
    let server = MockServer::start();
    let db = firestore(&server);

    let get_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/notifications/n1", DOCUMENTS));
        then.status(200).json_body(json!({
            "name": NAME,
            "fields": {
                "status": { "stringValue": "queued" },
                "topic": { "stringValue": "promo" }
            },
            "createTime": "2024-05-01T10:00:00.000000Z",
            "updateTime": "2024-05-01T10:00:02.000000Z"
        }));
    });

    let snapshot = db.doc("notifications/n1").unwrap().get().await.unwrap();

    get_mock.assert();
    assert!(snapshot.exists());
    assert_eq!(snapshot.id(), "n1");
    assert_eq!(snapshot.update_time(), Some("2024-05-01T10:00:02.000000Z"));
    assert_eq!(snapshot.fields().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_missing_document() {
    let server = MockServer::start();
    let db = firestore(&server);

    server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/notifications/gone", DOCUMENTS));
        then.status(404).json_body(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
        }));
    });

    let snapshot = db.doc("notifications/gone").unwrap().get().await.unwrap();

    assert!(!snapshot.exists());
    assert!(snapshot.fields().is_none());
    assert_eq!(snapshot.update_time(), None);
}

#[tokio::test]
async fn test_update_commits_preconditioned_write() {
    let server = MockServer::start();
    let db = firestore(&server);

    let commit_mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}:commit", DOCUMENTS))
            .json_body(json!({
                "writes": [{
                    "update": {
                        "name": NAME,
                        "fields": {
                            "status": { "stringValue": "sent" },
                            "fcmMessageId": { "stringValue": "projects/p/messages/7" }
                        }
                    },
                    "updateMask": { "fieldPaths": ["fcmMessageId", "status"] },
                    "updateTransforms": [
                        { "fieldPath": "sentAt", "setToServerValue": "REQUEST_TIME" },
                        { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
                    ],
                    "currentDocument": { "updateTime": "2024-05-01T10:00:00.000000Z" }
                }]
            }));
        then.status(200).json_body(json!({
            "writeResults": [{
                "updateTime": "2024-05-01T10:00:05.000000Z",
                "transformResults": [
                    { "timestampValue": "2024-05-01T10:00:05.000000Z" },
                    { "timestampValue": "2024-05-01T10:00:05.000000Z" }
                ]
            }],
            "commitTime": "2024-05-01T10:00:05.000000Z"
        }));
    });

    let update = StatusUpdate::sent("projects/p/messages/7");
    let result = db
        .doc("notifications/n1")
        .unwrap()
        .update(
            &update,
            update.server_timestamps(),
            Precondition::last_updated_at("2024-05-01T10:00:00.000000Z"),
        )
        .await
        .unwrap();

    commit_mock.assert();
    assert_eq!(result.update_time.as_deref(), Some("2024-05-01T10:00:05.000000Z"));
}

#[tokio::test]
async fn test_update_precondition_failure() {
    let server = MockServer::start();
    let db = firestore(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{}:commit", DOCUMENTS));
        then.status(400).json_body(json!({
            "error": {
                "code": 400,
                "message": "the stored version does not match the required base version",
                "status": "FAILED_PRECONDITION"
            }
        }));
    });

    let update = StatusUpdate::skipped("unsupported_target");
    let err = db
        .doc("notifications/n1")
        .unwrap()
        .update(&update, update.server_timestamps(), Precondition::must_exist())
        .await
        .unwrap_err();

    assert!(matches!(err, FirestoreError::PreconditionFailed(_)));
}

#[tokio::test]
async fn test_update_api_error() {
    let server = MockServer::start();
    let db = firestore(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{}:commit", DOCUMENTS));
        then.status(403).json_body(json!({
            "error": {
                "code": 403,
                "message": "Missing or insufficient permissions.",
                "status": "PERMISSION_DENIED"
            }
        }));
    });

    let update = StatusUpdate::failed("boom");
    let err = db
        .doc("notifications/n1")
        .unwrap()
        .update(&update, update.server_timestamps(), Precondition::must_exist())
        .await
        .unwrap_err();

    match err {
        FirestoreError::ApiError(msg) => {
            assert_eq!(msg, "Missing or insufficient permissions. (code: 403)")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_document_paths() {
    let server = MockServer::start();
    let db = firestore(&server);

    let doc = db.doc("/notifications/n1/").unwrap();
    assert_eq!(doc.name(), NAME);
    assert_eq!(doc.id(), "n1");

    let nested = db.doc("users/u1/notifications/n2").unwrap();
    assert_eq!(
        nested.name(),
        "projects/p/databases/(default)/documents/users/u1/notifications/n2"
    );

    assert!(matches!(db.doc("notifications"), Err(FirestoreError::InvalidPath(_))));
    assert!(matches!(db.doc(""), Err(FirestoreError::InvalidPath(_))));
    assert!(matches!(db.doc("a//b"), Err(FirestoreError::InvalidPath(_))));
}

#[test]
fn test_base_url_must_name_a_database() {
    let client = || ClientBuilder::new(Client::new()).build();

    let db = FirebaseFirestore::new_with_client(
        client(),
        "http://localhost:8080/v1/projects/p/databases/(default)/documents/".to_string(),
    )
    .unwrap();
    assert_eq!(db.doc("notifications/n1").unwrap().name(), NAME);

    for url in [
        "http://localhost:8080/v1/documents",
        "http://localhost:8080/v1/projects/p/databases/(default)",
        "http://localhost:8080/v1/projects//databases/(default)/documents",
    ] {
        assert!(matches!(
            FirebaseFirestore::new_with_client(client(), url.to_string()),
            Err(FirestoreError::InvalidBaseUrl(_))
        ));
    }
}

#[test]
fn test_non_finite_doubles_on_the_wire() {
    let doc: Document = serde_json::from_value(json!({
        "name": NAME,
        "fields": {
            "nan": { "doubleValue": "NaN" },
            "inf": { "doubleValue": "Infinity" },
            "neg": { "doubleValue": "-Infinity" },
            "whole": { "doubleValue": 3 },
            "half": { "doubleValue": 0.5 }
        }
    }))
    .unwrap();

    let double = |name: &str| match doc.fields[name].value_type {
        ValueType::DoubleValue(d) => d,
        ref other => panic!("unexpected value: {:?}", other),
    };
    assert!(double("nan").is_nan());
    assert_eq!(double("inf"), f64::INFINITY);
    assert_eq!(double("neg"), f64::NEG_INFINITY);
    assert_eq!(double("whole"), 3.0);
    assert_eq!(double("half"), 0.5);

    assert_eq!(
        serde_json::to_value(Value::from(ValueType::DoubleValue(f64::NEG_INFINITY))).unwrap(),
        json!({ "doubleValue": "-Infinity" })
    );
    assert_eq!(
        serde_json::to_value(Value::from(ValueType::DoubleValue(0.5))).unwrap(),
        json!({ "doubleValue": 0.5 })
    );

    let bad: Result<Document, _> =
        serde_json::from_value(json!({ "fields": { "x": { "doubleValue": "lots" } } }));
    assert!(bad.is_err());
}
