//! Integration tests for dataset and resource orchestration.

use ddh_client::{
    AttachStrategy, ClientError, DatasetRef, DeleteOutcome, Method, RequestBody, RetryConfig,
    HARVEST_ID_FIELD, UPLOAD_FIELD,
};
use ddh_codec::{FieldValue, Record};
use ddh_testkit::{
    path_text, sample_dataset, sample_resource, test_client, test_client_with, test_config,
    upload_file, FakeNodeServer,
};
use serde_json::{json, Value as Json};
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn posted_bodies(server: &FakeNodeServer) -> Vec<Json> {
    server
        .requests_with(Method::Post)
        .into_iter()
        .filter_map(|r| r.json().cloned())
        .collect()
}

#[test]
fn dataset_is_created_before_resources_in_order() {
    init_tracing();
    let client = test_client(FakeNodeServer::new());

    let created = client
        .create_dataset_with_resources(&sample_dataset("WB-1", 3), None)
        .unwrap();

    assert_eq!(created.nid, "1001");
    assert_eq!(created.id.as_deref(), Some("WB-1"));
    let nids: Vec<&str> = created.resources.iter().map(|r| r.nid.as_str()).collect();
    assert_eq!(nids, ["1002", "1003", "1004"]);
    assert_eq!(created.resources[2].title.as_deref(), Some("Resource 2"));
    assert_eq!(created.attach_report, None);

    let bodies = posted_bodies(client.transport());
    assert_eq!(bodies.len(), 4);
    assert_eq!(bodies[0]["title"], "Dataset WB-1");
    for (weight, body) in bodies[1..].iter().enumerate() {
        assert_eq!(body["title"], format!("Resource {}", weight));
        assert_eq!(body["field_dataset_ref"], json!({"und": [{"target_id": "1001"}]}));
        assert_eq!(body["field_resource_weight"], json!({"und": [{"value": weight}]}));
    }
}

#[test]
fn resources_keep_caller_order_when_nids_run_backwards() {
    let client = test_client(FakeNodeServer::new().with_descending_nids());

    let created = client
        .create_dataset_with_resources(&sample_dataset("WB-1b", 3), None)
        .unwrap();

    assert_eq!(created.nid, "2000");
    let titles: Vec<&str> = created
        .resources
        .iter()
        .filter_map(|r| r.title.as_deref())
        .collect();
    assert_eq!(titles, ["Resource 0", "Resource 1", "Resource 2"]);
    let nids: Vec<&str> = created.resources.iter().map(|r| r.nid.as_str()).collect();
    assert_eq!(nids, ["1999", "1998", "1997"]);

    for (weight, resource) in created.resources.iter().enumerate() {
        let stored = client.transport().node(&resource.nid).unwrap();
        assert_eq!(stored["title"], format!("Resource {}", weight));
        assert_eq!(stored["field_resource_weight"], json!({"und": [{"value": weight}]}));
    }
}

#[test]
fn dataset_payload_is_encoded_without_resources() {
    let client = test_client(FakeNodeServer::new());
    client
        .create_dataset_with_resources(&sample_dataset("WB-2", 1), None)
        .unwrap();

    let dataset = &posted_bodies(client.transport())[0];
    assert!(dataset.get("resources").is_none());
    assert_eq!(dataset["type"], "dataset");
    assert_eq!(
        dataset["field_wbddh_country"],
        json!({"und": [{"tid": 101}, {"tid": 102}]})
    );
    assert_eq!(
        dataset["field_tags"],
        json!({"und": [{"tid": 401}, {"tid": 402}]})
    );
    assert_eq!(dataset["body"], json!({"und": [{"value": "A sample dataset."}]}));
    assert_eq!(
        dataset["field_wbddh_release_date"]["und"][0]["value"],
        "2019-03-01 00:00:00"
    );
    assert_eq!(
        dataset[HARVEST_ID_FIELD],
        json!({"und": [{"value": "WB-2"}]})
    );
}

#[test]
fn mutating_requests_carry_session_credentials() {
    let client = test_client(FakeNodeServer::new());
    let created = client
        .create_dataset_with_resources(&sample_dataset("WB-3", 1), None)
        .unwrap();
    client.update_dataset(&created.nid, &Record::new().with("title", "Renamed")).unwrap();
    client.delete(&created.resources[0].nid).unwrap();

    for request in client.transport().requests() {
        assert!(request.method.is_mutating());
        assert_eq!(request.header("X-CSRF-Token"), Some("csrf-token"));
        assert_eq!(
            request.cookies,
            vec![("SESSabc".to_string(), "cookie-value".to_string())]
        );
    }
}

#[test]
fn resource_failure_reports_partial_dataset() {
    init_tracing();
    let client = test_client(FakeNodeServer::new().failing_title("Resource 1"));

    let err = client
        .create_dataset_with_resources(&sample_dataset("WB-4", 3), None)
        .unwrap_err();

    let created = err.partial_dataset().expect("partial dataset");
    assert_eq!(created.nid, "1001");
    assert_eq!(created.resources.len(), 1);
    assert_eq!(created.resources[0].title.as_deref(), Some("Resource 0"));
    assert_eq!(err.api_id(), Some("Resource 1"));

    // no rollback, and nothing after the failing resource
    assert_eq!(client.transport().node_count(), 2);
    assert_eq!(client.transport().requests().len(), 3);
}

#[test]
fn failing_resource_is_named_by_harvest_id_first() {
    let client = test_client(FakeNodeServer::new().failing_title("Broken"));
    let resource = sample_resource("Broken").with(HARVEST_ID_FIELD, "R-99");
    let dataset = sample_dataset("WB-5", 0).with(
        "resources",
        FieldValue::List(vec![FieldValue::Map(resource)]),
    );

    let err = client.create_dataset_with_resources(&dataset, None).unwrap_err();
    assert_eq!(err.api_id(), Some("R-99"));
    match err {
        ClientError::PartialDataset { source, .. } => {
            assert!(matches!(*source, ClientError::Api { ref operation, .. } if operation == "resource"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dataset_failure_creates_nothing_else() {
    let client = test_client(FakeNodeServer::new().failing_title("Dataset WB-6"));
    let err = client
        .create_dataset_with_resources(&sample_dataset("WB-6", 2), None)
        .unwrap_err();

    assert!(err.partial_dataset().is_none());
    assert_eq!(
        err.to_string(),
        "dataset failed for WB-6: <html>Internal Server Error</html>"
    );
    assert_eq!(client.transport().requests().len(), 1);
}

#[test]
fn explicit_id_overrides_harvest_id() {
    let client = test_client(FakeNodeServer::new().failing_title("Dataset WB-7"));
    let err = client
        .create_dataset(&sample_dataset("WB-7", 0), Some("caller-id"))
        .unwrap_err();
    assert_eq!(err.api_id(), Some("caller-id"));
}

#[test]
fn upload_is_attached_after_resource_creation() {
    init_tracing();
    let client = test_client(FakeNodeServer::new());
    let dataset = client.create_dataset(&sample_dataset("WB-8", 0), None).unwrap();

    let file = upload_file(b"year,value\n2019,1\n");
    let resource = sample_resource("With file").with(UPLOAD_FIELD, path_text(file.path()));
    let nid = client.append_resource(dataset.as_str(), &resource, None).unwrap();

    let requests = client.transport().requests_with(Method::Post);
    assert_eq!(requests.len(), 3);

    let create = requests[1].json().unwrap();
    assert!(create.get(UPLOAD_FIELD).is_none());
    assert!(create.get("field_resource_weight").is_none());

    let attach = &requests[2];
    assert_eq!(attach.path(), format!("/api/dataset/node/{}/attach_file", nid));
    let RequestBody::Multipart(parts) = &attach.body else {
        panic!("attach must be multipart");
    };
    let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["files[1]", "field_name", "attach"]);
    assert_eq!(parts[0].content, b"year,value\n2019,1\n");
    assert_eq!(parts[1].content, b"field_upload");
    assert_eq!(parts[2].content, b"1");
    assert_eq!(client.stats().files_attached, 1);
}

#[test]
fn attach_failure_names_created_resource() {
    let client = test_client(FakeNodeServer::new().failing_attach());
    let file = upload_file(b"data");
    let resource = sample_resource("Doc").with(UPLOAD_FIELD, path_text(file.path()));

    let err = client
        .append_resource(
            DatasetRef::Known { id: Some("WB-9".into()), nid: "77".into() },
            &resource,
            Some(0),
        )
        .unwrap_err();

    match err {
        ClientError::AttachFile { resource_nid, id, .. } => {
            assert_eq!(resource_nid, "1001");
            assert_eq!(id, "Doc");
        }
        other => panic!("unexpected error: {other}"),
    }
    // the resource stays
    assert!(client.transport().node("1001").is_some());
}

#[test]
fn missing_upload_fails_before_any_request() {
    let client = test_client(FakeNodeServer::new());
    let resource = sample_resource("Ghost").with(UPLOAD_FIELD, "/nonexistent/ddh/upload.csv");

    let err = client.append_resource("12", &resource, None).unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
    assert!(client.transport().requests().is_empty());
}

#[test]
fn update_defaults_to_published() {
    let client = test_client(FakeNodeServer::new());
    let nid = client.create_dataset(&sample_dataset("WB-10", 0), None).unwrap();

    let returned = client
        .update_dataset(&nid, &Record::new().with("field_wbddh_modified_date", "15-Jun-2021"))
        .unwrap();
    assert_eq!(returned, nid);

    let node = client.transport().node(&nid).unwrap();
    assert_eq!(node["moderation_next_state"], "published");
    assert_eq!(
        node["field_wbddh_modified_date"]["und"][0]["value"],
        "2021-06-15 00:00:00"
    );
}

#[test]
fn update_of_unknown_node_is_an_api_error() {
    let client = test_client(FakeNodeServer::new());
    let err = client.update_dataset("404", &Record::new()).unwrap_err();
    assert!(matches!(err, ClientError::Api { ref operation, ref id, .. } if operation == "put" && id == "404"));
}

#[test]
fn delete_outcomes() {
    let client = test_client(FakeNodeServer::new());
    let nid = client.create_dataset(&sample_dataset("WB-11", 0), None).unwrap();

    let first = client.delete(&nid).unwrap();
    assert_eq!(first, DeleteOutcome::Deleted);
    assert_eq!(first.to_string(), "OK");

    let second = client.delete(&nid).unwrap();
    assert_eq!(second, DeleteOutcome::Refused(json!("Node not found")));
    assert!(!second.is_deleted());

    let delete = &client.transport().requests_with(Method::Delete)[0];
    assert_eq!(delete.json(), Some(&json!({})));
}

#[test]
fn get_node_by_nid_or_url() {
    let client = test_client(FakeNodeServer::new());
    let nid = client.create_dataset(&sample_dataset("WB-12", 0), None).unwrap();

    let node = client.get_node(&nid, "node").unwrap().unwrap();
    assert_eq!(node["nid"], nid.as_str());

    let url = format!("https://ddh.test/api/dataset/node/{}", nid);
    assert!(client.get_node(&url, "node").unwrap().is_some());
    assert!(client.get_node("999", "node").unwrap().is_none());

    let requests = client.transport().requests_with(Method::Get);
    assert_eq!(requests[0].url, url);
}

#[test]
fn resilience_mode_accepts_trailing_notices() {
    let strict = test_client(FakeNodeServer::new().with_trailing_notice());
    assert!(matches!(
        strict.create_dataset(&sample_dataset("WB-13", 0), None),
        Err(ClientError::Api { .. })
    ));

    let resilient = test_client_with(
        test_config().with_resilience_mode(true),
        FakeNodeServer::new().with_trailing_notice(),
    );
    let created = resilient
        .create_dataset_with_resources(&sample_dataset("WB-13", 2), None)
        .unwrap();
    assert_eq!(created.resources.len(), 2);
}

#[test]
fn post_hoc_links_resources_in_one_update() {
    let client = test_client_with(
        test_config().with_attach_strategy(AttachStrategy::PostHoc),
        FakeNodeServer::new(),
    );
    let dataset = sample_dataset("WB-14", 2).with("moderation_next_state", "draft");
    let created = client.create_dataset_with_resources(&dataset, None).unwrap();

    let puts = client.transport().requests_with(Method::Put);
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].path(), format!("/api/dataset/node/{}", created.nid));
    assert_eq!(
        puts[0].json().unwrap(),
        &json!({
            "moderation_next_state": "draft",
            "field_resources": {"und": [{"target_id": "1002"}, {"target_id": "1003"}]}
        })
    );
}

#[test]
fn post_hoc_single_sends_one_update_per_resource() {
    let client = test_client_with(
        test_config().with_attach_strategy(AttachStrategy::PostHocSingle),
        FakeNodeServer::new(),
    );
    client
        .create_dataset_with_resources(&sample_dataset("WB-15", 3), None)
        .unwrap();

    let puts = client.transport().requests_with(Method::Put);
    assert_eq!(puts.len(), 3);
    assert_eq!(
        puts[1].json().unwrap()["field_resources"],
        json!({"und": [{"target_id": "Resource 1 (1003)"}]})
    );
    assert_eq!(puts[1].json().unwrap()["moderation_next_state"], "draft");
}

#[test]
fn post_hoc_single_failure_keeps_created_resources() {
    let client = test_client_with(
        test_config().with_attach_strategy(AttachStrategy::PostHocSingle),
        FakeNodeServer::new().dropping_puts(1),
    );
    let err = client
        .create_dataset_with_resources(&sample_dataset("WB-16", 2), None)
        .unwrap_err();

    assert_eq!(err.partial_dataset().unwrap().resources.len(), 2);
}

#[test]
fn repeated_attach_tolerates_and_records_failures() {
    init_tracing();
    let client = test_client_with(
        test_config().with_attach_strategy(AttachStrategy::PostHocRepeated),
        FakeNodeServer::new().dropping_puts(2),
    );

    let created = client
        .create_dataset_with_resources(&sample_dataset("WB-17", 3), None)
        .unwrap();

    let report = created.attach_report.expect("attach report");
    assert_eq!(report.attempts, 3);
    assert_eq!(report.failures.len(), 2);
    assert!(!report.is_clean());
    assert!(report.failures[0].contains("connection reset"));

    let puts = client.transport().requests_with(Method::Put);
    assert_eq!(puts.len(), 3);
    assert_eq!(
        puts[0].json().unwrap()["field_resources"]["und"][0]["target_id"],
        "Resource 0 (1002)"
    );
}

#[test]
fn repeated_attach_is_bounded_by_retry_attempts() {
    let config = test_config()
        .with_attach_strategy(AttachStrategy::PostHocRepeated)
        .with_retry(RetryConfig::new(2).with_initial_delay(Duration::ZERO));
    let client = test_client_with(config, FakeNodeServer::new());

    let created = client
        .create_dataset_with_resources(&sample_dataset("WB-18", 5), None)
        .unwrap();

    let report = created.attach_report.unwrap();
    assert_eq!(report.attempts, 2);
    assert!(report.is_clean());
    assert_eq!(client.transport().requests_with(Method::Put).len(), 2);
}

#[test]
fn stats_track_created_nodes() {
    let client = test_client(FakeNodeServer::new());
    client
        .create_dataset_with_resources(&sample_dataset("WB-19", 2), None)
        .unwrap();

    let stats = client.stats();
    assert_eq!(stats.datasets_created, 1);
    assert_eq!(stats.resources_created, 2);
    assert_eq!(stats.requests, 3);
    assert!(stats.last_error.is_none());
}
