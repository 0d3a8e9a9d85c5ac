//! Search pagination tests against the fake node server.

use ddh_client::{
    ClientConfig, ClientError, HttpResponse, Method, MockTransport, ObjectType, SearchCursor,
    SearchQuery,
};
use ddh_codec::{CodecError, Record};
use ddh_testkit::{test_client, test_client_with, test_config, FakeNodeServer};
use serde_json::json;
use std::collections::BTreeSet;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn drain(count: u64) -> (Vec<String>, usize) {
    let client = test_client(FakeNodeServer::new().with_search_results(count));
    let nids: Vec<String> = client
        .search(SearchQuery::new())
        .unwrap()
        .map(|hit| hit.unwrap().0)
        .collect();
    let pages = client.transport().requests_with(Method::Get).len();
    (nids, pages)
}

#[test]
fn yields_every_record_once_across_page_boundaries() {
    init_tracing();

    for (count, expected_pages) in [(0, 1), (1, 1), (249, 1), (250, 1), (251, 2), (500, 2)] {
        let (nids, pages) = drain(count);
        assert_eq!(nids.len() as u64, count, "count {}", count);
        assert_eq!(pages, expected_pages, "pages for count {}", count);

        let unique: BTreeSet<&String> = nids.iter().collect();
        assert_eq!(unique.len(), nids.len(), "duplicates for count {}", count);
    }
}

#[test]
fn preserves_server_order_within_pages() {
    let (nids, _) = drain(12);
    let expected: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
    assert_eq!(nids, expected);
}

#[test]
fn page_requests_carry_query_parameters() {
    let client = test_client(FakeNodeServer::new().with_search_results(300));
    let query = SearchQuery::new()
        .with_condition("field_country", "Kenya")
        .fields(["created", "changed"])
        .object_type(ObjectType::Resource);
    assert_eq!(client.search(query).unwrap().count(), 300);

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    let first = &requests[0];
    assert_eq!(first.path(), "/search-service/search_api/datasets");
    assert_eq!(first.query_param("filter[field_wbddh_country]"), Some("101"));
    assert_eq!(first.query_param("type"), Some("resource"));
    assert_eq!(first.query_param("fields"), Some("[nid,title,created,changed,]"));
    assert_eq!(first.query_param("limit"), Some("250"));
    assert_eq!(first.query_param("offset"), Some("0"));
    assert_eq!(requests[1].query_param("offset"), Some("250"));
}

#[test]
fn unresolved_filter_label_fails_before_any_request() {
    let client = test_client(FakeNodeServer::new().with_search_results(5));
    let query = SearchQuery::new().with_condition("field_country", "Atlantis");

    let err = client.search(query).err().expect("search should fail");
    match err {
        ClientError::Codec(CodecError::UnresolvedTerm { field, value }) => {
            assert_eq!(field, "field_country");
            assert_eq!(value, "Atlantis");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(client.transport().requests().is_empty());
}

#[test]
fn cursor_resumes_where_iteration_stopped() {
    let client = test_client(FakeNodeServer::new().with_search_results(500));

    let mut iter = client.search(SearchQuery::new()).unwrap();
    let first: Vec<String> = iter.by_ref().take(300).map(|h| h.unwrap().0).collect();
    let cursor = iter.cursor();
    assert_eq!(cursor, SearchCursor { offset: 300, total: Some(500) });
    assert_eq!(first.last().map(String::as_str), Some("300"));

    // cursors survive a round trip through storage
    let saved = serde_json::to_string(&cursor).unwrap();
    let cursor: SearchCursor = serde_json::from_str(&saved).unwrap();

    let rest: Vec<String> = client
        .resume_search(SearchQuery::new(), cursor)
        .unwrap()
        .map(|h| h.unwrap().0)
        .collect();
    assert_eq!(rest.len(), 200);
    assert_eq!(rest.first().map(String::as_str), Some("301"));
}

#[test]
fn exhausted_cursor_sends_nothing() {
    let client = test_client(FakeNodeServer::new().with_search_results(5));
    let cursor = SearchCursor { offset: 5, total: Some(5) };
    assert_eq!(client.resume_search(SearchQuery::new(), cursor).unwrap().count(), 0);
    assert!(client.transport().requests().is_empty());
}

#[test]
fn empty_page_ends_iteration_before_reported_total() {
    init_tracing();
    let client = test_client_with(
        test_config().with_page_size(2),
        FakeNodeServer::new().with_search_results(3).with_reported_total(10),
    );

    let iter = client.search(SearchQuery::new()).unwrap();
    let hits: Vec<_> = iter.collect();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(Result::is_ok));
    // two full-or-partial pages, then the empty one
    assert_eq!(client.transport().requests().len(), 3);
}

fn mock_client(transport: MockTransport) -> ddh_client::Client<MockTransport> {
    ddh_client::Client::new(
        ClientConfig::new("ddh.test").with_page_size(2),
        ddh_client::Session::anonymous(),
        transport,
        std::sync::Arc::new(ddh_codec::NoTaxonomy),
    )
}

#[test]
fn empty_list_result_with_zero_count_yields_nothing() {
    let transport = MockTransport::new();
    transport.push_json(json!({ "count": 0, "result": [] }));
    let client = mock_client(transport);

    let hits: Vec<_> = client.search(SearchQuery::new()).unwrap().collect();
    assert!(hits.is_empty());
    assert_eq!(client.transport().requests().len(), 1);
}

#[test]
fn empty_list_result_mid_stream_stops_iteration() {
    init_tracing();
    let transport = MockTransport::new();
    transport.push_json(json!({
        "count": 4,
        "result": { "7": {"nid": "7"}, "8": {"nid": "8"} }
    }));
    transport.push_json(json!({ "count": 4, "result": [] }));
    let client = mock_client(transport);

    let nids: Vec<String> = client
        .search(SearchQuery::new())
        .unwrap()
        .map(|hit| hit.unwrap().0)
        .collect();
    assert_eq!(nids, ["7", "8"]);
    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].query_param("offset"), Some("2"));
}

#[test]
fn error_is_yielded_once_and_ends_iteration() {
    let transport = MockTransport::new();
    transport.push_json(json!({
        "count": 4,
        "result": { "1": {"nid": "1"}, "2": {"nid": "2"} }
    }));
    transport.push_response(HttpResponse::new(502, "<html>Bad Gateway</html>"));

    let client = mock_client(transport);

    let mut iter = client.search(SearchQuery::from(Record::new())).unwrap();
    assert_eq!(iter.next().unwrap().unwrap().0, "1");
    assert_eq!(iter.next().unwrap().unwrap().0, "2");

    let err = iter.next().unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Api { ref operation, .. } if operation == "search"));
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
    assert_eq!(client.transport().requests().len(), 2);
}

#[test]
fn resilience_mode_tolerates_trailing_notices() {
    let strict = test_client(FakeNodeServer::new().with_search_results(3).with_trailing_notice());
    let first = strict.search(SearchQuery::new()).unwrap().next().unwrap();
    assert!(first.is_err());

    let resilient = test_client_with(
        test_config().with_resilience_mode(true),
        FakeNodeServer::new().with_search_results(3).with_trailing_notice(),
    );
    let hits: Vec<_> = resilient
        .search(SearchQuery::new())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn hits_carry_returned_fields() {
    let client = test_client(FakeNodeServer::new().with_search_results(2));
    let (nid, record) = client.search(SearchQuery::new()).unwrap().next().unwrap().unwrap();
    assert_eq!(nid, "1");
    assert_eq!(record.get_text("title"), Some("Dataset 1"));
    assert_eq!(client.stats().pages_fetched, 1);
}
