//! Tests for the HTTP source module

use super::*;
use crate::error::Error;
use crate::http::{HttpClientConfig, RequestBody};
use crate::pagination::{PageFetcher, PageRequest};
use crate::schema::{FieldDiscovery, FieldKind};
use crate::sources::load_source;
use crate::template::TemplateContext;
use crate::types::QueryDescriptor;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openalex(server: &MockServer) -> HttpSource {
    let mut config = load_source("openalex-works").unwrap();
    config.base_url = server.uri();
    HttpSource::with_client_config(config, HttpClientConfig::default(), &TemplateContext::new())
        .unwrap()
}

fn dsl(server: &MockServer) -> HttpSource {
    let mut config = load_source("dsl-publications").unwrap();
    config.base_url = server.uri();
    let ctx = TemplateContext::new().with_env("DIMENSIONS_TOKEN", "tok");
    HttpSource::with_client_config(config, HttpClientConfig::default(), &ctx).unwrap()
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extract_paths() {
    let body = json!({
        "meta": {"count": 42, "next_cursor": "abc", "total": "17"},
        "data": [{"items": [1, 2]}, {"items": [3]}],
        "results": [{"id": "W1"}, {"id": "W2"}]
    });

    assert_eq!(extract_path(&body, "meta.count"), Some(json!(42)));
    assert_eq!(extract_path(&body, "$.meta.next_cursor"), Some(json!("abc")));
    assert_eq!(extract_path(&body, "data[0].items"), Some(json!([1, 2])));
    assert_eq!(extract_path(&body, "data[-1].items"), Some(json!([3])));
    assert_eq!(extract_path(&body, "missing.path"), None);
    assert_eq!(extract_count(&body, "meta.count"), Some(42));
    assert_eq!(extract_count(&body, "meta.total"), Some(17));
    assert_eq!(extract_string(&body, "meta.next_cursor").as_deref(), Some("abc"));
    assert_eq!(extract_string(&body, "meta.count"), None);
}

#[test]
fn test_extract_records() {
    let body = json!({"results": [{"id": 1}, {"id": 2}], "empty": null});

    let records = extract_records(&body, Some("results")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["id"], json!(2));

    assert!(extract_records(&body, Some("empty")).unwrap().is_empty());
    assert!(extract_records(&body, Some("absent")).unwrap().is_empty());

    let whole = extract_records(&json!([{"a": 1}]), None).unwrap();
    assert_eq!(whole.len(), 1);
}

#[test]
fn test_extract_records_wildcard() {
    let body = json!({"hits": [{"doc": {"id": 1}}, {"doc": {"id": 2}}]});
    let records = extract_records(&body, Some("$.hits[*].doc")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], json!(1));
}

#[test]
fn test_extract_records_rejects_scalars() {
    let body = json!({"results": [{"id": 1}, "oops"]});
    let err = extract_records(&body, Some("results")).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.to_string().contains("record 1"));
}

// ============================================================================
// Definitions
// ============================================================================

#[test_case(
    "search publications return publications",
    "search publications return publications limit 1000 skip 0" ;
    "no paging clauses"
)]
#[test_case(
    "search publications return publications limit 20 skip 40",
    "search publications return publications limit 1000 skip 0" ;
    "existing clauses stripped"
)]
#[test_case(
    "search publications LIMIT 5 return publications",
    "search publications return publications limit 1000 skip 0" ;
    "case insensitive"
)]
fn test_dsl_page_query(query: &str, expected: &str) {
    assert_eq!(dsl_page_query(query, 1000, 0), expected);
}

#[test]
fn test_cursor_source_requires_cursor_path() {
    let yaml = "name: x\nbase_url: http://localhost\npagination:\n  type: cursor\n";
    let err = SourceConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("cursor_path"));
}

#[test]
fn test_dsl_source_requires_post() {
    let yaml = "name: x\nbase_url: http://localhost\npagination:\n  type: offset\n  style: dsl\n";
    let err = SourceConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("POST"));
}

#[test]
fn test_invalid_base_url() {
    let yaml = "name: x\nbase_url: not a url\npagination:\n  type: offset\n";
    assert!(matches!(
        SourceConfig::from_yaml(yaml).unwrap_err(),
        Error::InvalidUrl(_)
    ));
}

#[test]
fn test_offset_defaults() {
    let yaml = "name: x\nbase_url: http://localhost\npagination:\n  type: offset\n";
    let config = SourceConfig::from_yaml(yaml).unwrap();
    assert_eq!(
        config.pagination,
        PaginationConfig::Offset {
            skip_param: "skip".to_string(),
            limit_param: "limit".to_string(),
            batch_size: 1000,
            api_max: 1000,
            style: RequestStyle::Params,
        }
    );
}

#[test]
fn test_missing_template_variable_fails_construction() {
    let config = load_source("dsl-publications").unwrap();
    let err =
        HttpSource::with_client_config(config, HttpClientConfig::default(), &TemplateContext::new())
            .unwrap_err();
    assert!(err.to_string().contains("env.DIMENSIONS_TOKEN"));
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_cursor_page_request_maps_descriptor() {
    let server = MockServer::start().await;
    let source = openalex(&server);

    let descriptor = QueryDescriptor::new("openalex-works")
        .with_query("graphene")
        .with_filter("publication_year:2020")
        .with_reference(FieldKind::Facet, "type")
        .with_param("mailto", "me@example.org");
    let request = PageRequest::Cursor {
        cursor: "*".to_string(),
        page_size: 200,
    };

    let req = source.page_request(&descriptor, &request).unwrap();

    let params: Vec<(&str, &str)> = req
        .query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        params,
        vec![
            ("search", "graphene"),
            ("filter", "publication_year:2020"),
            ("group_by", "type"),
            ("mailto", "me@example.org"),
            ("cursor", "*"),
            ("per_page", "200"),
        ]
    );
    assert!(req.body.is_none());
}

#[tokio::test]
async fn test_dsl_page_request_posts_query_text() {
    let server = MockServer::start().await;
    let source = dsl(&server);

    let descriptor = QueryDescriptor::new("dsl-publications")
        .with_query("search publications for \"graphene\" return publications limit 10");
    let request = PageRequest::Offset {
        skip: 2000,
        limit: 1000,
    };

    let req = source.page_request(&descriptor, &request).unwrap();
    match req.body {
        Some(RequestBody::Text(text)) => assert_eq!(
            text,
            "search publications for \"graphene\" return publications limit 1000 skip 2000"
        ),
        other => panic!("expected text body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dsl_request_needs_query() {
    let server = MockServer::start().await;
    let source = dsl(&server);
    let request = PageRequest::Offset { skip: 0, limit: 10 };
    let err = source
        .page_request(&QueryDescriptor::new("dsl-publications"), &request)
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn test_mismatched_request_kind() {
    let server = MockServer::start().await;
    let source = openalex(&server);
    let request = PageRequest::Offset { skip: 0, limit: 10 };
    let err = source
        .page_request(&QueryDescriptor::new("openalex-works"), &request)
        .unwrap_err();
    assert!(err.to_string().contains("cursor"));
}

#[tokio::test]
async fn test_fetch_cursor_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .and(query_param("per_page", "200"))
        .and(query_param("search", "graphene"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"count": 3, "next_cursor": "IlsxNjA5"},
            "results": [
                {"id": "W1", "authorships": [{"author": {"display_name": "Ada"}}]},
                {"id": "W2", "authorships": []}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = openalex(&server);
    let descriptor = QueryDescriptor::new("openalex-works").with_query("graphene");
    let request = PageRequest::Cursor {
        cursor: "*".to_string(),
        page_size: 200,
    };

    let page = source.fetch_page(&descriptor, &request).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page.records[0]["id"], json!("W1"));
    assert_eq!(page.meta.total_count, Some(3));
    assert_eq!(page.meta.next_cursor.as_deref(), Some("IlsxNjA5"));
}

#[tokio::test]
async fn test_fetch_last_cursor_page_has_no_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"count": 1, "next_cursor": null},
            "results": [{"id": "W1"}]
        })))
        .mount(&server)
        .await;

    let source = openalex(&server);
    let request = PageRequest::Cursor {
        cursor: "abc".to_string(),
        page_size: 200,
    };
    let page = source
        .fetch_page(&QueryDescriptor::new("openalex-works"), &request)
        .await
        .unwrap();

    assert_eq!(page.len(), 1);
    assert!(page.meta.next_cursor.is_none());
}

#[tokio::test]
async fn test_fetch_dsl_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dsl/v2"))
        .and(header("Authorization", "JWT tok"))
        .and(body_string(
            "search publications return publications limit 1000 skip 0",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_stats": {"total_count": 2},
            "publications": [{"id": "pub.1", "title": "A"}, {"id": "pub.2", "title": "B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = dsl(&server);
    let descriptor =
        QueryDescriptor::new("dsl-publications").with_query("search publications return publications");
    let request = PageRequest::Offset {
        skip: 0,
        limit: 1000,
    };

    let page = source.fetch_page(&descriptor, &request).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page.meta.total_count, Some(2));
    assert!(page.meta.next_cursor.is_none());
}

#[tokio::test]
async fn test_fetch_page_client_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .mount(&server)
        .await;

    let source = openalex(&server);
    let request = PageRequest::Cursor {
        cursor: "*".to_string(),
        page_size: 200,
    };
    let err = source
        .fetch_page(&QueryDescriptor::new("openalex-works"), &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_probe_discovery() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("group_by", "__invalid_field_to_get_valid_list__"))
        .and(query_param("per_page", "1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "Invalid query parameters error.",
            "message": "'__invalid_field_to_get_valid_list__' is not a valid field. Valid fields are type, publication_year, authorships.institutions.id."
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("select", "__invalid_field__"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "Invalid query parameters error.",
            "message": "__invalid_field__ is not a valid select field. Valid fields for select are: id, doi, title."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = openalex(&server);
    let schema = source.discover("openalex-works").await.unwrap();

    assert!(!schema.is_permissive());
    assert!(schema.allows(FieldKind::Facet, "publication_year"));
    assert!(schema.allows(FieldKind::Facet, "authorships.institutions.id"));
    assert!(!schema.allows(FieldKind::Facet, "year"));
    assert!(schema.allows(FieldKind::Select, "doi"));
    assert_eq!(schema.count(FieldKind::Select), 3);
}

#[tokio::test]
async fn test_probe_discovery_keeps_partial_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("group_by", "__invalid_field_to_get_valid_list__"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Valid fields are type, publication_year."
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("select", "__invalid_field__"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let source = openalex(&server);
    let schema = source.discover("openalex-works").await.unwrap();

    assert_eq!(schema.count(FieldKind::Facet), 2);
    // No select list learned: select stays unvalidated
    assert!(schema.valid_fields(FieldKind::Select).is_none());
    assert!(schema.allows(FieldKind::Select, "anything"));
}

#[tokio::test]
async fn test_probe_discovery_fails_when_nothing_learned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let source = openalex(&server);
    let err = source.discover("openalex-works").await.unwrap_err();
    assert!(matches!(err, Error::Discovery { .. }));
}

#[tokio::test]
async fn test_describe_discovery() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dsl/v2"))
        .and(body_string("describe source publications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fields": {
                "year": {"is_facet": true, "is_filter": true},
                "funders": {"is_facet": true, "is_filter": false},
                "title": {"is_filter": true},
                "abstract": {}
            },
            "metrics": [{"name": "count"}, "citations_total"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = dsl(&server);
    let schema = source.discover("dsl-publications").await.unwrap();

    assert!(schema.allows(FieldKind::Facet, "funders"));
    assert!(!schema.allows(FieldKind::Facet, "title"));
    assert!(schema.allows(FieldKind::Filter, "title"));
    assert_eq!(schema.count(FieldKind::Filter), 2);
    assert!(schema.allows(FieldKind::Metric, "citations_total"));
    assert!(schema.allows(FieldKind::Metric, "count"));
}

#[tokio::test]
async fn test_describe_failure_is_discovery_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/dsl/v2"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
        .mount(&server)
        .await;

    let source = dsl(&server);
    let err = source.discover("dsl-publications").await.unwrap_err();
    assert!(matches!(err, Error::Discovery { .. }));
    assert!(err.to_string().contains("expired token"));
}

#[tokio::test]
async fn test_source_without_discovery() {
    let yaml = "name: plain\nbase_url: http://localhost:1\npagination:\n  type: offset\n";
    let config = SourceConfig::from_yaml(yaml).unwrap();
    let source =
        HttpSource::with_client_config(config, HttpClientConfig::default(), &TemplateContext::new())
            .unwrap();

    assert!(matches!(
        source.discover("plain").await.unwrap_err(),
        Error::Discovery { .. }
    ));
}
