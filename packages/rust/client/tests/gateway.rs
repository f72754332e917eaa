//! HTTP-level tests for the search gateway against a mock wiki.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wikisync_client::{RetryPolicy, WikiClient};
use wikisync_shared::{AttachmentRef, Credentials, WikiSyncError};

const REL_PAGE: &str = "http://www.xwiki.org/rel/page";

fn client_for(server: &MockServer) -> WikiClient {
    WikiClient::new(
        &server.uri(),
        Credentials {
            username: "syncbot".into(),
            password: "secret".into(),
        },
    )
    .expect("client")
}

/// Retry policy with a single attempt, for tests exercising drop behavior.
fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        base_delay: Duration::from_millis(1),
        multiplier: 2,
        max_delay: Duration::from_millis(1),
    }
}

/// Mount the page-detail and content endpoints for one resolvable page.
async fn mount_page(server: &MockServer, space: &str, page: &str, modified_ms: i64) -> String {
    let detail_path = format!("/rest/wikis/xwiki/spaces/{space}/pages/{page}");
    let view_url = format!("{}/bin/view/{space}/{page}", server.uri());

    Mock::given(method("GET"))
        .and(path(detail_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("xwiki:{space}.{page}"),
            "fullName": format!("{space}.{page}"),
            "xwikiAbsoluteUrl": view_url,
            "modified": modified_ms,
            "attachments": { "attachments": [] },
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/bin/get/{space}/{page}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body><p>{space} body text</p></body></html>")),
        )
        .mount(server)
        .await;

    format!("{}{detail_path}", server.uri())
}

fn hit(language: &str, detail_url: &str) -> serde_json::Value {
    json!({
        "language": language,
        "links": [ { "rel": REL_PAGE, "href": detail_url } ],
    })
}

#[tokio::test]
async fn search_sends_pagination_and_ordering_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .and(query_param("type", "solr"))
        .and(query_param("start", "40"))
        .and(query_param("number", "25"))
        .and(query_param("distinct", "true"))
        .and(query_param("orderField", "date"))
        .and(query_param("order", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "searchResults": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (records, raw) = client
        .query_pages(None, None, None, true, None, 40, 25)
        .await
        .expect("query");

    assert!(records.is_empty());
    assert_eq!(raw, 0);
}

#[tokio::test]
async fn explicit_wiki_takes_precedence_over_root_page_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .and(query_param("wikis", "explicit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "searchResults": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .query_pages(
            Some("explicit"),
            Some("other:Sandbox.WebHome"),
            None,
            true,
            None,
            0,
            500,
        )
        .await
        .expect("query");
}

#[tokio::test]
async fn translations_are_dropped_but_counted_in_raw_hits() {
    let server = MockServer::start().await;
    let detail_url = mount_page(&server, "Sandbox", "WebHome", 1_700_000_000_000).await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchResults": [ hit("", &detail_url), hit("fr", &detail_url) ],
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (records, raw) = client
        .query_pages(None, None, None, true, None, 0, 500)
        .await
        .expect("query");

    assert_eq!(raw, 2);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "xwiki:Sandbox.WebHome");
    assert_eq!(records[0].full_name, "Sandbox.WebHome");
    assert_eq!(records[0].modified_ms, 1_700_000_000_000);
    assert!(records[0].content.contains("Sandbox body text"));
}

#[tokio::test]
async fn unresolvable_hits_are_dropped_without_failing_the_batch() {
    let server = MockServer::start().await;
    let good_detail = mount_page(&server, "Main", "WebHome", 1_700_000_100_000).await;
    let dead_detail = format!("{}/rest/wikis/xwiki/spaces/Gone/pages/WebHome", server.uri());
    // No mock behind dead_detail: wiremock answers 404.

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchResults": [
                hit("", &dead_detail),
                { "language": "" },          // no detail link at all
                hit("", &good_detail),
            ],
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry(no_retry());
    let (records, raw) = client
        .query_pages(None, None, None, true, None, 0, 500)
        .await
        .expect("query");

    assert_eq!(raw, 3);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].full_name, "Main.WebHome");
}

#[tokio::test]
async fn auth_failure_surfaces_immediately_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .query_pages(None, None, None, true, None, 0, 500)
        .await
        .unwrap_err();

    assert!(matches!(err, WikiSyncError::Auth(_)));
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "searchResults": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        multiplier: 2,
        max_delay: Duration::from_millis(20),
    });

    let (records, raw) = client
        .query_pages(None, None, None, true, None, 0, 500)
        .await
        .expect("query should succeed after retry");

    assert!(records.is_empty());
    assert_eq!(raw, 0);
}

#[tokio::test]
async fn attachment_download_returns_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bin/download/Sandbox/WebHome/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"release notes".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let attachment = AttachmentRef {
        name: "notes.txt".into(),
        size: Some(13),
        mime_type: Some("text/plain".into()),
        download_path: "/bin/download/Sandbox/WebHome/notes.txt".into(),
        version: None,
        digest: None,
    };

    let bytes = client
        .download_attachment(&attachment)
        .await
        .expect("download");
    assert_eq!(bytes, b"release notes");
}

#[tokio::test]
async fn attachments_are_parsed_from_page_detail() {
    let server = MockServer::start().await;
    let detail_path = "/rest/wikis/xwiki/spaces/Docs/pages/Guide";
    let view_url = format!("{}/bin/view/Docs/Guide", server.uri());

    Mock::given(method("GET"))
        .and(path(detail_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "xwiki:Docs.Guide",
            "fullName": "Docs.Guide",
            "xwikiAbsoluteUrl": view_url,
            "modified": 1_700_000_200_000i64,
            "attachments": { "attachments": [
                { "name": "diagram.png", "size": 2048, "mimeType": "image/png",
                  "download": "/bin/download/Docs/Guide/diagram.png", "version": "2.1" },
                { "name": "notes.txt", "size": 64, "mimeType": "text/plain",
                  "download": "/bin/download/Docs/Guide/notes.txt" },
            ]},
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bin/get/Docs/Guide"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>guide</p>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/wikis/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchResults": [ hit("", &format!("{}{detail_path}", server.uri())) ],
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (records, _) = client
        .query_pages(None, None, None, true, None, 0, 500)
        .await
        .expect("query");

    assert_eq!(records.len(), 1);
    let attachments = &records[0].attachments;
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].name, "diagram.png");
    assert_eq!(attachments[0].mime_type.as_deref(), Some("image/png"));
    assert_eq!(attachments[1].size, Some(64));
}
