use instafeed::api::{ApiClient, ClientOptions};
use instafeed::retry::RetryPolicy;
use instafeed::{Credentials, RemoteItem};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

type Delays = Arc<Mutex<Vec<Duration>>>;

fn options(uri: &str, retry: RetryPolicy) -> ClientOptions {
    ClientOptions::default()
        .with_base_endpoint(format!("{}/", uri))
        .with_timeout(Duration::from_secs(5))
        .with_retry(retry)
        .with_nonce_generator(|| "test_nonce".into())
        .with_timestamp_generator(|| "1234567890".into())
}

fn client_with_token(uri: &str, retry: RetryPolicy) -> (ApiClient, Delays) {
    let creds = Credentials::new("test_key", "test_secret").with_token("tok", "tok_secret");
    let delays: Delays = Arc::new(Mutex::new(Vec::new()));
    let recorded = delays.clone();
    let client = ApiClient::new(creds, options(uri, retry))
        .unwrap()
        .with_sleeper(move |d| recorded.lock().unwrap().push(d));
    (client, delays)
}

fn form(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

#[tokio::test]
async fn test_acquire_token_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("oauth_token=test_token&oauth_token_secret=test_secret"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (result, expected_auth) = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(
            Credentials::new("test_key", "test_secret"),
            options(&uri, RetryPolicy::default()),
        )
        .unwrap();

        let params = BTreeMap::from([
            ("x_auth_username".to_string(), "testuser".to_string()),
            ("x_auth_password".to_string(), "testpass".to_string()),
            ("x_auth_mode".to_string(), "client_auth".to_string()),
        ]);
        let expected = client
            .authorization_for(&format!("{}/oauth/access_token", uri), &params)
            .unwrap();
        (client.acquire_token("testuser", "testpass"), expected)
    })
    .await
    .unwrap();

    let (token, secret) = result.unwrap();
    assert_eq!(token, "test_token");
    assert_eq!(secret, "test_secret");

    let requests = mock_server.received_requests().await.unwrap();
    let request = &requests[0];
    assert_eq!(
        request.headers.get("authorization").unwrap().to_str().unwrap(),
        expected_auth
    );
    assert!(!expected_auth.contains("oauth_token="));
    assert!(request.headers.get("user-agent").is_some());

    let fields = form(request);
    assert_eq!(fields["x_auth_username"], "testuser");
    assert_eq!(fields["x_auth_password"], "testpass");
    assert_eq!(fields["x_auth_mode"], "client_auth");
}

#[tokio::test]
async fn test_acquire_token_escapes_reserved_characters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("x_auth_password=p%2Ass~word"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("oauth_token=t&oauth_token_secret=s"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (result, expected_auth) = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(
            Credentials::new("test_key", "test_secret"),
            options(&uri, RetryPolicy::default()),
        )
        .unwrap();

        let params = BTreeMap::from([
            ("x_auth_username".to_string(), "testuser".to_string()),
            ("x_auth_password".to_string(), "p*ss~word".to_string()),
            ("x_auth_mode".to_string(), "client_auth".to_string()),
        ]);
        let expected = client
            .authorization_for(&format!("{}/oauth/access_token", uri), &params)
            .unwrap();
        (client.acquire_token("testuser", "p*ss~word"), expected)
    })
    .await
    .unwrap();

    assert_eq!(result.unwrap(), ("t".to_string(), "s".to_string()));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("authorization").unwrap().to_str().unwrap(),
        expected_auth
    );
    assert_eq!(form(&requests[0])["x_auth_password"], "p*ss~word");
}

#[tokio::test]
async fn test_acquire_token_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "<html><title>401: Unauthorized</title><body>401: Unauthorized</body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(
            Credentials::new("test_key", "test_secret"),
            options(&uri, RetryPolicy::default()),
        )
        .unwrap();
        client.acquire_token("invalid", "invalid")
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Auth(_))));
}

#[tokio::test]
async fn test_acquire_token_empty_values() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("oauth_token=&oauth_token_secret="))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(
            Credentials::new("test_key", "test_secret"),
            options(&uri, RetryPolicy::default()),
        )
        .unwrap();
        client.acquire_token("u", "p")
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Auth(_))));
}

#[tokio::test]
async fn test_list_items_sends_known_ids() {
    let mock_server = MockServer::start().await;

    let response = serde_json::json!([
        {"type": "meta"},
        {"type": "user", "user_id": 100, "username": "testuser"},
        {
            "type": "bookmark",
            "bookmark_id": 3,
            "title": "Third",
            "url": "https://example.com/3",
            "hash": "h3",
            "time": 1739202544
        }
    ]);

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .and(body_string_contains("have=1%2C2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.list_items(&[1, 2])
    })
    .await
    .unwrap();

    let items = result.unwrap();
    assert_eq!(items.len(), 3);
    assert!(matches!(&items[2], RemoteItem::Bookmark(b) if b.bookmark_id == 3));

    let requests = mock_server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("OAuth oauth_consumer_key=\"test_key\""));
    assert!(auth.contains("oauth_token=\"tok\""));
}

#[tokio::test]
async fn test_list_items_without_known_ids_sends_no_have() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.list_items(&[])
    })
    .await
    .unwrap();

    assert!(result.unwrap().is_empty());
    let requests = mock_server.received_requests().await.unwrap();
    assert!(!form(&requests[0]).contains_key("have"));
}

#[tokio::test]
async fn test_list_items_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.list_items(&[])
    })
    .await
    .unwrap();

    match result {
        Err(instafeed::Error::Api { status, endpoint, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(endpoint, "bookmarks/list");
        }
        other => panic!("Expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_items_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.list_items(&[])
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Decode { .. })));
}

#[tokio::test]
async fn test_fetch_item_text_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/get_text"))
        .and(body_string_contains("bookmark_id=42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Article</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.fetch_item_text(42)
    })
    .await
    .unwrap();

    assert_eq!(result.unwrap(), "<html><body>Article</body></html>");
}

#[tokio::test]
async fn test_fetch_item_text_error_carries_body() {
    let mock_server = MockServer::start().await;

    let page = "<html><body>Bookmark text could not be generated</body></html>";
    Mock::given(method("POST"))
        .and(path("/bookmarks/get_text"))
        .respond_with(ResponseTemplate::new(400).set_body_string(page))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let (client, _) = client_with_token(&uri, RetryPolicy::default());
        client.fetch_item_text(7)
    })
    .await
    .unwrap();

    match result {
        Err(instafeed::Error::Api { status, message, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(message, page);
        }
        other => panic!("Expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_always_predicate_makes_three_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let policy = RetryPolicy::default()
        .with_max_retries(2)
        .with_delays(Duration::from_millis(100), Duration::from_millis(250), 3.0)
        .with_predicate(|_| true);

    let uri = mock_server.uri();
    let (result, delays) = tokio::task::spawn_blocking(move || {
        let (client, delays) = client_with_token(&uri, policy);
        (client.list_items(&[]), delays)
    })
    .await
    .unwrap();

    assert!(result.unwrap().is_empty());
    assert_eq!(
        *delays.lock().unwrap(),
        vec![Duration::from_millis(100), Duration::from_millis(250)]
    );
}

#[tokio::test]
async fn test_retry_recovers_from_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/get_text"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/get_text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (result, delays) = tokio::task::spawn_blocking(move || {
        let (client, delays) = client_with_token(&uri, RetryPolicy::default());
        (client.fetch_item_text(1), delays)
    })
    .await
    .unwrap();

    assert_eq!(result.unwrap(), "finally");
    assert_eq!(
        *delays.lock().unwrap(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_retry_gives_up_on_persistent_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/list"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (result, delays) = tokio::task::spawn_blocking(move || {
        let (client, delays) = client_with_token(&uri, RetryPolicy::default());
        (client.list_items(&[]), delays)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Api { status: 429, .. })));
    assert_eq!(delays.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookmarks/get_text"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let (result, delays) = tokio::task::spawn_blocking(move || {
        let (client, delays) = client_with_token(&uri, RetryPolicy::default());
        (client.fetch_item_text(5), delays)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Api { status: 404, .. })));
    assert!(delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transport_errors_are_retried_then_surface() {
    // Bind then drop a listener so its port refuses connections
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let policy = RetryPolicy::default().with_max_retries(2);
    let (result, delays) = tokio::task::spawn_blocking(move || {
        let (client, delays) = client_with_token(&uri, policy);
        (client.list_items(&[]), delays)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(instafeed::Error::Transport(_))));
    assert_eq!(delays.lock().unwrap().len(), 2);
}
