//! End-to-end checks of the HTTP surface against a real node.


use dht_proxy::{InfoHash, RunnerConfig};
use serde_json::json;
use test_utils::{spawn_app, spawn_app_with};

fn lines(body: &str) -> Vec<serde_json::Value> {
    body.split_terminator('\n')
        .map(|line| serde_json::from_str(line).expect("each line is a JSON document"))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn options_advertises_methods() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, app.url("/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-methods"], "OPTIONS, GET, POST, LISTEN");
    assert_eq!(headers["access-control-allow-headers"], "content-type");
    assert_eq!(headers["access-control-max-age"], "86400");
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(app.server.request_count(), 1);

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn options_with_identity_adds_sign_and_encrypt() {
    let app = spawn_app_with(RunnerConfig::default(), true);

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, app.url("/"))
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "OPTIONS, GET, POST, LISTEN, SIGN, ENCRYPT"
    );
    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn node_info_reports_node_and_caller() {
    let app = spawn_app();

    let response = reqwest::get(app.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(headers["server"].to_str().unwrap().starts_with("dht-proxy/"));

    let body = response.text().await.unwrap();
    assert!(body.ends_with('\n'));
    let doc: serde_json::Value = serde_json::from_str(body.trim_end()).unwrap();
    assert_eq!(doc["id"], app.node.id().to_hex());
    assert!(doc["public_ip"].as_str().unwrap().starts_with("127.0.0.1:"));
    assert_eq!(doc["ipv4"]["good"], 0);
    assert_eq!(doc["ipv6"]["known"], 0);

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn put_then_get_streams_every_value() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for word in ["one", "two", "three"] {
        let data = base64_of(word);
        let response = client
            .post(app.url("/movies"))
            .body(json!({"data": data, "utype": "text/plain"}).to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let stored = response.text().await.unwrap();
        assert!(stored.ends_with('\n'));
        let stored: serde_json::Value = serde_json::from_str(stored.trim_end()).unwrap();
        assert_eq!(stored["data"], data);
        assert_ne!(stored["id"], "0");
        ids.push(stored["id"].clone());
    }

    let response = client.get(app.url("/movies")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let values = lines(&response.text().await.unwrap());
    assert_eq!(values.len(), 3);
    for value in &values {
        assert!(ids.contains(&value["id"]));
        assert_eq!(value["utype"], "text/plain");
    }

    let info: serde_json::Value = client.get(app.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(info["storage"]["values"], 3);

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_key_and_its_hash_address_the_same_values() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let response = client
        .post(app.url("/hello"))
        .body(json!({"id": "5", "data": base64_of("world")}).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let hashed = format!("/{}", InfoHash::get("hello").to_hex());
    let values = lines(&client.get(app.url(&hashed)).send().await.unwrap().text().await.unwrap());
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["id"], "5");

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn get_unknown_key_is_empty_ok() {
    let app = spawn_app();

    let response = reqwest::get(app.url("/nothing-stored-here")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().is_empty());

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn put_without_body_is_rejected() {
    let app = spawn_app();

    let response = reqwest::Client::new().post(app.url("/key")).send().await.unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "{\"err\":\"Missing parameters\"}");

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn put_with_malformed_json_is_rejected() {
    let app = spawn_app();

    let response = reqwest::Client::new()
        .post(app.url("/key"))
        .body("{\"data\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "{\"err\":\"Incorrect JSON\"}");

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_put_is_bad_gateway() {
    let app = spawn_app_with(RunnerConfig { max_values_per_key: 0, ..Default::default() }, false);

    let response = reqwest::Client::new()
        .post(app.url("/key"))
        .body(json!({"data": base64_of("x")}).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "{\"err\":\"Put failed\"}");

    let response = reqwest::get(app.url("/key")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().is_empty());

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_keeps_common_headers() {
    let app = spawn_app();

    let response = reqwest::get(app.url("/a/b")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_header_follows_client() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let app = spawn_app();

    let response = reqwest::get(app.url("/")).await.unwrap();
    assert_eq!(response.headers()["connection"], "keep-alive");

    let mut socket = tokio::net::TcpStream::connect(app.server.local_addr()).await.unwrap();
    socket
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    socket.read_to_string(&mut raw).await.unwrap();
    let head = raw.split("\r\n\r\n").next().unwrap().to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("connection: close"));
    assert!(!head.contains("keep-alive"));

    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_closes_listener_and_node() {
    let app = spawn_app();
    let url = app.url("/");
    let node = app.node.clone();

    assert!(reqwest::get(&url).await.is_ok());
    app.shutdown().await;

    assert!(!node.is_running());
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(2))
        .build()
        .unwrap();
    assert!(client.get(&url).send().await.is_err());
}

fn base64_of(text: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(text)
}
