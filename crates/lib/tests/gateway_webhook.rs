//! Integration tests: serve the gateway on a free port and drive POST /callback with
//! signed LINE payloads. LINE and Yelp are replaced by local axum servers.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use lib::channels::sign_body;
use lib::config::{SearchSettings, Settings};
use lib::gateway::{self, AppContext};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SECRET: &str = "test-channel-secret";
const TOKEN: &str = "test-access-token";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("linebridge-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn settings(dir: &PathBuf, line_api_base: &str, search: SearchSettings) -> Settings {
    Settings {
        bind: "127.0.0.1".to_string(),
        port: 0,
        channel_secret: SECRET.to_string(),
        channel_access_token: TOKEN.to_string(),
        line_api_base: line_api_base.to_string(),
        search,
        events_log: dir.join("events.log"),
        search_log: dir.join("yelp.log"),
    }
}

fn search_settings(api_key: Option<&str>, endpoint: &str) -> SearchSettings {
    SearchSettings {
        api_key: api_key.map(str::to_string),
        endpoint: endpoint.to_string(),
        timeout: Duration::from_secs(5),
        locale: None,
        coordinates: None,
    }
}

/// Serve `app` on an ephemeral port; returns its base URL.
async fn spawn_app(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl Recorded {
    fn take(&self) -> Vec<(Option<String>, Value)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

async fn record_call(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    rec.calls.lock().unwrap().push((auth, body));
    Json(json!({}))
}

/// Fake LINE reply API that records every reply request.
async fn fake_line() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v2/bot/message/reply", post(record_call))
        .with_state(rec.clone());
    (spawn_app(app).await, rec)
}

/// Fake Yelp AI endpoint that answers every query with `doc`.
async fn fake_yelp(doc: Value) -> (String, Recorded) {
    let rec = Recorded::default();
    let doc = Arc::new(doc);
    let app = Router::new()
        .route(
            "/ai/chat/v2",
            post(move |State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>| {
                let doc = doc.clone();
                async move {
                    let _ = record_call(State(rec), headers, Json(body)).await;
                    Json((*doc).clone())
                }
            }),
        )
        .with_state(rec.clone());
    (format!("{}/ai/chat/v2", spawn_app(app).await), rec)
}

/// Fake Yelp AI endpoint that answers every query with a fixed status and raw body
/// after `delay`.
async fn fake_yelp_raw(status: u16, body: String, delay: Duration) -> String {
    let app = Router::new().route(
        "/ai/chat/v2",
        post(move || {
            let body = body.clone();
            async move {
                tokio::time::sleep(delay).await;
                let status = StatusCode::from_u16(status).expect("status code");
                (status, body)
            }
        }),
    );
    format!("{}/ai/chat/v2", spawn_app(app).await)
}

/// POST `/yelp ramen` through the gateway and return the single reply text.
async fn single_yelp_reply(dir: &PathBuf, search: SearchSettings) -> String {
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(dir, &line_base, search)).await;

    let resp = post_signed(&base, &text_event_body("/yelp ramen")).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let calls = line.take();
    assert_eq!(calls.len(), 1);
    let mut texts = reply_texts(&calls[0].1);
    assert_eq!(texts.len(), 1);
    texts.remove(0)
}

async fn spawn_gateway(settings: Settings) -> String {
    let ctx = AppContext::from_settings(settings).expect("build context");
    spawn_app(gateway::router(Arc::new(ctx))).await
}

fn text_event_body(text: &str) -> String {
    json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": "rt-1",
            "source": { "type": "user", "userId": "U123" },
            "message": { "type": "text", "id": "m1", "text": text }
        }]
    })
    .to_string()
}

async fn post_signed(base: &str, body: &str) -> reqwest::Response {
    let sig = sign_body(body.as_bytes(), SECRET).expect("sign");
    reqwest::Client::new()
        .post(format!("{}/callback", base))
        .header("X-Line-Signature", sig)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("post callback")
}

fn reply_texts(call: &Value) -> Vec<String> {
    call["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| {
            assert_eq!(m["type"], "text");
            m["text"].as_str().expect("text").to_string()
        })
        .collect()
}

#[tokio::test]
async fn run_gateway_serves_health_endpoints() {
    let port = free_port();
    let dir = temp_dir();
    let mut s = settings(&dir, "http://127.0.0.1:9", search_settings(None, "http://127.0.0.1:9"));
    s.port = port;

    let gateway_handle = tokio::spawn(async move {
        let _ = gateway::run_gateway(s).await;
    });

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/", port);
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));

                let health = client
                    .get(format!("http://127.0.0.1:{}/health", port))
                    .send()
                    .await
                    .expect("get /health");
                assert_eq!(health.status().as_u16(), 200);
                assert_eq!(health.text().await.expect("body"), "ok");
                gateway_handle.abort();
                let _ = std::fs::remove_dir_all(&dir);
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    gateway_handle.abort();
    panic!("GET {} did not return 200 within 5s; last error: {:?}", url, last_err);
}

#[tokio::test]
async fn invalid_or_missing_signature_is_rejected_without_side_effects() {
    let dir = temp_dir();
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(None, "http://127.0.0.1:9"))).await;
    let body = text_event_body("ping");
    let client = reqwest::Client::new();

    let bad = client
        .post(format!("{}/callback", base))
        .header("X-Line-Signature", "bm90LWEtc2lnbmF0dXJl")
        .body(body.clone())
        .send()
        .await
        .expect("post");
    assert_eq!(bad.status().as_u16(), 400);
    assert_eq!(bad.text().await.unwrap(), "Invalid signature");

    let missing = client
        .post(format!("{}/callback", base))
        .body(body)
        .send()
        .await
        .expect("post");
    assert_eq!(missing.status().as_u16(), 400);

    assert!(line.take().is_empty());
    assert!(!dir.join("events.log").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn signed_ping_is_logged_and_answered_with_pong() {
    let dir = temp_dir();
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(None, "http://127.0.0.1:9"))).await;

    let resp = post_signed(&base, &text_event_body("ping")).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let calls = line.take();
    assert_eq!(calls.len(), 1);
    let (auth, body) = &calls[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-access-token"));
    assert_eq!(body["replyToken"], "rt-1");
    assert_eq!(reply_texts(body), vec!["pong 🏓".to_string()]);

    let events = std::fs::read_to_string(dir.join("events.log")).expect("events log");
    assert!(events.contains("\"replyToken\": \"rt-1\""));
    assert!(events.starts_with("\n===== "));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unmatched_text_and_non_text_events_send_no_reply() {
    let dir = temp_dir();
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(None, "http://127.0.0.1:9"))).await;

    let resp = post_signed(&base, &text_event_body("xyz")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let image = json!({
        "events": [
            {
                "type": "message",
                "replyToken": "rt-2",
                "source": { "type": "user", "userId": "U123" },
                "message": { "type": "image", "id": "m2" }
            },
            { "type": "follow", "replyToken": "rt-3", "source": { "type": "user", "userId": "U123" } }
        ]
    })
    .to_string();
    let resp = post_signed(&base, &image).await;
    assert_eq!(resp.status().as_u16(), 200);

    assert!(line.take().is_empty());
    let events = std::fs::read_to_string(dir.join("events.log")).expect("events log");
    assert_eq!(events.matches("\n===== ").count(), 2);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn signed_non_json_body_is_accepted_and_logged_raw() {
    let dir = temp_dir();
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(None, "http://127.0.0.1:9"))).await;

    let resp = post_signed(&base, "not json at all").await;
    assert_eq!(resp.status().as_u16(), 200);
    assert!(line.take().is_empty());
    let events = std::fs::read_to_string(dir.join("events.log")).expect("events log");
    assert!(events.contains("\nnot json at all\n"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn yelp_without_query_replies_with_usage() {
    let dir = temp_dir();
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(Some("k"), "http://127.0.0.1:9"))).await;

    post_signed(&base, &text_event_body("/yelp")).await;
    let calls = line.take();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        reply_texts(&calls[0].1),
        vec!["Usage: /yelp <your question>\nExample: /yelp Best ramen near me".to_string()]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn yelp_query_without_businesses_replies_with_lead_and_raw_document() {
    let dir = temp_dir();
    let doc = json!({ "response": { "text": "Nothing nearby." }, "chat_id": "c1" });
    let (yelp_endpoint, yelp) = fake_yelp(doc).await;
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(Some("yelp-key"), &yelp_endpoint))).await;

    let resp = post_signed(&base, &text_event_body("/yelp best ramen near me")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let yelp_calls = yelp.take();
    assert_eq!(yelp_calls.len(), 1);
    assert_eq!(yelp_calls[0].0.as_deref(), Some("Bearer yelp-key"));
    assert_eq!(yelp_calls[0].1, json!({ "query": "best ramen near me" }));

    let calls = line.take();
    assert_eq!(calls.len(), 1);
    let texts = reply_texts(&calls[0].1);
    assert_eq!(texts.len(), 2);
    assert_eq!(
        texts[0],
        "Nothing nearby.\n\n(Full response logged; showing only the first business.)"
    );
    assert!(texts[1].starts_with("No businesses found in entities. Raw response:\n{"));
    assert!(texts[1].contains("\"chat_id\": \"c1\""));

    let search_log = std::fs::read_to_string(dir.join("yelp.log")).expect("search log");
    assert!(search_log.contains("\"text\": \"Nothing nearby.\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn yelp_query_with_business_replies_with_first_business_json() {
    let dir = temp_dir();
    let doc = json!({
        "response": { "text": "Try these." },
        "entities": [
            { "businesses": [] },
            { "businesses": [ { "name": "Ramen One", "rating": 4.5 }, { "name": "Ramen Two" } ] }
        ]
    });
    let (yelp_endpoint, _yelp) = fake_yelp(doc).await;
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(Some("yelp-key"), &yelp_endpoint))).await;

    post_signed(&base, &text_event_body("/yelp ramen")).await;
    let calls = line.take();
    assert_eq!(calls.len(), 1);
    let texts = reply_texts(&calls[0].1);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("Try these."));
    assert!(texts[1].starts_with("First business (full JSON):\n{"));
    assert!(texts[1].contains("\"name\": \"Ramen One\""));
    assert!(!texts[1].contains("Ramen Two"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unreachable_yelp_replies_with_transport_error() {
    let dir = temp_dir();
    let dead = format!("http://127.0.0.1:{}/ai/chat/v2", free_port());
    let (line_base, line) = fake_line().await;
    let base = spawn_gateway(settings(&dir, &line_base, search_settings(Some("yelp-key"), &dead))).await;

    let resp = post_signed(&base, &text_event_body("/yelp ramen")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let calls = line.take();
    assert_eq!(calls.len(), 1);
    let texts = reply_texts(&calls[0].1);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Error calling Yelp API: "));
    assert!(!dir.join("yelp.log").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn yelp_error_status_replies_with_truncated_body() {
    let dir = temp_dir();
    let endpoint = fake_yelp_raw(500, "e".repeat(5000), Duration::ZERO).await;

    let text = single_yelp_reply(&dir, search_settings(Some("yelp-key"), &endpoint)).await;
    assert_eq!(
        text,
        format!("Yelp API error 500:\n{}\n...(truncated)", "e".repeat(2000))
    );
    assert!(!dir.join("yelp.log").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn yelp_non_json_success_replies_with_raw_text() {
    let dir = temp_dir();
    let endpoint = fake_yelp_raw(200, "<html>not json</html>".to_string(), Duration::ZERO).await;

    let text = single_yelp_reply(&dir, search_settings(Some("yelp-key"), &endpoint)).await;
    assert_eq!(text, "Yelp API returned invalid JSON:\n<html>not json</html>");
    assert!(!dir.join("yelp.log").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn slow_yelp_times_out_with_transport_error() {
    let dir = temp_dir();
    let endpoint = fake_yelp_raw(200, "{}".to_string(), Duration::from_secs(3)).await;
    let mut search = search_settings(Some("yelp-key"), &endpoint);
    search.timeout = Duration::from_secs(1);

    let text = single_yelp_reply(&dir, search).await;
    assert!(text.starts_with("Error calling Yelp API: "));
    assert!(!dir.join("yelp.log").exists());
    let _ = std::fs::remove_dir_all(&dir);
}
