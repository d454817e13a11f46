//! HTTP API tests: a real server on a free port, driven with reqwest.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docchat::app;
use docchat::auth::TokenGateway;
use docchat::config::Config;
use docchat::server::{run_server_with_state, AppState};
use docchat_core::adapters::Generator;
use docchat_core::error::GenerationError;
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

mod common;
use common::pdf_with_phrase;

// ─── Helpers ────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingGenerator {
    summaries: AtomicUsize,
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn summarize(
        &self,
        _text: &str,
        age: Option<u32>,
        interests: &[String],
    ) -> Result<String, GenerationError> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary for {:?} about {}", age, interests.join("+")))
    }

    async fn answer(&self, _text: &str, question: &str) -> Result<String, GenerationError> {
        Ok(format!("re: {}", question))
    }
}

fn test_config_with_port(tmp: &TempDir, port: u16) -> Config {
    let root = tmp.path();
    let config_content = format!(
        r#"
[db]
path = "{}/data/docchat.sqlite"

[server]
bind = "127.0.0.1:{}"
max_upload_bytes = 65536

[upload]
spool_dir = "{}/spool"
"#,
        root.display(),
        port,
        root.display()
    );
    toml::from_str(&config_content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    gateway: Arc<TokenGateway>,
    generator: Arc<CountingGenerator>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let tmp = TempDir::new().unwrap();
        let port = find_free_port();
        let cfg = test_config_with_port(&tmp, port);

        let generator = Arc::new(CountingGenerator::default());
        let app = app::build_with_generator(&cfg, generator.clone())
            .await
            .unwrap();
        let gateway = Arc::new(TokenGateway::new("integration-secret").unwrap());
        let state = AppState::new(app, gateway.clone());

        let handle = tokio::spawn(async move {
            run_server_with_state(&cfg, state).await.ok();
        });
        wait_for_server(port).await;

        Self {
            _tmp: tmp,
            base: format!("http://127.0.0.1:{}", port),
            gateway,
            generator,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn bearer(&self, user: &str) -> String {
        format!("Bearer {}", self.gateway.issue(user).unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn pdf_form(filename: &str, bytes: Vec<u8>, mime: &str) -> multipart::Form {
    let part = multipart::Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .unwrap();
    multipart::Form::new().part("file", part)
}

async fn upload(server: &TestServer, user: &str, phrase: &str) -> String {
    let resp = reqwest::Client::new()
        .post(server.url("/documents"))
        .header("Authorization", server.bearer(user))
        .multipart(pdf_form("report.pdf", pdf_with_phrase(phrase), "application/pdf"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    body["document"]["id"].as_str().unwrap().to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/documents")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");

    let forged = TokenGateway::new("other-secret")
        .unwrap()
        .issue("alice")
        .unwrap();
    let resp = client
        .get(server.url("/documents"))
        .header("Authorization", format!("Bearer {}", forged))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_listing_is_not_found() {
    let server = TestServer::start().await;
    let resp = reqwest::Client::new()
        .get(server.url("/documents"))
        .header("Authorization", server.bearer("alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn upload_summarize_and_chat() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let alice = server.bearer("alice");
    let id = upload(&server, "alice", "harbor logistics").await;

    let resp = client
        .get(server.url(&format!("/documents/{}/summary", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let first: Value = client
        .post(server.url(&format!("/documents/{}/summarize", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["cached"], false);

    let second: Value = client
        .post(server.url(&format!("/documents/{}/summarize", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["cached"], true);
    assert_eq!(second["summary"], first["summary"]);
    assert_eq!(server.generator.summaries.load(Ordering::SeqCst), 1);

    for q in ["who?", "when?"] {
        let resp = client
            .post(server.url(&format!("/documents/{}/ask", id)))
            .header("Authorization", &alice)
            .json(&json!({ "question": q }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let turn: Value = resp.json().await.unwrap();
        assert_eq!(turn["answer"], format!("re: {}", q));
    }

    let chat: Value = client
        .get(server.url(&format!("/documents/{}/chat", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let turns = chat["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["question"], "who?");
    assert_eq!(turns[1]["question"], "when?");

    let listed: Value = client
        .get(server.url("/documents/summarized"))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["documents"][0]["id"], id.as_str());
    assert_eq!(listed["documents"][0]["summary"], first["summary"]);
}

#[tokio::test]
async fn other_users_see_not_found() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let id = upload(&server, "alice", "private notes").await;
    let bob = server.bearer("bob");

    for (method, path) in [
        ("GET", format!("/documents/{}", id)),
        ("POST", format!("/documents/{}/summarize", id)),
        ("GET", format!("/documents/{}/summary", id)),
        ("GET", format!("/documents/{}/chat", id)),
    ] {
        let req = if method == "GET" {
            client.get(server.url(&path))
        } else {
            client.post(server.url(&path))
        };
        let resp = req.header("Authorization", &bob).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{} {}", method, path);
    }

    let resp = client
        .post(server.url(&format!("/documents/{}/ask", id)))
        .header("Authorization", &bob)
        .json(&json!({ "question": "what is inside?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.generator.summaries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uploads_are_validated() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let alice = server.bearer("alice");

    let resp = client
        .post(server.url("/documents"))
        .header("Authorization", &alice)
        .multipart(pdf_form("notes.txt", b"hello".to_vec(), "text/plain"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(server.url("/documents"))
        .header("Authorization", &alice)
        .multipart(pdf_form("fake.pdf", b"not a pdf".to_vec(), "application/pdf"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "extraction_failed");

    let resp = client
        .post(server.url("/documents"))
        .header("Authorization", &alice)
        .multipart(multipart::Form::new().text("note", "no file here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(server.url("/documents"))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_drives_summary_personalization() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let alice = server.bearer("alice");

    let empty: Value = client
        .get(server.url("/profile"))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(empty["age"].is_null());

    let stored: Value = client
        .put(server.url("/profile"))
        .header("Authorization", &alice)
        .json(&json!({ "age": 30, "interests": ["sailing", "  "] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["age"], 30);
    assert_eq!(stored["interests"], json!(["sailing"]));

    let id = upload(&server, "alice", "wind patterns").await;
    let outcome: Value = client
        .post(server.url(&format!("/documents/{}/summarize", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["summary"], "summary for Some(30) about sailing");
}

#[tokio::test]
async fn malformed_json_bodies_use_error_contract() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let alice = server.bearer("alice");
    let id = upload(&server, "alice", "ledger entries").await;
    let ask_url = server.url(&format!("/documents/{}/ask", id));

    let resp = client
        .post(&ask_url)
        .header("Authorization", &alice)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(&ask_url)
        .header("Authorization", &alice)
        .header("content-type", "application/json")
        .body("question?")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .put(server.url("/profile"))
        .header("Authorization", &alice)
        .json(&json!({ "age": "thirty" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let chat: Value = client
        .get(server.url(&format!("/documents/{}/chat", id)))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chat["turns"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn pdf_content_type_parameters_are_accepted() {
    let server = TestServer::start().await;
    let resp = reqwest::Client::new()
        .post(server.url("/documents"))
        .header("Authorization", server.bearer("alice"))
        .multipart(pdf_form(
            "params.pdf",
            pdf_with_phrase("coral reefs"),
            "application/pdf; name=params.pdf",
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["document"]["filename"], "params.pdf");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let server = TestServer::start().await;
    let mut bytes = pdf_with_phrase("too big");
    bytes.resize(80_000, b' ');

    let resp = reqwest::Client::new()
        .post(server.url("/documents"))
        .header("Authorization", server.bearer("alice"))
        .multipart(pdf_form("big.pdf", bytes, "application/pdf"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "payload_too_large");
}
