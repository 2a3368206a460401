#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

use sheet_tickets::config::{ColumnConfig, Config, MailConfig, SheetConfig};
use sheet_tickets::error::TicketError;
use sheet_tickets::models::NewSubmission;
use sheet_tickets::notify::{MailMessage, Notifier};
use sheet_tickets::sheet::{SheetSource, parse_rows};
use sheet_tickets::state::SharedState;
use sheet_tickets::ticket::TicketArtifact;

pub const HEADER: [&str; 4] = ["Timestamp", "Name", "Email address", "T-shirt size"];

/// Sheet stand-in fed with raw cell values, header row first.
pub struct FakeSheet {
    values: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl FakeSheet {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(vec![HEADER.iter().map(|s| s.to_string()).collect()]),
            failing: AtomicBool::new(false),
        }
    }

    pub fn push_row(&self, timestamp: &str, name: &str, email: &str, size: &str) {
        self.values.lock().unwrap().push(vec![
            timestamp.to_string(),
            name.to_string(),
            email.to_string(),
            size.to_string(),
        ]);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SheetSource for FakeSheet {
    async fn fetch(&self) -> Result<Vec<NewSubmission>, TicketError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TicketError::SourceUnavailable("sheet offline".to_string()));
        }
        let values = self.values.lock().unwrap().clone();
        Ok(parse_rows(&values, &ColumnConfig::default()))
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub payload: String,
    pub png: Vec<u8>,
}

/// Notifier that records every delivery instead of talking to SMTP.
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        to: &str,
        artifact: &TicketArtifact,
        message: &MailMessage,
    ) -> Result<(), TicketError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TicketError::delivery("smtp connection refused"));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            payload: artifact.payload.clone(),
            png: artifact.png.clone(),
        });
        Ok(())
    }
}

/// A running test server backed by an in-memory database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: SqlitePool,
    pub client: Client,
    pub state: SharedState,
    pub sheet: Arc<FakeSheet>,
    pub notifier: Arc<RecordingNotifier>,
    pub ticket_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get_json(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn sync(&self) -> (Value, StatusCode) {
        self.post_json("/api/v1/sync", &json!({})).await
    }

    pub async fn send(&self, id: &str) -> (Value, StatusCode) {
        self.post_json(&format!("/api/v1/submissions/{id}/send"), &json!({}))
            .await
    }

    pub async fn scan(&self, qr_content: &str) -> (Value, StatusCode) {
        self.post_json("/api/v1/scan", &json!({ "qr_content": qr_content }))
            .await
    }

    pub async fn submissions(&self) -> Vec<Value> {
        let (body, status) = self.get_json("/api/v1/submissions").await;
        assert_eq!(status, StatusCode::OK, "list submissions failed: {body}");
        body["submissions"].as_array().cloned().unwrap_or_default()
    }

    /// Add one row to the sheet, sync, and return the new submission's id.
    pub async fn register(&self, timestamp: &str, name: &str, email: &str) -> String {
        self.sheet.push_row(timestamp, name, email, "M");
        let (body, status) = self.sync().await;
        assert_eq!(status, StatusCode::OK, "sync failed: {body}");

        self.submissions()
            .await
            .into_iter()
            .find(|s| s["email"] == email && s["name"] == name)
            .and_then(|s| s["id"].as_str().map(str::to_string))
            .expect("registered submission missing from list")
    }
}

pub fn test_config(ticket_dir: &TempDir) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 10 * 1024 * 1024,
        log_level: "warn".to_string(),
        sync_on_view: false,
        timeout: Duration::from_secs(5),
        ticket_dir: ticket_dir.path().to_path_buf(),
        ticket_template: None,
        sheet: SheetConfig {
            credentials_file: "credentials.json".into(),
            sheet_url: "https://docs.google.com/spreadsheets/d/test-sheet/edit".to_string(),
            sheet_name: "Form Responses 1".to_string(),
            columns: ColumnConfig::default(),
        },
        smtp: None,
        mail: MailConfig {
            subject: "Ticket for {{name}}".to_string(),
            body: "Hello {{name}}, size {{fields.T-shirt size}}.".to_string(),
        },
    }
}

/// A single-connection in-memory database with migrations applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sheet_tickets::db::migrate(&pool)
        .await
        .expect("Failed to run migrations on test database");

    pool
}

/// Spawn a test app with a fresh database, fake sheet and recording notifier.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like `spawn_app`, with the test config adjusted first.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let pool = memory_pool().await;
    let ticket_dir = tempfile::tempdir().expect("Failed to create ticket dir");
    let mut config = test_config(&ticket_dir);
    configure(&mut config);

    let sheet = Arc::new(FakeSheet::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let (app, state) =
        sheet_tickets::build_app(pool.clone(), config, sheet.clone(), notifier.clone())
            .expect("Failed to build app");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        state,
        sheet,
        notifier,
        ticket_dir,
    }
}
