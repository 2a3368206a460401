use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{SheetSource, parse_rows};
use crate::config::{ColumnConfig, SheetConfig};
use crate::error::TicketError;
use crate::models::NewSubmission;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

static SPREADSHEET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").unwrap());

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Reads a worksheet of a Google Sheets spreadsheet with a service account.
pub struct GoogleSheetReader {
    client: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    spreadsheet_id: String,
    sheet_name: String,
    columns: ColumnConfig,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetReader {
    pub fn from_config(config: &SheetConfig, timeout: Duration) -> Result<Self, String> {
        let key_json = std::fs::read_to_string(&config.credentials_file).map_err(|e| {
            format!(
                "Failed to read service account credentials {}: {e}",
                config.credentials_file.display()
            )
        })?;

        Self::new(
            &key_json,
            &config.sheet_url,
            &config.sheet_name,
            config.columns.clone(),
            timeout,
        )
    }

    pub fn new(
        key_json: &str,
        sheet_url: &str,
        sheet_name: &str,
        columns: ColumnConfig,
        timeout: Duration,
    ) -> Result<Self, String> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| format!("Invalid service account credentials: {e}"))?;

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| format!("Invalid service account private key: {e}"))?;

        let spreadsheet_id = spreadsheet_id(sheet_url)
            .ok_or_else(|| format!("Cannot find a spreadsheet id in SHEET_URL '{sheet_url}'"))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            spreadsheet_id,
            sheet_name: sheet_name.to_string(),
            columns,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, TicketError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| TicketError::SourceUnavailable(format!("Failed to sign token request: {e}")))?;

        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| TicketError::SourceUnavailable(format!("Token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TicketError::SourceUnavailable(format!(
                "Token request rejected ({status}): {}",
                truncate(&body, 512)
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| TicketError::SourceUnavailable(format!("Invalid token response: {e}")))?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        });

        Ok(value)
    }

    async fn read_values(&self) -> Result<Vec<Vec<String>>, TicketError> {
        let token = self.access_token().await?;

        let mut url = Url::parse(SHEETS_API_BASE)
            .map_err(|e| TicketError::SourceUnavailable(format!("Invalid Sheets API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| TicketError::SourceUnavailable("Invalid Sheets API URL".to_string()))?
            .extend([self.spreadsheet_id.as_str(), "values", self.sheet_name.as_str()]);

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TicketError::SourceUnavailable(format!("Sheets request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TicketError::SourceUnavailable(format!(
                "Sheets API returned {status}: {}",
                truncate(&body, 512)
            )));
        }

        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| TicketError::SourceUnavailable(format!("Invalid Sheets response: {e}")))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

#[async_trait]
impl SheetSource for GoogleSheetReader {
    async fn fetch(&self) -> Result<Vec<NewSubmission>, TicketError> {
        let values = self.read_values().await?;
        let submissions = parse_rows(&values, &self.columns);
        tracing::debug!(
            "Read {} rows from sheet '{}', {} usable",
            values.len().saturating_sub(1),
            self.sheet_name,
            submissions.len()
        );
        Ok(submissions)
    }
}

/// Spreadsheet id from a full sheet URL, or the value itself when it already is a bare id.
pub fn spreadsheet_id(sheet_url: &str) -> Option<String> {
    if let Some(caps) = SPREADSHEET_ID_RE.captures(sheet_url) {
        return Some(caps[1].to_string());
    }

    let trimmed = sheet_url.trim();
    let bare = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    bare.then(|| trimmed.to_string())
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
