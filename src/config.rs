use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAIL_SUBJECT: &str = "Your QR Code Ticket 🎟️";
pub const DEFAULT_MAIL_BODY: &str =
    "Hello {{name}},\n\nHere is your unique QR code ticket.\n\nThanks!";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub log_level: String,
    pub sync_on_view: bool,
    pub timeout: Duration,
    pub ticket_dir: PathBuf,
    pub ticket_template: Option<PathBuf>,
    pub sheet: SheetConfig,
    pub smtp: Option<SmtpConfig>,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub credentials_file: PathBuf,
    pub sheet_url: String,
    pub sheet_name: String,
    pub columns: ColumnConfig,
}

/// Header names of the columns the pipeline reads. Everything else is passed through.
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub id: Option<String>,
    pub timestamp: String,
    pub email: String,
    pub name: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: None,
            timestamp: "Timestamp".to_string(),
            email: "Email address".to_string(),
            name: "Name".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub subject: String,
    pub body: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_MAIL_SUBJECT.to_string(),
            body: DEFAULT_MAIL_BODY.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let sheet_url = env_required("SHEET_URL")?;
        let sheet_name = env_required("SHEET_NAME")?;
        let credentials_file = PathBuf::from(env_or("GOOGLE_SHEET_CREDENTIALS", "credentials.json"));

        let database_url = env_or("TICKETS_DATABASE_URL", "sqlite://tickets.db?mode=rwc");

        let host: IpAddr = env_or("TICKETS_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid TICKETS_HOST: {e}"))?;

        let port: u16 = env_or("TICKETS_PORT", "5000")
            .parse()
            .map_err(|e| format!("Invalid TICKETS_PORT: {e}"))?;

        let max_body_size: usize = env_or("TICKETS_MAX_BODY_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid TICKETS_MAX_BODY_SIZE: {e}"))?;

        let timeout_secs: u64 = env_or("TICKETS_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid TICKETS_TIMEOUT_SECS: {e}"))?;

        let sync_on_view = parse_bool("TICKETS_SYNC_ON_VIEW", &env_or("TICKETS_SYNC_ON_VIEW", "true"))?;

        let log_level = env_or("TICKETS_LOG_LEVEL", "info");

        let ticket_dir = PathBuf::from(env_or("TICKETS_TICKET_DIR", "qrcodes"));
        let ticket_template = env_optional("TICKETS_TICKET_TEMPLATE").map(PathBuf::from);

        let defaults = ColumnConfig::default();
        let columns = ColumnConfig {
            id: env_optional("TICKETS_COLUMN_ID"),
            timestamp: env_or("TICKETS_COLUMN_TIMESTAMP", &defaults.timestamp),
            email: env_or("TICKETS_COLUMN_EMAIL", &defaults.email),
            name: env_or("TICKETS_COLUMN_NAME", &defaults.name),
        };

        let smtp = match (env_optional("MAIL_USER"), env_optional("MAIL_PASS")) {
            (Some(user), Some(pass)) => Some(SmtpConfig {
                host: env_or("TICKETS_SMTP_HOST", "smtp.gmail.com"),
                port: env_or("TICKETS_SMTP_PORT", "587")
                    .parse()
                    .map_err(|e| format!("Invalid TICKETS_SMTP_PORT: {e}"))?,
                from: env_or("TICKETS_MAIL_FROM", &user),
                user,
                pass,
            }),
            _ => None,
        };

        let mail_defaults = MailConfig::default();
        let mail = MailConfig {
            subject: env_or("TICKETS_MAIL_SUBJECT", &mail_defaults.subject),
            body: env_or("TICKETS_MAIL_BODY", &mail_defaults.body),
        };

        Ok(Config {
            database_url,
            host,
            port,
            max_body_size,
            log_level,
            sync_on_view,
            timeout: Duration::from_secs(timeout_secs),
            ticket_dir,
            ticket_template,
            sheet: SheetConfig {
                credentials_file,
                sheet_url,
                sheet_name,
                columns,
            },
            smtp,
            mail,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid {key}: expected a boolean, got '{other}'")),
    }
}
