use regex::Regex;
use std::sync::LazyLock;

use super::MailMessage;
use crate::config::MailConfig;
use crate::models::Submission;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());

/// Subject and body with `{{placeholder}}` variables.
///
/// Known variables: `name`, `email`, `id` and `fields.<column header>`.
/// Unknown variables render as empty strings.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn render(&self, submission: &Submission) -> MailMessage {
        MailMessage {
            subject: render(&self.subject, submission),
            body: render(&self.body, submission),
        }
    }
}

impl From<&MailConfig> for MessageTemplate {
    fn from(config: &MailConfig) -> Self {
        Self::new(config.subject.clone(), config.body.clone())
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::from(&MailConfig::default())
    }
}

/// Replace {{variable}} placeholders with values from the submission.
pub fn render(template: &str, submission: &Submission) -> String {
    TEMPLATE_RE
        .replace_all(template, |caps: &regex::Captures| {
            resolve(&caps[1], submission).unwrap_or_default()
        })
        .to_string()
}

fn resolve(path: &str, submission: &Submission) -> Option<String> {
    match path.split_once('.') {
        Some(("fields", column)) => submission.field(column).map(|v| v.to_string()),
        Some(_) => None,
        None => match path {
            "name" => Some(submission.name.clone()),
            "email" => Some(submission.email.clone()),
            "id" => Some(submission.id.clone()),
            _ => None,
        },
    }
}
