use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One form column and the registrant's answer, in sheet order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// A registrant as read from the sheet, before any ticket lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    pub fields: Vec<FormField>,
}

impl NewSubmission {
    pub fn field(&self, name: &str) -> Option<&str> {
        field_value(&self.fields, name)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub name: String,
    pub email: String,
    #[sqlx(json)]
    pub fields: Vec<FormField>,
    pub ticket_generated: bool,
    pub ticket_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn state(&self) -> TicketState {
        if self.redeemed {
            TicketState::Redeemed
        } else if self.ticket_sent {
            TicketState::Sent
        } else if self.ticket_generated {
            TicketState::TicketGenerated
        } else {
            TicketState::New
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        field_value(&self.fields, name)
    }
}

/// Lifecycle derived from the stored flags. `Redeemed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketState {
    New,
    TicketGenerated,
    Sent,
    Redeemed,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::New => "NEW",
            TicketState::TicketGenerated => "TICKET_GENERATED",
            TicketState::Sent => "SENT",
            TicketState::Redeemed => "REDEEMED",
        }
    }

    pub fn can_send(&self) -> bool {
        matches!(self, TicketState::New | TicketState::TicketGenerated)
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn field_value<'a>(fields: &'a [FormField], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.value.as_str())
}
