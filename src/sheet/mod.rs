pub mod google;

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::ColumnConfig;
use crate::error::TicketError;
use crate::models::{FormField, NewSubmission};

pub use google::GoogleSheetReader;

/// Read-only source of registrations, in sheet order.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fails with `SourceUnavailable` when the sheet cannot be read. No retries.
    async fn fetch(&self) -> Result<Vec<NewSubmission>, TicketError>;
}

/// Turn raw sheet values (first row = header) into registrations.
///
/// Rows without a name, an email or a usable identifier are skipped, as are
/// rows repeating an identifier already taken by an earlier row.
pub fn parse_rows(values: &[Vec<String>], columns: &ColumnConfig) -> Vec<NewSubmission> {
    let Some((headers, rows)) = values.split_first() else {
        return Vec::new();
    };

    let mut submissions = Vec::with_capacity(rows.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        // +2: one for the header, one for 1-based sheet rows
        let row_number = index + 2;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let fields: Vec<FormField> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| FormField {
                name: header.clone(),
                value: row.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        let cell = |column: &str| -> String {
            fields
                .iter()
                .find(|f| f.name == column)
                .map(|f| f.value.trim().to_string())
                .unwrap_or_default()
        };

        let name = cell(&columns.name);
        let email = cell(&columns.email);
        if name.is_empty() || email.is_empty() {
            tracing::warn!("Skipping sheet row {row_number}: missing name or email");
            continue;
        }

        let explicit_id = columns
            .id
            .as_deref()
            .map(|column| cell(column))
            .filter(|id| !id.is_empty());

        let id = match explicit_id {
            Some(id) if is_valid_identifier(&id) => id,
            Some(id) => {
                tracing::warn!(
                    "Skipping sheet row {row_number}: identifier '{id}' may only contain letters, digits, '-' and '_'"
                );
                continue;
            }
            None => {
                let timestamp = cell(&columns.timestamp);
                if timestamp.is_empty() {
                    tracing::warn!("Skipping sheet row {row_number}: no identifier or timestamp");
                    continue;
                }
                derive_identifier(&timestamp, &email)
            }
        };

        if let Some(first_row) = seen.get(&id) {
            tracing::warn!(
                "Skipping sheet row {row_number}: identifier '{id}' already used by row {first_row}"
            );
            continue;
        }
        seen.insert(id.clone(), row_number);

        submissions.push(NewSubmission {
            id,
            name,
            email,
            fields,
        });
    }

    submissions
}

/// Identifier for a form response: the timestamp's digits and letters plus a
/// short hash of timestamp and email, e.g. `1032025143501_3f9a1c2e`.
pub fn derive_identifier(timestamp: &str, email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(email.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let stamp: String = timestamp.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{stamp}_{}", &digest[..8])
}

/// Identifiers end up in filenames and URLs, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
