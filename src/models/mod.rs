mod scan_log;
mod submission;

pub use scan_log::ScanLogEntry;
pub use submission::{FormField, NewSubmission, Submission, TicketState};
