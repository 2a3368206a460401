use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::TicketService;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub service: TicketService,
}
