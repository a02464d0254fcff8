use std::sync::Arc;

use crate::service::MatchService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchService>,
}
