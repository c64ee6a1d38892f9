use std::sync::Arc;

use crate::manager::SubscriptionManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SubscriptionManager>,
}
