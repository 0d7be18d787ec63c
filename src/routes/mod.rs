pub mod api;
pub mod telephony;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Every route the bridge serves, with state attached.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(telephony::create_telephony_router())
        .with_state(state)
}
