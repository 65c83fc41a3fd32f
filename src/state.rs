//! Shared state for the common routes: every store the engine opened.

use crate::store::Store;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct AppState {
    pub stores: Arc<Vec<Store>>,
}
