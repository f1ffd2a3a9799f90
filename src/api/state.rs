//! Application state for the API server

use crate::{Config, VideoConverter};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the converter instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main VideoConverter instance
    pub converter: Arc<VideoConverter>,

    /// Configuration (read access only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(converter: Arc<VideoConverter>, config: Arc<Config>) -> Self {
        Self { converter, config }
    }
}
