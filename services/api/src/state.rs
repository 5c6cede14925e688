//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources the HTTP handlers need.

use crate::config::Config;
use crate::lifecycle::SessionLifecycle;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SessionLifecycle>,
    pub config: Arc<Config>,
}
