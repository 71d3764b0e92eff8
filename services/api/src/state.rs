//! Application state shared across request handlers.

use std::sync::Arc;

use crate::service::OccupancyService;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: OccupancyService,
}

impl AppState {
    pub fn new(service: OccupancyService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    /// Get a reference to the occupancy service.
    pub fn service(&self) -> &OccupancyService {
        &self.inner.service
    }
}
