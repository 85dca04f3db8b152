use std::sync::Arc;
use crate::client_key::ClientKeyResolver;
use crate::forwarder::Forwarder;
use crate::rate_limit::RateTracker;
// app's shared state

pub struct AppState {
    pub resolver: ClientKeyResolver,
    pub tracker: Arc<dyn RateTracker>, // owned here, never global
    pub forwarder: Arc<dyn Forwarder>,
}

impl AppState {
    pub fn new(
        resolver: ClientKeyResolver,
        tracker: Arc<dyn RateTracker>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            resolver,
            tracker,
            forwarder,
        }
    }
}
