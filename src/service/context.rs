//! Shared handles every service is built from.

use std::sync::Arc;

use crate::config::EngineSettings;
use crate::domain::{ActivityLog, Clock, EventBus, EventRegistry};

/// Stores, event bus, clock and rules shared by all services.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Event aggregates.
    pub registry: Arc<EventRegistry>,
    /// Check-ins and rewards.
    pub activity: Arc<ActivityLog>,
    /// Outbound event channel.
    pub event_bus: EventBus,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Business rules.
    pub settings: EngineSettings,
}

impl EngineContext {
    /// Creates a context with empty stores.
    #[must_use]
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            registry: Arc::new(EventRegistry::new()),
            activity: Arc::new(ActivityLog::new()),
            event_bus,
            clock,
            settings,
        }
    }
}
