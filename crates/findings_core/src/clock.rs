//! Injectable wall clock.

use crate::types::format_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Time provider trait for testing.
///
/// Allows injecting controlled time into stores so ordering and timestamp
/// behaviour can be tested. Only used when set via `with_time_provider()`.
pub trait TimeProvider: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

impl<F> TimeProvider for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// System time unless a provider was injected.
#[derive(Clone, Default)]
pub(crate) struct Clock {
    provider: Option<Arc<dyn TimeProvider>>,
}

impl Clock {
    pub(crate) fn with_provider(provider: impl TimeProvider + 'static) -> Self {
        Self {
            provider: Some(Arc::new(provider)),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        match &self.provider {
            Some(provider) => provider.now(),
            None => Utc::now(),
        }
    }

    /// Current time in the record timestamp format.
    pub(crate) fn timestamp(&self) -> String {
        format_timestamp(self.now())
    }
}
