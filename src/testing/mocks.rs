//! Mock implementations for testing
//!
//! Provides a mock subscribe seam so the event handler can be exercised
//! without a broker.

use crate::error::IngressError;
use crate::transport::SubscribeRequester;
use std::sync::{Mutex, MutexGuard};

/// Mock subscriber recording every requested filter
#[derive(Debug, Default)]
pub struct MockSubscriber {
    requested: Mutex<Vec<String>>,
    pub should_fail: bool,
}

impl MockSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Filters requested so far, including failed attempts
    pub fn requested_filters(&self) -> Vec<String> {
        self.lock_requested().clone()
    }

    pub fn clear_history(&self) {
        self.lock_requested().clear();
    }

    fn lock_requested(&self) -> MutexGuard<'_, Vec<String>> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SubscribeRequester for MockSubscriber {
    fn request_subscribe(&self, filter: &str) -> Result<(), IngressError> {
        self.lock_requested().push(filter.to_string());

        if self.should_fail {
            return Err(IngressError::subscribe_failed(
                filter,
                "Mock subscribe failure",
            ));
        }
        Ok(())
    }
}
