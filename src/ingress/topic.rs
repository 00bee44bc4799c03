//! Control topic namespace
//!
//! The session subscribes to everything under the control root and then
//! filters incoming topics by prefix.

/// Control root of the deployed topic tree
pub const DEFAULT_CONTROL_ROOT: &str = "blindcontrol";

/// Multi-level wildcard appended to the root for the subscription
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Application-level topic filter for control messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTopic {
    root: String,
    strict: bool,
}

impl ControlTopic {
    /// Plain byte-prefix matching: `blindcontrolX` matches root `blindcontrol`
    pub fn new<S: Into<String>>(root: S) -> Self {
        Self {
            root: root.into(),
            strict: false,
        }
    }

    /// Only the root itself or topics below `root/` match
    pub fn strict<S: Into<String>>(root: S) -> Self {
        Self {
            root: root.into(),
            strict: true,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Subscription filter covering every sub-topic: `<root>/#`
    pub fn subscription_filter(&self) -> String {
        format!("{}/{MULTI_LEVEL_WILDCARD}", self.root)
    }

    /// Case-sensitive prefix check on the raw topic bytes
    pub fn matches(&self, topic: &[u8]) -> bool {
        let root = self.root.as_bytes();
        if !topic.starts_with(root) {
            return false;
        }
        if !self.strict {
            return true;
        }
        matches!(topic.get(root.len()), None | Some(b'/'))
    }
}

impl Default for ControlTopic {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_ROOT)
    }
}
