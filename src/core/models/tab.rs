use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
    pub status: TabStatus,
}

impl TabInfo {
    pub fn new(id: TabId, url: Option<String>, status: TabStatus) -> Self {
        Self { id, url, status }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TabStatus::Complete
    }
}

/// Emitted by the host whenever a tab's load status changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TabUpdate {
    pub tab_id: TabId,
    pub status: TabStatus,
}

/// Identifies where an inbound message came from. Messages sent by the
/// offscreen document or other extension pages carry no tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    pub fn from_tab(tab_id: TabId) -> Self {
        Self {
            tab_id: Some(tab_id),
        }
    }

    pub fn extension_page() -> Self {
        Self { tab_id: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_id_serializes_as_plain_number() {
        let serialized = serde_json::to_string(&TabId(42)).unwrap();
        assert_eq!(serialized, "42");
    }

    #[test]
    fn test_tab_status_uses_host_spelling() {
        let status: TabStatus = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(status, TabStatus::Complete);
    }

    #[test]
    fn test_tab_info_is_complete_reflects_status() {
        let loading = TabInfo::new(TabId(1), None, TabStatus::Loading);
        let complete = TabInfo::new(TabId(1), None, TabStatus::Complete);

        assert!(!loading.is_complete());
        assert!(complete.is_complete());
    }
}
