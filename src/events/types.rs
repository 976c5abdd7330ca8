use serde::{Deserialize, Serialize};

use crate::models::ItemId;

/// Lifecycle notifications published by the download manager. For any one
/// item, `Progress` percents are non-decreasing and lie in `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    Started { id: ItemId, name: String },
    Progress { id: ItemId, percent: u8 },
    Completed { id: ItemId, size_bytes: u64 },
    Failed { id: ItemId, message: String },
    Cancelled { id: ItemId },
    /// A failed task left the active set after its grace period
    Evicted { id: ItemId },
    Deleted { id: ItemId },
}

impl DownloadEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            DownloadEvent::Started { id, .. }
            | DownloadEvent::Progress { id, .. }
            | DownloadEvent::Completed { id, .. }
            | DownloadEvent::Failed { id, .. }
            | DownloadEvent::Cancelled { id }
            | DownloadEvent::Evicted { id }
            | DownloadEvent::Deleted { id } => *id,
        }
    }

    /// True once nothing more will be published for this transfer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadEvent::Completed { .. }
                | DownloadEvent::Cancelled { .. }
                | DownloadEvent::Evicted { .. }
        )
    }
}

/// Keys the player reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Space,
    Char(char),
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

/// Input coming from the surrounding presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnvironmentEvent {
    PointerMoved,
    KeyPressed(Key),
    /// The platform entered or left fullscreen, possibly on its own
    FullscreenChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        let id = ItemId::new(3);
        assert!(DownloadEvent::Completed { id, size_bytes: 1 }.is_terminal());
        assert!(DownloadEvent::Cancelled { id }.is_terminal());
        assert!(!DownloadEvent::Failed { id, message: "x".into() }.is_terminal());
        assert!(!DownloadEvent::Progress { id, percent: 100 }.is_terminal());
        assert_eq!(DownloadEvent::Evicted { id }.item_id(), id);
    }

    #[test]
    fn test_download_event_json_shape() {
        let json = serde_json::to_value(DownloadEvent::Progress {
            id: ItemId::new(5),
            percent: 40,
        })
        .unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["id"], 5);
        assert_eq!(json["percent"], 40);
    }
}
