//! Core identifier and value types shared across the shell.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Identifier of a logical workspace grouping related views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

/// Identifier of a page, unique within its flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(FlowId);
string_id!(PageId);

/// Registry key: one view per `(flow, page)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewKey {
    pub flow_id: FlowId,
    pub page_id: PageId,
}

impl ViewKey {
    pub fn new(flow_id: impl Into<FlowId>, page_id: impl Into<PageId>) -> Self {
        Self {
            flow_id: flow_id.into(),
            page_id: page_id.into(),
        }
    }

    /// Length-prefixed byte encoding used as the durable store key.
    ///
    /// `u32 BE flow length || flow || page`. The prefix keeps `("a/b", "c")`
    /// and `("a", "b/c")` distinct.
    pub fn storage_key(&self) -> Vec<u8> {
        let flow = self.flow_id.as_str().as_bytes();
        let page = self.page_id.as_str().as_bytes();
        let mut key = Vec::with_capacity(4 + flow.len() + page.len());
        key.extend_from_slice(&(flow.len() as u32).to_be_bytes());
        key.extend_from_slice(flow);
        key.extend_from_slice(page);
        key
    }

    /// Inverse of [`ViewKey::storage_key`].
    pub fn from_storage_key(bytes: &[u8]) -> Option<Self> {
        let len_bytes: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        let flow_len = u32::from_be_bytes(len_bytes) as usize;
        let flow = bytes.get(4..4 + flow_len)?;
        let page = bytes.get(4 + flow_len..)?;
        Some(Self {
            flow_id: FlowId::new(std::str::from_utf8(flow).ok()?),
            page_id: PageId::new(std::str::from_utf8(page).ok()?),
        })
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.flow_id, self.page_id)
    }
}

/// Pane geometry in device-independent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Opaque navigation context reported by the content layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    /// Renderer-owned history blob. Never interpreted by the shell.
    pub blob: Vec<u8>,
    /// Position within the session history at capture time.
    pub history_index: usize,
}

impl NavigationState {
    pub fn new(blob: Vec<u8>, history_index: usize) -> Self {
        Self { blob, history_index }
    }
}

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static EPOCH_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique view epoch.
///
/// A view keeps its epoch for its whole lifetime; a removed and re-created
/// key gets a fresh one, which is how late async completions are detected.
pub(crate) fn next_epoch() -> u64 {
    EPOCH_COUNTER.fetch_add(1, Ordering::Relaxed)
}
