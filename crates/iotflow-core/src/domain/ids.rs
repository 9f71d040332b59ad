//! Identifier value objects and the identifier allocator.
//!
//! Node ids carry a kind prefix (`device-7`, `sensor-1718000000000`) so a
//! payload stays readable without the node table. Device nodes get an id
//! derived from their backing device, every other kind gets a fresh id per
//! creation event.
//!
//! # Known limitation
//!
//! The default [`IdScheme::Timestamp`] uses a millisecond wall clock. Two ids
//! minted with the same prefix inside the same millisecond are identical.
//! User-paced dragging never hits this, rapid programmatic creation can. The
//! store rejects the second node with [`CoreError::DuplicateId`](crate::CoreError).
//! [`IdScheme::Uuid`] removes the collision but changes the id shape, so it
//! is opt-in only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Value object: Node ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Value object: Edge ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

/// Value object: stored workflow ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub i64);

/// Value object: owning user ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Value object: externally-owned device ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

/// Value object: externally-owned sensor ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub i64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        })*
    };
}

display_inner!(NodeId, EdgeId, WorkflowId, UserId, DeviceId, SensorId);

impl NodeId {
    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl EdgeId {
    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

/// Deterministic node id for a device-bound node.
///
/// Dropping the same device twice yields the same id; de-duplication is up
/// to the caller.
pub fn device_node_id(device_id: DeviceId) -> NodeId {
    NodeId(format!("device-{}", device_id.0))
}

/// Source of the time component used by ephemeral ids
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall-clock time source backed by `chrono`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven time source for tests
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct ManualTimeSource(std::sync::atomic::AtomicI64);

#[cfg(any(test, feature = "testing"))]
impl ManualTimeSource {
    /// Create a time source frozen at `millis`
    pub fn at(millis: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(millis))
    }

    /// Move the clock forward
    pub fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "testing"))]
impl TimeSource for ManualTimeSource {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Shape of the unique component of freshly minted ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// `{prefix}-{millis}`; collides within one millisecond
    #[default]
    Timestamp,
    /// `{prefix}-{uuid v4}`
    Uuid,
}

impl std::str::FromStr for IdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Ok(IdScheme::Timestamp),
            "uuid" => Ok(IdScheme::Uuid),
            other => Err(format!("unknown id scheme '{}'", other)),
        }
    }
}

/// Mints ephemeral node ids and edge ids
#[derive(Clone)]
pub struct IdAllocator {
    scheme: IdScheme,
    clock: Arc<dyn TimeSource>,
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(IdScheme::default())
    }
}

impl IdAllocator {
    /// Create an allocator backed by the system clock
    pub fn new(scheme: IdScheme) -> Self {
        Self::with_time_source(scheme, Arc::new(SystemTimeSource))
    }

    /// Create an allocator with an explicit time source
    pub fn with_time_source(scheme: IdScheme, clock: Arc<dyn TimeSource>) -> Self {
        Self { scheme, clock }
    }

    /// The active id scheme
    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    fn unique_part(&self) -> String {
        match self.scheme {
            IdScheme::Timestamp => self.clock.now_millis().to_string(),
            IdScheme::Uuid => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// `{kind_prefix}-{time}` for nodes that are not device-bound
    pub fn ephemeral_id(&self, kind_prefix: &str) -> NodeId {
        NodeId(format!("{}-{}", kind_prefix, self.unique_part()))
    }

    /// Composite edge id, unique per creation event even for a repeated pair
    pub fn edge_id(&self, source: &NodeId, target: &NodeId) -> EdgeId {
        EdgeId(format!("edge-{}-{}-{}", source, target, self.unique_part()))
    }
}
