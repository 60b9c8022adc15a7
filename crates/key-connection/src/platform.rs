// Platform abstraction layer for key discovery
// Host-specific query, subscription and device-open surfaces live behind these traits

use crate::types::{TagRecord, TagSession, TagTechnology, UsbDeviceRecord, WiredSession};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Notification kinds a subscription can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GrantResponse,
    DeviceAttached,
    DeviceDetached,
    DeviceSensed,
    Lifecycle,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::GrantResponse => write!(f, "grant-response"),
            NotificationKind::DeviceAttached => write!(f, "device-attached"),
            NotificationKind::DeviceDetached => write!(f, "device-detached"),
            NotificationKind::DeviceSensed => write!(f, "device-sensed"),
            NotificationKind::Lifecycle => write!(f, "lifecycle"),
        }
    }
}

/// Proof of one registration. Consumed by the matching unregister call, so
/// holding one is the same as being registered.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: Uuid,
    kind: NotificationKind,
}

impl SubscriptionHandle {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }
}

/// Foreground polling parameters for the proximity reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingRequest {
    /// Technologies the listener is restricted to
    pub technologies: Vec<TagTechnology>,
    /// Also match tags carrying an NDEF message
    pub ndef_filter: bool,
    /// Take priority over other listeners while foregrounded
    pub foreground_priority: bool,
}

impl PollingRequest {
    pub fn security_key() -> Self {
        Self {
            technologies: vec![TagTechnology::IsoDep],
            ndef_filter: true,
            foreground_priority: true,
        }
    }
}

/// Read-only capability queries
pub trait CapabilitySource: Send + Sync + Debug {
    /// Host can act as a wired (USB host mode) master
    fn has_wired_host(&self) -> bool;

    /// Proximity hardware is present
    fn has_proximity_hardware(&self) -> bool;

    /// Proximity hardware is switched on by the user
    fn is_proximity_enabled(&self) -> bool;
}

/// Wired device enumeration and access grants
pub trait UsbHost: Send + Sync + Debug {
    /// Devices currently attached, recognized or not
    fn attached_devices(&self) -> Vec<UsbDeviceRecord>;

    /// Whether this process already holds an access grant for the device
    fn has_grant(&self, device: &UsbDeviceRecord) -> bool;

    /// Prompt for an access grant. The answer arrives later as a
    /// grant-response notification.
    fn request_grant(&self, device: &UsbDeviceRecord) -> Result<()>;

    /// Open a session with a device whose grant is held
    fn open(&self, device: &UsbDeviceRecord) -> Result<WiredSession>;
}

/// Broadcast-style notification registry
pub trait NotificationBus: Send + Sync + Debug {
    fn register(&self, kind: NotificationKind) -> Result<SubscriptionHandle>;

    /// Fails with `NotRegistered` if the handle is unknown to the registry
    fn unregister(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Proximity reader with foreground polling
pub trait ProximityReader: Send + Sync + Debug {
    fn enable_foreground_polling(&self, request: &PollingRequest) -> Result<SubscriptionHandle>;

    fn disable_foreground_polling(&self, handle: SubscriptionHandle) -> Result<()>;

    /// Perform the technology handshake. `None` when the tag does not
    /// support it.
    fn connect_tag(&self, tag: &TagRecord, technology: TagTechnology) -> Option<TagSession>;
}

/// Source of host-surface lifecycle phases
pub trait LifecycleSource: Send + Sync + Debug {
    fn register_observer(&self) -> Result<SubscriptionHandle>;

    fn unregister_observer(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Every host surface the core talks to
#[derive(Debug, Clone)]
pub struct PlatformServices {
    pub capabilities: Arc<dyn CapabilitySource>,
    pub usb: Arc<dyn UsbHost>,
    pub bus: Arc<dyn NotificationBus>,
    pub reader: Arc<dyn ProximityReader>,
    pub lifecycle: Arc<dyn LifecycleSource>,
}

impl PlatformServices {
    /// Build from one object implementing every surface
    pub fn from_platform<P>(platform: Arc<P>) -> Self
    where
        P: CapabilitySource + UsbHost + NotificationBus + ProximityReader + LifecycleSource + 'static,
    {
        Self {
            capabilities: platform.clone(),
            usb: platform.clone(),
            bus: platform.clone(),
            reader: platform.clone(),
            lifecycle: platform,
        }
    }
}
