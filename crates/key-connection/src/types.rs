use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dummy::DummyKey;

/// Transport channel a security key can be discovered over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Wired,
    Proximity,
}

impl ChannelKind {
    /// The channel that loses when this one reports a device first
    pub fn other(self) -> ChannelKind {
        match self {
            ChannelKind::Wired => ChannelKind::Proximity,
            ChannelKind::Proximity => ChannelKind::Wired,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Wired => write!(f, "wired"),
            ChannelKind::Proximity => write!(f, "proximity"),
        }
    }
}

/// Channels the host can currently use. Recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const VOID: CapabilitySet = CapabilitySet(0b00);
    pub const WIRED: CapabilitySet = CapabilitySet(0b01);
    pub const PROXIMITY: CapabilitySet = CapabilitySet(0b10);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits_truncate(bits: u8) -> Self {
        CapabilitySet(bits & (Self::WIRED.0 | Self::PROXIMITY.0))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn supports(self, channel: ChannelKind) -> bool {
        self.contains(CapabilitySet::from(channel))
    }

    pub fn insert(&mut self, other: CapabilitySet) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: CapabilitySet) {
        self.0 &= !other.0;
    }

    /// Channels in the set, wired first
    pub fn channels(self) -> Vec<ChannelKind> {
        [ChannelKind::Wired, ChannelKind::Proximity]
            .into_iter()
            .filter(|channel| self.supports(*channel))
            .collect()
    }
}

impl From<ChannelKind> for CapabilitySet {
    fn from(channel: ChannelKind) -> Self {
        match channel {
            ChannelKind::Wired => CapabilitySet::WIRED,
            ChannelKind::Proximity => CapabilitySet::PROXIMITY,
        }
    }
}

impl std::ops::BitOr for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | rhs.0)
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "void");
        }
        let names: Vec<String> = self.channels().iter().map(|c| c.to_string()).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Connection state, owned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    AwaitingConnect,
    Connected,
    AwaitingUnplug,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::AwaitingConnect => write!(f, "AwaitingConnect"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::AwaitingUnplug => write!(f, "AwaitingUnplug"),
        }
    }
}

/// A wired device as enumerated by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbDeviceRecord {
    /// Host-assigned device path, unique while attached
    pub device_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbDeviceRecord {
    pub fn new(device_name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            device_name: device_name.into(),
            vendor_id,
            product_id,
        }
    }
}

impl std::fmt::Display for UsbDeviceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} {}",
            self.vendor_id, self.product_id, self.device_name
        )
    }
}

/// Tag technologies a sensed tag may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagTechnology {
    IsoDep,
    NfcA,
    NfcB,
    Ndef,
    MifareUltralight,
}

/// A tag reported by the proximity reader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag_id: Vec<u8>,
    pub technologies: Vec<TagTechnology>,
}

impl TagRecord {
    pub fn new(tag_id: Vec<u8>, technologies: Vec<TagTechnology>) -> Self {
        Self {
            tag_id,
            technologies,
        }
    }

    pub fn has_technology(&self, technology: TagTechnology) -> bool {
        self.technologies.contains(&technology)
    }
}

impl std::fmt::Display for TagRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag ")?;
        for byte in &self.tag_id {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// An open session with a wired key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiredSession {
    pub device: UsbDeviceRecord,
    pub session_id: Uuid,
}

/// A live session with a key held against the proximity reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSession {
    pub tag: TagRecord,
    pub session_id: Uuid,
}

/// Handed to the caller on connect; not tracked afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceHandle {
    Wired(WiredSession),
    Proximity(TagSession),
    Dummy(DummyKey),
}

impl DeviceHandle {
    /// Channel the handle came from, `None` for the synthetic key
    pub fn channel(&self) -> Option<ChannelKind> {
        match self {
            DeviceHandle::Wired(_) => Some(ChannelKind::Wired),
            DeviceHandle::Proximity(_) => Some(ChannelKind::Proximity),
            DeviceHandle::Dummy(_) => None,
        }
    }
}
