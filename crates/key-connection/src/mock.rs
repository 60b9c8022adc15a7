//! In-memory platform for tests and the simulator.
//!
//! Implements every platform surface, records registrations and grant
//! prompts, and only delivers notifications whose kind is currently
//! registered, the way a broadcast registry would.

use crate::lifecycle::SurfacePhase;
use crate::platform::{
    CapabilitySource, LifecycleSource, NotificationBus, NotificationKind, PollingRequest,
    ProximityReader, SubscriptionHandle, UsbHost,
};
use crate::router::{HostEvent, PlatformEvent};
use crate::types::{
    CapabilitySet, TagRecord, TagSession, TagTechnology, UsbDeviceRecord, WiredSession,
};
use crate::{ConnectionError, Result};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct MockPlatform {
    wired_host: bool,
    proximity_hardware: AtomicBool,
    proximity_enabled: AtomicBool,
    attached: Mutex<Vec<UsbDeviceRecord>>,
    grants: DashSet<UsbDeviceRecord>,
    grant_requests: Mutex<Vec<UsbDeviceRecord>>,
    open_fails: AtomicBool,
    tag_handshake: AtomicBool,
    registrations: DashMap<Uuid, NotificationKind>,
    peak_registrations: DashMap<NotificationKind, usize>,
    polling_requests: Mutex<Vec<PollingRequest>>,
    teardown_failures: AtomicUsize,
    sender: Mutex<Option<mpsc::UnboundedSender<HostEvent>>>,
}

impl MockPlatform {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            wired_host: capabilities.contains(CapabilitySet::WIRED),
            proximity_hardware: AtomicBool::new(capabilities.contains(CapabilitySet::PROXIMITY)),
            proximity_enabled: AtomicBool::new(capabilities.contains(CapabilitySet::PROXIMITY)),
            attached: Mutex::new(Vec::new()),
            grants: DashSet::new(),
            grant_requests: Mutex::new(Vec::new()),
            open_fails: AtomicBool::new(false),
            tag_handshake: AtomicBool::new(true),
            registrations: DashMap::new(),
            peak_registrations: DashMap::new(),
            polling_requests: Mutex::new(Vec::new()),
            teardown_failures: AtomicUsize::new(0),
            sender: Mutex::new(None),
        }
    }

    /// Receiver for every event the platform delivers from now on
    pub fn events(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sender) = self.sender.lock() {
            *sender = Some(tx);
        }
        rx
    }

    pub fn set_proximity_enabled(&self, enabled: bool) {
        self.proximity_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_tag_handshake(&self, available: bool) {
        self.tag_handshake.store(available, Ordering::SeqCst);
    }

    pub fn set_open_fails(&self, fails: bool) {
        self.open_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_grant(&self, device: &UsbDeviceRecord, granted: bool) {
        if granted {
            self.grants.insert(device.clone());
        } else {
            self.grants.remove(device);
        }
    }

    /// Add a device to the attached list without notifying
    pub fn attach(&self, device: UsbDeviceRecord) {
        if let Ok(mut attached) = self.attached.lock() {
            if !attached.contains(&device) {
                attached.push(device);
            }
        }
    }

    /// Remove a device from the attached list without notifying
    pub fn detach(&self, device: &UsbDeviceRecord) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.retain(|d| d != device);
        }
    }

    /// Attach and broadcast. Returns whether anyone was listening.
    pub fn plug_in(&self, device: UsbDeviceRecord) -> bool {
        self.attach(device.clone());
        self.emit(PlatformEvent::DeviceAttached { device })
    }

    /// Detach and broadcast. Returns whether anyone was listening.
    pub fn unplug(&self, device: UsbDeviceRecord) -> bool {
        self.detach(&device);
        self.emit(PlatformEvent::DeviceDetached { device })
    }

    /// The user answered a grant prompt
    pub fn answer_grant(&self, device: UsbDeviceRecord, granted: bool) -> bool {
        self.set_grant(&device, granted);
        self.emit(PlatformEvent::GrantResponse { device, granted })
    }

    /// A tag came into range of the reader
    pub fn sense(&self, tag: TagRecord) -> bool {
        self.emit(PlatformEvent::DeviceSensed { tag })
    }

    /// Broadcast a notification if its kind is registered
    pub fn emit(&self, event: PlatformEvent) -> bool {
        if self.registration_count(event.kind()) == 0 {
            debug!("Mock platform dropping unregistered {}", event.kind());
            return false;
        }
        self.send(HostEvent::Platform(event))
    }

    /// Deliver a lifecycle phase if an observer is registered
    pub fn emit_phase(&self, phase: SurfacePhase) -> bool {
        if self.registration_count(NotificationKind::Lifecycle) == 0 {
            return false;
        }
        self.send(HostEvent::Lifecycle(phase))
    }

    pub fn session_for(&self, device: &UsbDeviceRecord) -> WiredSession {
        WiredSession {
            device: device.clone(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn registration_count(&self, kind: NotificationKind) -> usize {
        self.registrations
            .iter()
            .filter(|entry| *entry.value() == kind)
            .count()
    }

    /// Highest number of simultaneous registrations ever seen for a kind
    pub fn peak_registrations(&self, kind: NotificationKind) -> usize {
        self.peak_registrations
            .get(&kind)
            .map(|peak| *peak)
            .unwrap_or(0)
    }

    pub fn total_registrations(&self) -> usize {
        self.registrations.len()
    }

    pub fn teardown_failures(&self) -> usize {
        self.teardown_failures.load(Ordering::SeqCst)
    }

    pub fn grant_requests(&self) -> Vec<UsbDeviceRecord> {
        self.grant_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn polling_requests(&self) -> Vec<PollingRequest> {
        self.polling_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn send(&self, event: HostEvent) -> bool {
        match self.sender.lock() {
            Ok(sender) => match sender.as_ref() {
                Some(tx) => tx.send(event).is_ok(),
                None => true,
            },
            Err(_) => false,
        }
    }

    fn add_registration(&self, kind: NotificationKind) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new(kind);
        self.registrations.insert(handle.id(), kind);

        let current = self.registration_count(kind);
        let mut peak = self.peak_registrations.entry(kind).or_insert(0);
        if current > *peak {
            *peak = current;
        }
        handle
    }

    fn remove_registration(&self, handle: SubscriptionHandle) -> Result<()> {
        if self.registrations.remove(&handle.id()).is_none() {
            self.teardown_failures.fetch_add(1, Ordering::SeqCst);
            return Err(ConnectionError::NotRegistered(handle.kind().to_string()));
        }
        Ok(())
    }
}

impl CapabilitySource for MockPlatform {
    fn has_wired_host(&self) -> bool {
        self.wired_host
    }

    fn has_proximity_hardware(&self) -> bool {
        self.proximity_hardware.load(Ordering::SeqCst)
    }

    fn is_proximity_enabled(&self) -> bool {
        self.proximity_enabled.load(Ordering::SeqCst)
    }
}

impl UsbHost for MockPlatform {
    fn attached_devices(&self) -> Vec<UsbDeviceRecord> {
        self.attached
            .lock()
            .map(|attached| attached.clone())
            .unwrap_or_default()
    }

    fn has_grant(&self, device: &UsbDeviceRecord) -> bool {
        self.grants.contains(device)
    }

    fn request_grant(&self, device: &UsbDeviceRecord) -> Result<()> {
        self.grant_requests
            .lock()
            .map_err(|e| ConnectionError::Platform(e.to_string()))?
            .push(device.clone());
        Ok(())
    }

    fn open(&self, device: &UsbDeviceRecord) -> Result<WiredSession> {
        if !self.has_grant(device) {
            return Err(ConnectionError::Platform(format!("no access grant for {}", device)));
        }
        if self.open_fails.load(Ordering::SeqCst) {
            return Err(ConnectionError::DeviceOpenFailed(device.to_string()));
        }
        Ok(self.session_for(device))
    }
}

impl NotificationBus for MockPlatform {
    fn register(&self, kind: NotificationKind) -> Result<SubscriptionHandle> {
        Ok(self.add_registration(kind))
    }

    fn unregister(&self, handle: SubscriptionHandle) -> Result<()> {
        self.remove_registration(handle)
    }
}

impl ProximityReader for MockPlatform {
    fn enable_foreground_polling(&self, request: &PollingRequest) -> Result<SubscriptionHandle> {
        self.polling_requests
            .lock()
            .map_err(|e| ConnectionError::Platform(e.to_string()))?
            .push(request.clone());
        Ok(self.add_registration(NotificationKind::DeviceSensed))
    }

    fn disable_foreground_polling(&self, handle: SubscriptionHandle) -> Result<()> {
        self.remove_registration(handle)
    }

    fn connect_tag(&self, tag: &TagRecord, technology: TagTechnology) -> Option<TagSession> {
        if !self.tag_handshake.load(Ordering::SeqCst) || !tag.has_technology(technology) {
            return None;
        }
        Some(TagSession {
            tag: tag.clone(),
            session_id: Uuid::new_v4(),
        })
    }
}

impl LifecycleSource for MockPlatform {
    fn register_observer(&self) -> Result<SubscriptionHandle> {
        Ok(self.add_registration(NotificationKind::Lifecycle))
    }

    fn unregister_observer(&self, handle: SubscriptionHandle) -> Result<()> {
        self.remove_registration(handle)
    }
}
