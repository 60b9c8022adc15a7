// Wired channel - access-grant protocol for attached keys
// Handles enumeration, grant prompts and the detach watch used for unplug notices

use crate::identity::DeviceIdentity;
use crate::platform::{NotificationBus, NotificationKind, SubscriptionHandle, UsbHost};
use crate::types::{UsbDeviceRecord, WiredSession};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct WiredChannel {
    usb: Arc<dyn UsbHost>,
    bus: Arc<dyn NotificationBus>,
    identity: DeviceIdentity,
    attach_subscription: Option<SubscriptionHandle>,
    grant_subscription: Option<SubscriptionHandle>,
    detach_subscription: Option<SubscriptionHandle>,
}

impl WiredChannel {
    pub fn new(usb: Arc<dyn UsbHost>, bus: Arc<dyn NotificationBus>) -> Self {
        Self {
            usb,
            bus,
            identity: DeviceIdentity::yubikey_usb(),
            attach_subscription: None,
            grant_subscription: None,
            detach_subscription: None,
        }
    }

    /// Listening for attach and grant-response notifications
    pub fn is_armed(&self) -> bool {
        self.attach_subscription.is_some() || self.grant_subscription.is_some()
    }

    pub fn is_watching_detach(&self) -> bool {
        self.detach_subscription.is_some()
    }

    pub fn is_recognized(&self, device: &UsbDeviceRecord) -> bool {
        self.identity.matches_usb(device)
    }

    /// Any recognized key currently attached
    pub fn is_recognized_present(&self) -> bool {
        self.usb
            .attached_devices()
            .iter()
            .any(|device| self.is_recognized(device))
    }

    /// Subscribe and request access to every attached key. Returns a session
    /// if a key was already granted. Arming twice is a no-op.
    pub fn arm(&mut self) -> Option<WiredSession> {
        if self.is_armed() {
            debug!("Wired channel already armed");
            return None;
        }

        info!("Arming wired channel");

        match self.bus.register(NotificationKind::GrantResponse) {
            Ok(handle) => self.grant_subscription = Some(handle),
            Err(e) => {
                e.log_tolerated("register grant-response");
                return None;
            }
        }

        match self.bus.register(NotificationKind::DeviceAttached) {
            Ok(handle) => self.attach_subscription = Some(handle),
            Err(e) => {
                e.log_tolerated("register device-attached");
                self.disarm();
                return None;
            }
        }

        self.evaluate_attached()
    }

    /// Drop attach and grant-response subscriptions. Safe when not armed.
    pub fn disarm(&mut self) {
        if !self.is_armed() {
            return;
        }

        info!("Disarming wired channel");
        if let Some(handle) = self.grant_subscription.take() {
            self.release(handle);
        }
        if let Some(handle) = self.attach_subscription.take() {
            self.release(handle);
        }
    }

    /// Start listening for detach of a recognized key. No-op if already watching.
    pub fn arm_detach_watch(&mut self) -> bool {
        if self.is_watching_detach() {
            return true;
        }

        match self.bus.register(NotificationKind::DeviceDetached) {
            Ok(handle) => {
                debug!("Detach watch armed");
                self.detach_subscription = Some(handle);
                true
            }
            Err(e) => {
                e.log_tolerated("register device-detached");
                false
            }
        }
    }

    pub fn disarm_detach_watch(&mut self) {
        if let Some(handle) = self.detach_subscription.take() {
            debug!("Detach watch disarmed");
            self.release(handle);
        }
    }

    /// A device appeared while armed
    pub fn on_attached(&self, device: &UsbDeviceRecord) -> Option<WiredSession> {
        if !self.is_armed() {
            debug!("Ignoring attach of {} while disarmed", device);
            return None;
        }
        self.request_access(device)
    }

    /// The host answered a grant prompt
    pub fn on_grant_response(&self, device: &UsbDeviceRecord, granted: bool) -> Option<WiredSession> {
        if !self.is_armed() {
            debug!("Ignoring grant response for {} while disarmed", device);
            return None;
        }

        if !self.is_recognized(device) {
            debug!("Ignoring grant response for unrecognized device {}", device);
            return None;
        }

        // Unplugged before the prompt was answered
        if !self.usb.attached_devices().contains(device) {
            debug!("Ignoring grant response for detached device {}", device);
            return None;
        }

        if !granted {
            info!("Access to {} was denied", device);
            return None;
        }

        self.request_access(device)
    }

    /// Open the device if the grant is held, otherwise prompt for it
    pub fn request_access(&self, device: &UsbDeviceRecord) -> Option<WiredSession> {
        if !self.is_recognized(device) {
            debug!("Ignoring unrecognized device {}", device);
            return None;
        }

        if self.usb.has_grant(device) {
            return match self.usb.open(device) {
                Ok(session) => {
                    info!("Opened wired session with {}", device);
                    Some(session)
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", device, e);
                    None
                }
            };
        }

        match self.usb.request_grant(device) {
            Ok(()) => debug!("Access grant requested for {}", device),
            Err(e) => warn!("Failed to request access grant for {}: {}", device, e),
        }
        None
    }

    fn evaluate_attached(&self) -> Option<WiredSession> {
        self.usb
            .attached_devices()
            .iter()
            .find_map(|device| self.request_access(device))
    }

    fn release(&self, handle: SubscriptionHandle) {
        let kind = handle.kind();
        if let Err(e) = self.bus.unregister(handle) {
            e.log_tolerated(&format!("unregister {}", kind));
        }
    }
}

impl Drop for WiredChannel {
    fn drop(&mut self) {
        self.disarm();
        self.disarm_detach_watch();
    }
}
