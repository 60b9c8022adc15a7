// Event router - single entry point for platform notifications
// Normalizes raw notifications into coordinator transitions

use crate::coordinator::ConnectionCoordinator;
use crate::lifecycle::{LifecycleObserver, SurfacePhase};
use crate::platform::NotificationKind;
use crate::types::{DeviceHandle, TagRecord, UsbDeviceRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Raw notification delivered by the platform bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformEvent {
    GrantResponse {
        device: UsbDeviceRecord,
        granted: bool,
    },
    DeviceAttached {
        device: UsbDeviceRecord,
    },
    DeviceDetached {
        device: UsbDeviceRecord,
    },
    DeviceSensed {
        tag: TagRecord,
    },
}

impl PlatformEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            PlatformEvent::GrantResponse { .. } => NotificationKind::GrantResponse,
            PlatformEvent::DeviceAttached { .. } => NotificationKind::DeviceAttached,
            PlatformEvent::DeviceDetached { .. } => NotificationKind::DeviceDetached,
            PlatformEvent::DeviceSensed { .. } => NotificationKind::DeviceSensed,
        }
    }
}

/// Everything the host feeds into the single actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    Platform(PlatformEvent),
    Lifecycle(SurfacePhase),
}

/// What routing one event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Connect callback invoked
    Connected,
    /// Unplug callback invoked
    Unplugged,
    /// Wired key removed with nobody waiting
    Removed,
    /// Accepted, waiting on the platform (grant prompt outstanding)
    Pending,
    /// Stale, unrecognized or unexpected
    Discarded,
}

/// Receives platform notifications
pub trait NotificationObserver {
    fn on_notification(&mut self, event: PlatformEvent) -> RouteOutcome;
}

pub struct EventRouter;

impl EventRouter {
    /// Translate one notification into a coordinator transition
    pub fn route(coordinator: &mut ConnectionCoordinator, event: PlatformEvent) -> RouteOutcome {
        debug!("Routing {} notification", event.kind());

        match event {
            PlatformEvent::DeviceAttached { device } => {
                if !coordinator.is_connect_pending() {
                    debug!("Discarding attach of {}: no connect request pending", device);
                    return RouteOutcome::Discarded;
                }
                if !coordinator.wired().is_recognized(&device) {
                    debug!("Discarding attach of unrecognized {}", device);
                    return RouteOutcome::Discarded;
                }
                match coordinator.wired().on_attached(&device) {
                    Some(session) => Self::deliver(coordinator, DeviceHandle::Wired(session)),
                    None => RouteOutcome::Pending,
                }
            }
            PlatformEvent::GrantResponse { device, granted } => {
                if !coordinator.is_connect_pending() {
                    debug!("Discarding grant response for {}: no connect request pending", device);
                    return RouteOutcome::Discarded;
                }
                match coordinator.wired().on_grant_response(&device, granted) {
                    Some(session) => Self::deliver(coordinator, DeviceHandle::Wired(session)),
                    None => RouteOutcome::Discarded,
                }
            }
            PlatformEvent::DeviceDetached { device } => {
                if !coordinator.wired().is_recognized(&device) {
                    debug!("Discarding detach of unrecognized {}", device);
                    return RouteOutcome::Discarded;
                }
                // Watch released on stop; start re-checks presence instead
                if coordinator.is_unplug_pending() && !coordinator.wired().is_watching_detach() {
                    debug!("Discarding detach of {}: detach watch not armed", device);
                    return RouteOutcome::Discarded;
                }
                let was_connected = coordinator.connected_via().is_some();
                if coordinator.on_device_removed() {
                    RouteOutcome::Unplugged
                } else if was_connected && coordinator.connected_via().is_none() {
                    RouteOutcome::Removed
                } else {
                    RouteOutcome::Discarded
                }
            }
            PlatformEvent::DeviceSensed { tag } => {
                if !coordinator.is_connect_pending() {
                    debug!("Discarding {}: no connect request pending", tag);
                    return RouteOutcome::Discarded;
                }
                match coordinator.proximity().on_sensed(&tag) {
                    Some(session) => Self::deliver(coordinator, DeviceHandle::Proximity(session)),
                    None => RouteOutcome::Discarded,
                }
            }
        }
    }

    /// Drain host events into one observer until the channel closes or the
    /// surface is destroyed
    pub async fn pump<O>(observer: &mut O, events: &mut mpsc::UnboundedReceiver<HostEvent>)
    where
        O: NotificationObserver + LifecycleObserver,
    {
        while let Some(event) = events.recv().await {
            match event {
                HostEvent::Platform(notification) => {
                    observer.on_notification(notification);
                }
                HostEvent::Lifecycle(phase) => {
                    observer.on_phase(phase);
                    if phase == SurfacePhase::Destroyed {
                        info!("Surface destroyed, event pump stopping");
                        return;
                    }
                }
            }
        }
        debug!("Host event channel closed");
    }

    fn deliver(coordinator: &mut ConnectionCoordinator, handle: DeviceHandle) -> RouteOutcome {
        if coordinator.on_device_available(handle) {
            RouteOutcome::Connected
        } else {
            RouteOutcome::Discarded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        let device = UsbDeviceRecord::new("/dev/bus/usb/001/002", 0x1050, 0x0407);

        let event = PlatformEvent::GrantResponse {
            device: device.clone(),
            granted: true,
        };
        assert_eq!(event.kind(), NotificationKind::GrantResponse);

        let event = PlatformEvent::DeviceDetached { device };
        assert_eq!(event.kind(), NotificationKind::DeviceDetached);
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"kind":"device_attached","device":{"device_name":"/dev/bus/usb/001/002","vendor_id":4176,"product_id":1031}}"#;
        let event: PlatformEvent = serde_json::from_str(json).unwrap();

        assert_eq!(
            event,
            PlatformEvent::DeviceAttached {
                device: UsbDeviceRecord::new("/dev/bus/usb/001/002", 0x1050, 0x0407),
            }
        );
    }
}
