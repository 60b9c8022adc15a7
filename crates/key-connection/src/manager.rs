//! Connection manager bound to one host surface
//!
//! The manager is the one component the host talks to. It observes both the
//! platform notification bus and the surface lifecycle, and exposes the two
//! single-shot requests.

use crate::config::ConnectionConfig;
use crate::coordinator::ConnectionCoordinator;
use crate::lifecycle::{LifecycleBinder, LifecycleObserver, SurfacePhase};
use crate::platform::PlatformServices;
use crate::router::{EventRouter, NotificationObserver, PlatformEvent, RouteOutcome};
use crate::types::{CapabilitySet, ConnectionState, DeviceHandle};
use crate::Result;
use tracing::{debug, info};

#[derive(Debug)]
pub struct ConnectionManager {
    coordinator: ConnectionCoordinator,
    binder: LifecycleBinder,
}

impl ConnectionManager {
    /// Create a manager for one host surface and register it with the
    /// surface's lifecycle source
    pub fn attach(services: PlatformServices, config: ConnectionConfig) -> Result<Self> {
        let binder = LifecycleBinder::bind(services.lifecycle.clone())?;
        let coordinator = ConnectionCoordinator::new(&services, &config);

        info!(
            debug_injection = config.debug_injection,
            "Connection manager attached"
        );
        Ok(Self {
            coordinator,
            binder,
        })
    }

    /// Wait for a security key. The callback runs at most once.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::ConnectAlreadyPending` if a previous request has not completed
    /// - `ConnectionError::SurfaceDestroyed` after the surface was destroyed
    pub fn request_connect<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(DeviceHandle) + Send + 'static,
    {
        self.coordinator.request_connect(Box::new(callback))
    }

    /// Wait until the wired key is unplugged. Runs the callback right away
    /// when there is no wired key to wait for.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnplugAlreadyPending` if a previous notice is still waiting
    /// - `ConnectionError::SurfaceDestroyed` after the surface was destroyed
    pub fn request_unplug_notice<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.coordinator.request_unplug_notice(Box::new(callback))
    }

    /// Channels usable right now
    pub fn supported_channels(&self) -> CapabilitySet {
        self.coordinator.supported_channels()
    }

    pub fn state(&self) -> ConnectionState {
        self.coordinator.state()
    }

    pub fn phase(&self) -> Option<SurfacePhase> {
        self.binder.phase()
    }

    pub fn is_observing_lifecycle(&self) -> bool {
        self.binder.is_bound()
    }

    pub fn coordinator(&self) -> &ConnectionCoordinator {
        &self.coordinator
    }
}

impl NotificationObserver for ConnectionManager {
    fn on_notification(&mut self, event: PlatformEvent) -> RouteOutcome {
        if self.coordinator.is_destroyed() {
            debug!("Discarding {} after destroy", event.kind());
            return RouteOutcome::Discarded;
        }
        EventRouter::route(&mut self.coordinator, event)
    }
}

impl LifecycleObserver for ConnectionManager {
    fn on_phase(&mut self, phase: SurfacePhase) {
        debug!("Surface phase {}", phase);
        self.binder.apply(&mut self.coordinator, phase);
    }
}
