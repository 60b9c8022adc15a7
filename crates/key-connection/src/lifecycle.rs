// Host-surface lifecycle binding
// Maps visibility phases onto coordinator arm/disarm hooks

use crate::coordinator::ConnectionCoordinator;
use crate::platform::{LifecycleSource, SubscriptionHandle};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Visibility phase of the host surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfacePhase {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
    Destroyed,
}

impl SurfacePhase {
    /// Whether `self` may directly follow `previous`
    pub fn can_follow(self, previous: Option<SurfacePhase>) -> bool {
        use SurfacePhase::*;

        match (previous, self) {
            (None, Created) => true,
            (Some(Created), Started) | (Some(Stopped), Started) => true,
            (Some(Started), Resumed) | (Some(Paused), Resumed) => true,
            (Some(Resumed), Paused) => true,
            (Some(Started), Stopped) | (Some(Paused), Stopped) => true,
            (Some(Created), Destroyed) | (Some(Stopped), Destroyed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SurfacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfacePhase::Created => write!(f, "created"),
            SurfacePhase::Started => write!(f, "started"),
            SurfacePhase::Resumed => write!(f, "resumed"),
            SurfacePhase::Paused => write!(f, "paused"),
            SurfacePhase::Stopped => write!(f, "stopped"),
            SurfacePhase::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Receives host-surface lifecycle phases
pub trait LifecycleObserver {
    fn on_phase(&mut self, phase: SurfacePhase);
}

/// Registration with the lifecycle source plus the last phase seen
#[derive(Debug)]
pub struct LifecycleBinder {
    source: Arc<dyn LifecycleSource>,
    registration: Option<SubscriptionHandle>,
    phase: Option<SurfacePhase>,
}

impl LifecycleBinder {
    /// Register as an observer of the host surface
    pub fn bind(source: Arc<dyn LifecycleSource>) -> Result<Self> {
        let registration = source.register_observer()?;
        debug!("Registered lifecycle observer {}", registration.id());

        Ok(Self {
            source,
            registration: Some(registration),
            phase: None,
        })
    }

    pub fn is_bound(&self) -> bool {
        self.registration.is_some()
    }

    pub fn phase(&self) -> Option<SurfacePhase> {
        self.phase
    }

    /// Drive the coordinator hook matching `phase`
    pub fn apply(&mut self, coordinator: &mut ConnectionCoordinator, phase: SurfacePhase) {
        if self.phase == Some(SurfacePhase::Destroyed) {
            debug!("Ignoring {} after destroy", phase);
            return;
        }

        if !phase.can_follow(self.phase) {
            warn!(
                "Unexpected lifecycle transition {:?} -> {}",
                self.phase, phase
            );
        }
        self.phase = Some(phase);

        match phase {
            SurfacePhase::Created => coordinator.on_surface_created(),
            SurfacePhase::Started => coordinator.on_surface_started(),
            SurfacePhase::Resumed => coordinator.on_surface_resumed(),
            SurfacePhase::Paused => coordinator.on_surface_paused(),
            SurfacePhase::Stopped => coordinator.on_surface_stopped(),
            SurfacePhase::Destroyed => {
                coordinator.on_surface_destroyed();
                self.unbind();
            }
        }
    }

    /// Stop observing the lifecycle source. Safe to call twice.
    pub fn unbind(&mut self) {
        if let Some(handle) = self.registration.take() {
            info!("Unregistering lifecycle observer");
            if let Err(e) = self.source.unregister_observer(handle) {
                e.log_tolerated("unregister lifecycle observer");
            }
        }
    }
}

impl Drop for LifecycleBinder {
    fn drop(&mut self) {
        self.unbind();
    }
}
