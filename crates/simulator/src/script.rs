//! Scripted replay of host and platform events
//!
//! A script lists the host's capabilities and a sequence of steps. Platform
//! steps go through the in-memory platform, so a notification only reaches
//! the manager while the matching kind is registered.

use key_connection::{
    CapabilitySet, ChannelKind, ConnectionConfig, ConnectionManager, HostEvent, LifecycleObserver,
    MockPlatform, NotificationObserver, PlatformEvent, PlatformServices, SurfacePhase, TagRecord,
    UsbDeviceRecord,
};
use serde::{Deserialize, Serialize};
use shared::ConnectionSettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub capabilities: Vec<ChannelKind>,
    /// Devices whose access grant is already held when the script starts
    #[serde(default)]
    pub granted: Vec<UsbDeviceRecord>,
    /// Devices attached before the script starts
    #[serde(default)]
    pub attached: Vec<UsbDeviceRecord>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> shared::Result<Self> {
        serde_json::from_str(json).map_err(|e| shared::Error::InvalidScript(e.to_string()))
    }

    pub fn capability_set(&self) -> CapabilitySet {
        self.capabilities
            .iter()
            .fold(CapabilitySet::VOID, |set, channel| set | CapabilitySet::from(*channel))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Phase { phase: SurfacePhase },
    /// Raw notification, delivered only if its kind is registered
    Notify { event: PlatformEvent },
    Connect,
    UnplugNotice,
    Attach { device: UsbDeviceRecord },
    Detach { device: UsbDeviceRecord },
    Grant { device: UsbDeviceRecord, granted: bool },
    Sense { tag: TagRecord },
    ProximityEnabled { enabled: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "callback", rename_all = "snake_case")]
pub enum CallbackRecord {
    Connected { step: usize, channel: String },
    Unplugged { step: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub callbacks: Vec<CallbackRecord>,
    pub rejected: Vec<String>,
    pub final_state: String,
    pub open_registrations: usize,
}

pub fn connection_config(settings: &ConnectionSettings) -> ConnectionConfig {
    ConnectionConfig {
        debug_injection: settings.debug_injection,
        wired_enabled: !settings.disable_wired,
        proximity_enabled: !settings.disable_proximity,
    }
}

pub struct ScriptRunner {
    platform: Arc<MockPlatform>,
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<HostEvent>,
    callbacks: Arc<Mutex<Vec<CallbackRecord>>>,
    rejected: Vec<String>,
    current_step: Arc<AtomicUsize>,
}

impl ScriptRunner {
    pub fn new(script: &Script, config: ConnectionConfig) -> anyhow::Result<Self> {
        let platform = Arc::new(MockPlatform::new(script.capability_set()));
        for device in &script.granted {
            platform.set_grant(device, true);
        }
        for device in &script.attached {
            platform.attach(device.clone());
        }

        let events = platform.events();
        let manager =
            ConnectionManager::attach(PlatformServices::from_platform(platform.clone()), config)?;

        info!(
            capabilities = %script.capability_set(),
            steps = script.steps.len(),
            "Script loaded"
        );

        Ok(Self {
            platform,
            manager,
            events,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            rejected: Vec::new(),
            current_step: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn run(mut self, steps: &[Step]) -> RunReport {
        for (index, step) in steps.iter().enumerate() {
            self.current_step.store(index, Ordering::SeqCst);
            debug!(step = index, "Applying {:?}", step);
            self.apply(index, step);
            self.drain();
        }

        let callbacks = self
            .callbacks
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default();

        RunReport {
            callbacks,
            rejected: self.rejected,
            final_state: self.manager.state().to_string(),
            open_registrations: self.platform.total_registrations(),
        }
    }

    fn apply(&mut self, index: usize, step: &Step) {
        let delivered = match step {
            Step::Phase { phase } => self.platform.emit_phase(*phase),
            Step::Notify { event } => self.platform.emit(event.clone()),
            Step::Attach { device } => self.platform.plug_in(device.clone()),
            Step::Detach { device } => self.platform.unplug(device.clone()),
            Step::Grant { device, granted } => self.platform.answer_grant(device.clone(), *granted),
            Step::Sense { tag } => self.platform.sense(tag.clone()),
            Step::ProximityEnabled { enabled } => {
                self.platform.set_proximity_enabled(*enabled);
                true
            }
            Step::Connect => {
                self.request_connect(index);
                true
            }
            Step::UnplugNotice => {
                self.request_unplug_notice(index);
                true
            }
        };

        if !delivered {
            debug!(step = index, "Nobody registered, event dropped");
        }
    }

    fn request_connect(&mut self, index: usize) {
        let callbacks = Arc::clone(&self.callbacks);
        let current_step = Arc::clone(&self.current_step);

        let result = self.manager.request_connect(move |handle| {
            let channel = handle
                .channel()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "synthetic".to_string());
            info!(channel = %channel, "Connect callback invoked");
            if let Ok(mut records) = callbacks.lock() {
                records.push(CallbackRecord::Connected {
                    step: current_step.load(Ordering::SeqCst),
                    channel,
                });
            }
        });

        if let Err(e) = result {
            warn!(step = index, "Connect request rejected: {}", e);
            self.rejected.push(format!("step {}: {}", index, e));
        }
    }

    fn request_unplug_notice(&mut self, index: usize) {
        let callbacks = Arc::clone(&self.callbacks);
        let current_step = Arc::clone(&self.current_step);

        let result = self.manager.request_unplug_notice(move || {
            info!("Unplug callback invoked");
            if let Ok(mut records) = callbacks.lock() {
                records.push(CallbackRecord::Unplugged {
                    step: current_step.load(Ordering::SeqCst),
                });
            }
        });

        if let Err(e) = result {
            warn!(step = index, "Unplug notice rejected: {}", e);
            self.rejected.push(format!("step {}: {}", index, e));
        }
    }

    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::Platform(notification) => {
                    let outcome = self.manager.on_notification(notification);
                    debug!("Route outcome {:?}", outcome);
                }
                HostEvent::Lifecycle(phase) => self.manager.on_phase(phase),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../scripts/connect_and_unplug.json");

    fn run(json: &str) -> RunReport {
        let script = Script::from_json(json).unwrap();
        let runner = ScriptRunner::new(&script, ConnectionConfig::production()).unwrap();
        runner.run(&script.steps)
    }

    #[test]
    fn test_demo_script() {
        let report = run(DEMO);

        assert_eq!(
            report.callbacks,
            vec![
                CallbackRecord::Connected {
                    step: 5,
                    channel: "wired".to_string(),
                },
                CallbackRecord::Unplugged { step: 7 },
            ]
        );
        assert!(report.rejected.is_empty());
        assert_eq!(report.open_registrations, 0);
    }

    #[test]
    fn test_duplicate_connect_is_reported() {
        let report = run(
            r#"{
                "capabilities": ["proximity"],
                "steps": [
                    {"step": "phase", "phase": "created"},
                    {"step": "connect"},
                    {"step": "connect"}
                ]
            }"#,
        );

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.final_state, "AwaitingConnect");
    }

    #[test]
    fn test_notification_before_registration_is_dropped() {
        let report = run(
            r#"{
                "capabilities": ["proximity"],
                "steps": [
                    {"step": "phase", "phase": "created"},
                    {"step": "connect"},
                    {"step": "sense", "tag": {"tag_id": [4, 1], "technologies": ["iso_dep"]}}
                ]
            }"#,
        );

        assert!(report.callbacks.is_empty());
    }

    #[test]
    fn test_connection_config_from_settings() {
        let config = connection_config(&ConnectionSettings {
            debug_injection: true,
            disable_wired: true,
            disable_proximity: false,
        });

        assert!(config.debug_injection);
        assert!(!config.wired_enabled);
        assert!(config.proximity_enabled);
    }

    #[test]
    fn test_invalid_script() {
        assert!(Script::from_json(r#"{"steps": [{"step": "teleport"}]}"#).is_err());
    }
}
