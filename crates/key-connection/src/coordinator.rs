// Connection coordinator - the single-shot connect/unplug state machine
// Arbitrates between the wired and proximity channels and owns both callback slots

use crate::capability::CapabilityProbe;
use crate::config::ConnectionConfig;
use crate::dummy::DummyKey;
use crate::platform::PlatformServices;
use crate::proximity::ProximityChannel;
use crate::types::{CapabilitySet, ChannelKind, ConnectionState, DeviceHandle};
use crate::wired::WiredChannel;
use crate::{ConnectionError, Result};
use tracing::{debug, info, warn};

/// Invoked once with the handle of the key that connected
pub type ConnectCallback = Box<dyn FnOnce(DeviceHandle) + Send>;

/// Invoked once when the watched wired key is removed
pub type UnplugCallback = Box<dyn FnOnce() + Send>;

/// Holds at most one value. Taking empties the slot in the same step, so a
/// callback can never be invoked twice.
#[derive(Debug)]
pub struct CallbackSlot<T> {
    slot: Option<T>,
}

impl<T> CallbackSlot<T> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    /// Store a value. Hands it back if the slot is already occupied.
    pub fn fill(&mut self, value: T) -> std::result::Result<(), T> {
        if self.slot.is_some() {
            return Err(value);
        }
        self.slot = Some(value);
        Ok(())
    }

    pub fn take_and_clear(&mut self) -> Option<T> {
        self.slot.take()
    }
}

impl<T> Default for CallbackSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConnectionCoordinator {
    probe: CapabilityProbe,
    wired: WiredChannel,
    proximity: ProximityChannel,
    state: ConnectionState,
    connected: bool,
    connected_via: Option<ChannelKind>,
    connect_slot: CallbackSlot<ConnectCallback>,
    unplug_slot: CallbackSlot<UnplugCallback>,
    started: bool,
    resumed: bool,
    destroyed: bool,
    debug_injection: bool,
}

impl ConnectionCoordinator {
    pub fn new(services: &PlatformServices, config: &ConnectionConfig) -> Self {
        Self {
            probe: CapabilityProbe::with_masks(
                services.capabilities.clone(),
                config.wired_enabled,
                config.proximity_enabled,
            ),
            wired: WiredChannel::new(services.usb.clone(), services.bus.clone()),
            proximity: ProximityChannel::new(services.reader.clone()),
            state: ConnectionState::Idle,
            connected: false,
            connected_via: None,
            connect_slot: CallbackSlot::new(),
            unplug_slot: CallbackSlot::new(),
            started: false,
            resumed: false,
            destroyed: false,
            debug_injection: config.debug_injection,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn supported_channels(&self) -> CapabilitySet {
        self.probe.probe()
    }

    pub fn is_connect_pending(&self) -> bool {
        self.connect_slot.is_pending()
    }

    pub fn is_unplug_pending(&self) -> bool {
        self.unplug_slot.is_pending()
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn connected_via(&self) -> Option<ChannelKind> {
        self.connected_via
    }

    pub fn wired(&self) -> &WiredChannel {
        &self.wired
    }

    pub fn proximity(&self) -> &ProximityChannel {
        &self.proximity
    }

    /// Any channel or watch currently holding a subscription
    pub fn has_active_subscriptions(&self) -> bool {
        self.wired.is_armed() || self.wired.is_watching_detach() || self.proximity.is_armed()
    }

    /// Wait for a key over any supported channel. Rejects a second request
    /// while one is pending.
    pub fn request_connect(&mut self, callback: ConnectCallback) -> Result<()> {
        if self.destroyed {
            return Err(ConnectionError::SurfaceDestroyed);
        }

        if self.connect_slot.fill(callback).is_err() {
            warn!("Connect requested while another request is pending");
            return Err(ConnectionError::ConnectAlreadyPending);
        }

        info!("Connect requested");
        self.refresh_state();
        self.begin_discovery();
        Ok(())
    }

    /// Wait until no recognized wired key is attached. Fires immediately when
    /// there is nothing to wait for.
    pub fn request_unplug_notice(&mut self, callback: UnplugCallback) -> Result<()> {
        if self.destroyed {
            return Err(ConnectionError::SurfaceDestroyed);
        }

        if self.unplug_slot.is_pending() {
            warn!("Unplug notice requested while another is pending");
            return Err(ConnectionError::UnplugAlreadyPending);
        }

        if !self.probe.probe().supports(ChannelKind::Wired) {
            debug!("Wired channel unsupported, reporting unplugged");
            callback();
            return Ok(());
        }

        if !self.wired.is_recognized_present() {
            debug!("No wired key attached, reporting unplugged");
            callback();
            return Ok(());
        }

        if self.unplug_slot.fill(callback).is_err() {
            return Err(ConnectionError::UnplugAlreadyPending);
        }

        if self.started {
            self.wired.arm_detach_watch();
        }
        info!("Waiting for wired key to be unplugged");
        self.refresh_state();
        Ok(())
    }

    /// A channel produced a usable device. Returns true if the pending
    /// callback was invoked.
    pub fn on_device_available(&mut self, handle: DeviceHandle) -> bool {
        if !matches!(self.state, ConnectionState::Idle | ConnectionState::AwaitingConnect) {
            debug!("Ignoring device in state {}", self.state);
            return false;
        }

        let Some(callback) = self.connect_slot.take_and_clear() else {
            debug!("Ignoring device: no connect request pending");
            return false;
        };

        let via = handle.channel();
        match via {
            Some(winner) => {
                self.disarm_channel(winner.other());
                self.disarm_channel(winner);
            }
            None => self.disarm_connect_channels(),
        }

        self.connected = true;
        self.connected_via = via;
        self.refresh_state();

        match via {
            Some(channel) => info!(channel = %channel, "Security key connected"),
            None => info!("Synthetic security key connected"),
        }
        callback(handle);
        true
    }

    /// A recognized wired key was detached. Returns true if the pending
    /// unplug callback was invoked.
    pub fn on_device_removed(&mut self) -> bool {
        if let Some(callback) = self.unplug_slot.take_and_clear() {
            self.wired.disarm_detach_watch();
            self.connected = false;
            self.connected_via = None;
            self.refresh_state();
            info!("Security key unplugged");
            callback();
            return true;
        }

        if self.connected_via == Some(ChannelKind::Wired) {
            info!("Wired security key removed");
            self.connected = false;
            self.connected_via = None;
            self.refresh_state();
            return false;
        }

        debug!("Ignoring detach: no wired key is being watched");
        false
    }

    pub fn on_surface_created(&mut self) {
        debug!("Surface created");
    }

    pub fn on_surface_started(&mut self) {
        self.started = true;

        if self.connect_slot.is_pending() {
            self.begin_discovery();
        }

        if self.unplug_slot.is_pending() {
            self.resume_unplug_watch();
        }
    }

    pub fn on_surface_resumed(&mut self) {
        self.resumed = true;

        if self.connect_slot.is_pending() {
            self.begin_discovery();
        }
    }

    pub fn on_surface_paused(&mut self) {
        self.proximity.disarm();
        self.resumed = false;
    }

    pub fn on_surface_stopped(&mut self) {
        self.started = false;
        self.resumed = false;

        if self.connect_slot.is_pending() || self.unplug_slot.is_pending() {
            self.disarm_all();
        }
    }

    /// Release every subscription and drop pending callbacks uninvoked
    pub fn on_surface_destroyed(&mut self) {
        self.disarm_all();

        if self.connect_slot.take_and_clear().is_some() {
            debug!("Dropped pending connect request");
        }
        if self.unplug_slot.take_and_clear().is_some() {
            debug!("Dropped pending unplug notice");
        }

        self.connected = false;
        self.connected_via = None;
        self.started = false;
        self.resumed = false;
        self.destroyed = true;
        self.refresh_state();
        info!("Connection coordinator torn down");
    }

    /// Arm whatever the host currently supports and the surface allows
    fn begin_discovery(&mut self) {
        let capabilities = self.probe.probe();

        if capabilities.is_empty() {
            if self.debug_injection {
                info!("No channel available, injecting synthetic key");
                self.on_device_available(DeviceHandle::Dummy(DummyKey::fixed()));
            } else {
                warn!("No channel available, waiting");
            }
            return;
        }

        if capabilities.supports(ChannelKind::Wired) && self.started {
            if let Some(session) = self.wired.arm() {
                self.on_device_available(DeviceHandle::Wired(session));
                return;
            }
        }

        if capabilities.supports(ChannelKind::Proximity) {
            self.proximity.arm(self.resumed);
        }
    }

    fn resume_unplug_watch(&mut self) {
        let wired_supported = self.probe.probe().supports(ChannelKind::Wired);

        if !wired_supported || !self.wired.is_recognized_present() {
            // Removed while the surface was stopped
            self.on_device_removed();
            return;
        }

        self.wired.arm_detach_watch();
    }

    fn disarm_channel(&mut self, channel: ChannelKind) {
        match channel {
            ChannelKind::Wired => self.wired.disarm(),
            ChannelKind::Proximity => self.proximity.disarm(),
        }
    }

    fn disarm_connect_channels(&mut self) {
        self.wired.disarm();
        self.proximity.disarm();
    }

    fn disarm_all(&mut self) {
        self.disarm_connect_channels();
        self.wired.disarm_detach_watch();
    }

    fn refresh_state(&mut self) {
        let next = if self.connect_slot.is_pending() {
            ConnectionState::AwaitingConnect
        } else if self.unplug_slot.is_pending() {
            ConnectionState::AwaitingUnplug
        } else if self.connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Idle
        };

        if next != self.state {
            debug!("Connection state {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

impl std::fmt::Debug for ConnectionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCoordinator")
            .field("state", &self.state)
            .field("connected_via", &self.connected_via)
            .field("connect_pending", &self.connect_slot.is_pending())
            .field("unplug_pending", &self.unplug_slot.is_pending())
            .field("started", &self.started)
            .field("resumed", &self.resumed)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
