// Proximity channel - foreground polling for keys held against the reader

use crate::identity::DeviceIdentity;
use crate::platform::{PollingRequest, ProximityReader, SubscriptionHandle};
use crate::types::{TagRecord, TagSession, TagTechnology};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct ProximityChannel {
    reader: Arc<dyn ProximityReader>,
    identity: DeviceIdentity,
    request: PollingRequest,
    subscription: Option<SubscriptionHandle>,
}

impl ProximityChannel {
    pub fn new(reader: Arc<dyn ProximityReader>) -> Self {
        Self {
            reader,
            identity: DeviceIdentity::yubikey_tag(),
            request: PollingRequest::security_key(),
            subscription: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Enable foreground polling. Only effective while the surface is resumed.
    pub fn arm(&mut self, resumed: bool) -> bool {
        if !resumed {
            debug!("Surface not resumed, proximity polling stays off");
            return false;
        }

        if self.is_armed() {
            debug!("Proximity channel already armed");
            return true;
        }

        match self.reader.enable_foreground_polling(&self.request) {
            Ok(handle) => {
                info!("Proximity polling enabled");
                self.subscription = Some(handle);
                true
            }
            Err(e) => {
                e.log_tolerated("enable foreground polling");
                false
            }
        }
    }

    /// Disable foreground polling. Safe when not armed.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.subscription.take() {
            info!("Proximity polling disabled");
            if let Err(e) = self.reader.disable_foreground_polling(handle) {
                e.log_tolerated("disable foreground polling");
            }
        }
    }

    /// A tag came into range. Tags without the key's technology are ignored.
    pub fn on_sensed(&self, tag: &TagRecord) -> Option<TagSession> {
        if !self.is_armed() {
            debug!("Ignoring {} while disarmed", tag);
            return None;
        }

        if !self.identity.matches_tag(tag) {
            debug!("Ignoring {}: not a security key", tag);
            return None;
        }

        match self.reader.connect_tag(tag, TagTechnology::IsoDep) {
            Some(session) => {
                info!("Opened proximity session with {}", tag);
                Some(session)
            }
            None => {
                debug!("Handshake unavailable for {}", tag);
                None
            }
        }
    }
}

impl Drop for ProximityChannel {
    fn drop(&mut self) {
        self.disarm();
    }
}
