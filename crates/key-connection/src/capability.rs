use crate::platform::CapabilitySource;
use crate::types::CapabilitySet;
use std::sync::Arc;
use tracing::debug;

/// Stateless view over the capability query surface. Administrative masks
/// from configuration are applied on top of what the host reports.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    source: Arc<dyn CapabilitySource>,
    wired_enabled: bool,
    proximity_enabled: bool,
}

impl CapabilityProbe {
    pub fn new(source: Arc<dyn CapabilitySource>) -> Self {
        Self {
            source,
            wired_enabled: true,
            proximity_enabled: true,
        }
    }

    pub fn with_masks(
        source: Arc<dyn CapabilitySource>,
        wired_enabled: bool,
        proximity_enabled: bool,
    ) -> Self {
        Self {
            source,
            wired_enabled,
            proximity_enabled,
        }
    }

    /// Query the host. Never cached: proximity can be switched at runtime.
    pub fn probe(&self) -> CapabilitySet {
        let mut result = CapabilitySet::VOID;

        if self.wired_enabled && self.source.has_wired_host() {
            result.insert(CapabilitySet::WIRED);
        }

        if self.proximity_enabled
            && self.source.has_proximity_hardware()
            && self.source.is_proximity_enabled()
        {
            result.insert(CapabilitySet::PROXIMITY);
        }

        debug!("Probed capabilities: {}", result);
        result
    }
}
