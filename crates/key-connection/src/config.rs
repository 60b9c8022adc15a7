/// Core settings, usually built from the process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Hand out the synthetic key when no channel is available
    pub debug_injection: bool,
    /// Administrative switch for the wired channel
    pub wired_enabled: bool,
    /// Administrative switch for the proximity channel
    pub proximity_enabled: bool,
}

impl ConnectionConfig {
    /// Production settings: no synthetic key, both channels allowed
    pub fn production() -> Self {
        Self {
            debug_injection: false,
            wired_enabled: true,
            proximity_enabled: true,
        }
    }

    pub fn with_debug_injection(mut self, enabled: bool) -> Self {
        self.debug_injection = enabled;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            debug_injection: cfg!(debug_assertions),
            wired_enabled: true,
            proximity_enabled: true,
        }
    }
}
