//! Synthetic key handed out when the host has no usable channel and debug
//! injection is enabled.

/// Length of an HMAC-SHA1 challenge response
pub const DUMMY_RESPONSE_LEN: usize = 20;

const DUMMY_RESPONSE: [u8; DUMMY_RESPONSE_LEN] = [
    0x8d, 0x52, 0x1f, 0x04, 0xc3, 0x6e, 0x91, 0x2a, 0x57, 0xb0, 0x19, 0xe4, 0x3c, 0x7f, 0xa8, 0x66,
    0x0b, 0xd2, 0x45, 0x9e,
];

/// Fixed key returning the same response to every challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyKey {
    response: [u8; DUMMY_RESPONSE_LEN],
}

impl DummyKey {
    pub fn fixed() -> Self {
        Self {
            response: DUMMY_RESPONSE,
        }
    }

    pub fn response(&self) -> &[u8; DUMMY_RESPONSE_LEN] {
        &self.response
    }
}

impl Default for DummyKey {
    fn default() -> Self {
        Self::fixed()
    }
}
