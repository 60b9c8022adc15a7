//! Recognition of security-key devices among raw platform records

use crate::types::{TagRecord, TagTechnology, UsbDeviceRecord};

/// Yubico's USB vendor id
pub const YUBICO_VENDOR_ID: u16 = 0x1050;

/// Product ids that expose the OTP interface used for challenge-response
pub const OTP_PRODUCT_IDS: &[u16] = &[
    0x0010, // YubiKey (gen 1-2)
    0x0110, // NEO OTP
    0x0111, // NEO OTP+CCID
    0x0114, // NEO OTP+U2F
    0x0116, // NEO OTP+U2F+CCID
    0x0401, // YubiKey 4/5 OTP
    0x0403, // YubiKey 4/5 OTP+FIDO
    0x0405, // YubiKey 4/5 OTP+CCID
    0x0407, // YubiKey 4/5 OTP+FIDO+CCID
];

/// Criterion a channel uses to filter device records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIdentity {
    /// Vendor id plus a list of accepted product ids
    Usb {
        vendor_id: u16,
        product_ids: Vec<u16>,
    },
    /// Tag must expose this technology
    Tag(TagTechnology),
}

impl DeviceIdentity {
    pub fn yubikey_usb() -> Self {
        DeviceIdentity::Usb {
            vendor_id: YUBICO_VENDOR_ID,
            product_ids: OTP_PRODUCT_IDS.to_vec(),
        }
    }

    pub fn yubikey_tag() -> Self {
        DeviceIdentity::Tag(TagTechnology::IsoDep)
    }

    pub fn matches_usb(&self, record: &UsbDeviceRecord) -> bool {
        match self {
            DeviceIdentity::Usb {
                vendor_id,
                product_ids,
            } => record.vendor_id == *vendor_id && product_ids.contains(&record.product_id),
            DeviceIdentity::Tag(_) => false,
        }
    }

    pub fn matches_tag(&self, tag: &TagRecord) -> bool {
        match self {
            DeviceIdentity::Tag(technology) => tag.has_technology(*technology),
            DeviceIdentity::Usb { .. } => false,
        }
    }
}
