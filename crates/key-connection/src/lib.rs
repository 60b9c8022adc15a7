pub mod types;
pub mod error;
pub mod identity;
pub mod dummy;
pub mod platform;
pub mod capability;
pub mod wired;
pub mod proximity;
pub mod config;
pub mod coordinator;
pub mod router;
pub mod lifecycle;
pub mod manager;
pub mod mock;

pub use types::*;
pub use error::{ConnectionError, Result, ErrorCategory};
pub use identity::{DeviceIdentity, YUBICO_VENDOR_ID, OTP_PRODUCT_IDS};
pub use dummy::{DummyKey, DUMMY_RESPONSE_LEN};
pub use platform::{
    CapabilitySource, LifecycleSource, NotificationBus, NotificationKind, PlatformServices,
    PollingRequest, ProximityReader, SubscriptionHandle, UsbHost,
};
pub use capability::CapabilityProbe;
pub use wired::WiredChannel;
pub use proximity::ProximityChannel;
pub use config::ConnectionConfig;
pub use coordinator::{CallbackSlot, ConnectCallback, ConnectionCoordinator, UnplugCallback};
pub use router::{EventRouter, HostEvent, NotificationObserver, PlatformEvent, RouteOutcome};
pub use lifecycle::{LifecycleBinder, LifecycleObserver, SurfacePhase};
pub use manager::ConnectionManager;
pub use mock::MockPlatform;
