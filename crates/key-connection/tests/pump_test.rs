use key_connection::{
    CapabilitySet, ChannelKind, ConnectionConfig, ConnectionManager, ConnectionState,
    EventRouter, HostEvent, MockPlatform, NotificationKind, PlatformServices, SurfacePhase,
    UsbDeviceRecord,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

fn yubikey() -> UsbDeviceRecord {
    UsbDeviceRecord::new("/dev/bus/usb/001/009", 0x1050, 0x0405)
}

async fn wait_for_registration(platform: &MockPlatform, kind: NotificationKind) {
    while platform.registration_count(kind) == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_pump_drives_connect_through_destroy() {
    let platform = Arc::new(MockPlatform::new(CapabilitySet::WIRED));
    let mut events = platform.events();
    let mut manager = ConnectionManager::attach(
        PlatformServices::from_platform(platform.clone()),
        ConnectionConfig::production(),
    )
    .unwrap();

    let (tx, rx) = oneshot::channel();
    manager
        .request_connect(move |handle| {
            let _ = tx.send(handle);
        })
        .unwrap();

    let pump = tokio::spawn(async move {
        EventRouter::pump(&mut manager, &mut events).await;
        manager
    });

    assert!(platform.emit_phase(SurfacePhase::Created));
    assert!(platform.emit_phase(SurfacePhase::Started));
    wait_for_registration(&platform, NotificationKind::DeviceAttached).await;

    platform.set_grant(&yubikey(), true);
    assert!(platform.plug_in(yubikey()));

    let handle = rx.await.unwrap();
    assert_eq!(handle.channel(), Some(ChannelKind::Wired));

    assert!(platform.emit_phase(SurfacePhase::Stopped));
    assert!(platform.emit_phase(SurfacePhase::Destroyed));

    let manager = pump.await.unwrap();
    assert_eq!(manager.phase(), Some(SurfacePhase::Destroyed));
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(!manager.is_observing_lifecycle());
    assert_eq!(platform.total_registrations(), 0);
}

#[tokio::test]
async fn test_pump_stops_when_channel_closes() {
    let platform = Arc::new(MockPlatform::new(CapabilitySet::PROXIMITY));
    let mut manager = ConnectionManager::attach(
        PlatformServices::from_platform(platform.clone()),
        ConnectionConfig::production(),
    )
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(HostEvent::Lifecycle(SurfacePhase::Created)).unwrap();
    tx.send(HostEvent::Lifecycle(SurfacePhase::Started)).unwrap();
    drop(tx);

    EventRouter::pump(&mut manager, &mut rx).await;

    assert_eq!(manager.phase(), Some(SurfacePhase::Started));
    assert!(manager.is_observing_lifecycle());
    assert_eq!(platform.registration_count(NotificationKind::Lifecycle), 1);
}
