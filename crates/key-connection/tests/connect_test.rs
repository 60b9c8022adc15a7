use key_connection::{
    CapabilitySet, ChannelKind, ConnectionConfig, ConnectionError, ConnectionManager,
    ConnectionState, DeviceHandle, DummyKey, LifecycleObserver, MockPlatform, NotificationKind,
    NotificationObserver, PlatformEvent, PlatformServices, RouteOutcome, SurfacePhase, TagRecord,
    TagTechnology, UsbDeviceRecord,
};
use std::sync::{Arc, Mutex};

fn yubikey() -> UsbDeviceRecord {
    UsbDeviceRecord::new("/dev/bus/usb/001/004", 0x1050, 0x0407)
}

fn security_tag() -> TagRecord {
    TagRecord::new(vec![0x04, 0xa2, 0x3b, 0x11], vec![TagTechnology::NfcA, TagTechnology::IsoDep])
}

fn setup(caps: CapabilitySet, config: ConnectionConfig) -> (Arc<MockPlatform>, ConnectionManager) {
    let platform = Arc::new(MockPlatform::new(caps));
    let manager =
        ConnectionManager::attach(PlatformServices::from_platform(platform.clone()), config)
            .unwrap();
    (platform, manager)
}

fn bring_to_front(manager: &mut ConnectionManager) {
    manager.on_phase(SurfacePhase::Created);
    manager.on_phase(SurfacePhase::Started);
    manager.on_phase(SurfacePhase::Resumed);
}

fn recording_connect(
    manager: &mut ConnectionManager,
) -> Arc<Mutex<Vec<DeviceHandle>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    manager
        .request_connect(move |handle| sink.lock().unwrap().push(handle))
        .unwrap();
    received
}

#[test]
fn test_connect_with_granted_key_already_attached() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    platform.set_grant(&yubikey(), true);
    bring_to_front(&mut manager);

    let received = recording_connect(&mut manager);

    let handles = received.lock().unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].channel(), Some(ChannelKind::Wired));
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(platform.total_registrations(), 1); // lifecycle observer only
}

#[test]
fn test_connect_after_grant_prompt() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    bring_to_front(&mut manager);

    let received = recording_connect(&mut manager);
    assert_eq!(platform.grant_requests(), vec![yubikey()]);
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(manager.state(), ConnectionState::AwaitingConnect);

    platform.set_grant(&yubikey(), true);
    let outcome = manager.on_notification(PlatformEvent::GrantResponse {
        device: yubikey(),
        granted: true,
    });

    assert_eq!(outcome, RouteOutcome::Connected);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(platform.registration_count(NotificationKind::GrantResponse), 0);
    assert_eq!(platform.registration_count(NotificationKind::DeviceAttached), 0);
}

#[test]
fn test_attach_after_request_prompts_for_grant() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    platform.attach(yubikey());
    let outcome = manager.on_notification(PlatformEvent::DeviceAttached { device: yubikey() });

    assert_eq!(outcome, RouteOutcome::Pending);
    assert_eq!(platform.grant_requests().len(), 1);
    assert!(received.lock().unwrap().is_empty());
}

#[test]
fn test_failed_open_keeps_request_pending() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    platform.set_grant(&yubikey(), true);
    platform.set_open_fails(true);
    bring_to_front(&mut manager);

    let received = recording_connect(&mut manager);

    assert!(received.lock().unwrap().is_empty());
    assert_eq!(manager.state(), ConnectionState::AwaitingConnect);
    assert!(manager.coordinator().wired().is_armed());
    assert!(platform.grant_requests().is_empty());

    // Re-plugging the key after the fault clears connects normally
    platform.set_open_fails(false);
    let outcome = manager.on_notification(PlatformEvent::DeviceAttached { device: yubikey() });

    assert_eq!(outcome, RouteOutcome::Connected);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn test_denied_grant_keeps_waiting() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    let outcome = manager.on_notification(PlatformEvent::GrantResponse {
        device: yubikey(),
        granted: false,
    });

    assert_eq!(outcome, RouteOutcome::Discarded);
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(platform.grant_requests().len(), 1);
    assert_eq!(manager.state(), ConnectionState::AwaitingConnect);
}

#[test]
fn test_grant_for_unrecognized_device_never_connects() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    let keyboard = UsbDeviceRecord::new("/dev/bus/usb/001/005", 0x046d, 0xc31c);
    platform.attach(keyboard.clone());
    platform.set_grant(&keyboard, true);
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    let outcome = manager.on_notification(PlatformEvent::GrantResponse {
        device: keyboard,
        granted: true,
    });

    assert_eq!(outcome, RouteOutcome::Discarded);
    assert!(received.lock().unwrap().is_empty());
    assert!(platform.grant_requests().is_empty());
}

#[test]
fn test_grant_for_device_unplugged_before_answer_is_ignored() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    platform.detach(&yubikey());
    platform.set_grant(&yubikey(), true);
    let outcome = manager.on_notification(PlatformEvent::GrantResponse {
        device: yubikey(),
        granted: true,
    });

    assert_eq!(outcome, RouteOutcome::Discarded);
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(manager.state(), ConnectionState::AwaitingConnect);
}

#[test]
fn test_proximity_wins_then_late_grant_is_discarded() {
    let (platform, mut manager) = setup(
        CapabilitySet::WIRED | CapabilitySet::PROXIMITY,
        ConnectionConfig::production(),
    );
    platform.attach(yubikey());
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 1);
    assert_eq!(platform.registration_count(NotificationKind::GrantResponse), 1);

    let outcome = manager.on_notification(PlatformEvent::DeviceSensed { tag: security_tag() });
    assert_eq!(outcome, RouteOutcome::Connected);

    // Wired must be released before the next event arrives
    assert_eq!(platform.registration_count(NotificationKind::GrantResponse), 0);
    assert_eq!(platform.registration_count(NotificationKind::DeviceAttached), 0);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 0);

    platform.set_grant(&yubikey(), true);
    let late = manager.on_notification(PlatformEvent::GrantResponse {
        device: yubikey(),
        granted: true,
    });

    assert_eq!(late, RouteOutcome::Discarded);
    let handles = received.lock().unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].channel(), Some(ChannelKind::Proximity));
    assert_eq!(manager.coordinator().connected_via(), Some(ChannelKind::Proximity));
}

#[test]
fn test_tag_without_iso_dep_is_ignored() {
    let (_platform, mut manager) =
        setup(CapabilitySet::PROXIMITY, ConnectionConfig::production());
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    let transit_card = TagRecord::new(vec![0x01, 0x02], vec![TagTechnology::MifareUltralight]);
    let outcome = manager.on_notification(PlatformEvent::DeviceSensed { tag: transit_card });

    assert_eq!(outcome, RouteOutcome::Discarded);
    assert!(received.lock().unwrap().is_empty());
    assert!(manager.coordinator().proximity().is_armed());
}

#[test]
fn test_failed_handshake_keeps_listening() {
    let (platform, mut manager) =
        setup(CapabilitySet::PROXIMITY, ConnectionConfig::production());
    platform.set_tag_handshake(false);
    bring_to_front(&mut manager);
    let received = recording_connect(&mut manager);

    let outcome = manager.on_notification(PlatformEvent::DeviceSensed { tag: security_tag() });

    assert_eq!(outcome, RouteOutcome::Discarded);
    assert!(received.lock().unwrap().is_empty());
    assert!(manager.coordinator().proximity().is_armed());
}

#[test]
fn test_proximity_only_armed_while_resumed() {
    let (platform, mut manager) =
        setup(CapabilitySet::PROXIMITY, ConnectionConfig::production());
    manager.on_phase(SurfacePhase::Created);
    manager.on_phase(SurfacePhase::Started);

    let _received = recording_connect(&mut manager);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 0);

    manager.on_phase(SurfacePhase::Resumed);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 1);
    assert_eq!(platform.polling_requests().len(), 1);
    assert!(platform.polling_requests()[0].foreground_priority);

    manager.on_phase(SurfacePhase::Paused);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 0);

    manager.on_phase(SurfacePhase::Resumed);
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 1);
}

#[test]
fn test_second_connect_request_is_rejected() {
    let (_platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    bring_to_front(&mut manager);
    let _received = recording_connect(&mut manager);

    let second = manager.request_connect(|_| panic!("second callback must never run"));

    assert_eq!(second, Err(ConnectionError::ConnectAlreadyPending));
    assert!(second.unwrap_err().is_precondition());
}

#[test]
fn test_empty_capabilities_with_injection_connects_dummy() {
    let (platform, mut manager) = setup(
        CapabilitySet::VOID,
        ConnectionConfig::production().with_debug_injection(true),
    );

    let received = recording_connect(&mut manager);

    let handles = received.lock().unwrap();
    assert_eq!(handles.as_slice(), &[DeviceHandle::Dummy(DummyKey::fixed())]);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(!manager.coordinator().has_active_subscriptions());
    assert_eq!(platform.total_registrations(), 1);
}

#[test]
fn test_disabled_proximity_hardware_is_not_used() {
    let (platform, mut manager) =
        setup(CapabilitySet::PROXIMITY, ConnectionConfig::production());
    platform.set_proximity_enabled(false);
    bring_to_front(&mut manager);

    let received = recording_connect(&mut manager);

    assert!(manager.supported_channels().is_empty());
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(platform.registration_count(NotificationKind::DeviceSensed), 0);
}

#[test]
fn test_connect_again_after_completion() {
    let (platform, mut manager) = setup(CapabilitySet::WIRED, ConnectionConfig::production());
    platform.attach(yubikey());
    platform.set_grant(&yubikey(), true);
    bring_to_front(&mut manager);

    let first = recording_connect(&mut manager);
    let second = recording_connect(&mut manager);

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap().len(), 1);
}
