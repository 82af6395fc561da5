mod common;

use std::thread::sleep;
use std::time::Duration;

use common::{no_discovery, settings_with_interval, MockLink};

use boardlink::protocol::{ControllerSettings, ProtocolController, DEFAULT_PORT};

const INTERVAL: Duration = Duration::from_millis(200);

#[test]
fn first_attempt_waits_one_interval() {
    let link = MockLink::unavailable();
    let controller = ProtocolController::new(link.clone(), settings_with_interval(INTERVAL), no_discovery());

    controller.refresh_connection();
    assert!(link.open_calls().is_empty());

    sleep(INTERVAL + Duration::from_millis(50));
    controller.refresh_connection();
    assert_eq!(link.open_calls(), vec![(DEFAULT_PORT.to_string(), 115200)]);
    assert_eq!(controller.stats().reconnect_attempts, 1);
}

#[test]
fn rapid_calls_make_at_most_one_attempt_per_interval() {
    let link = MockLink::unavailable();
    let controller = ProtocolController::new(link.clone(), settings_with_interval(INTERVAL), no_discovery());

    sleep(INTERVAL + Duration::from_millis(50));
    for _ in 0..50 {
        controller.refresh_connection();
    }
    assert_eq!(link.open_calls().len(), 1);
    assert!(!controller.is_connected());
}

#[test]
fn reconnects_once_the_device_returns() {
    let link = MockLink::unavailable();
    let controller = ProtocolController::new(link.clone(), settings_with_interval(INTERVAL), no_discovery());

    sleep(INTERVAL + Duration::from_millis(50));
    controller.refresh_connection();
    assert!(!controller.is_connected());

    link.set_available(true);
    controller.refresh_connection();
    // Still inside the window.
    assert!(!controller.is_connected());

    sleep(INTERVAL + Duration::from_millis(50));
    controller.refresh_connection();
    assert!(controller.is_connected());
    assert_eq!(controller.stats().reconnect_attempts, 2);
}

#[test]
fn refresh_is_noop_while_connected() {
    let link = MockLink::connected();
    let controller = ProtocolController::new(link.clone(), settings_with_interval(Duration::ZERO), no_discovery());

    controller.refresh_connection();
    controller.refresh_connection();
    assert!(link.open_calls().is_empty());
    assert_eq!(controller.stats().reconnect_attempts, 0);
}

#[test]
fn failed_attempts_reach_the_error_observer() {
    let link = MockLink::unavailable();
    let controller = ProtocolController::new(link.clone(), settings_with_interval(Duration::ZERO), no_discovery());

    controller.refresh_connection();
    assert_eq!(controller.stats().link_errors, 1);
}

#[test]
fn empty_default_port_skips_fallback() {
    let link = MockLink::unavailable();
    let settings = ControllerSettings {
        default_port: String::new(),
        reconnect_interval: Duration::ZERO,
        ..ControllerSettings::default()
    };
    let controller = ProtocolController::new(link.clone(), settings, no_discovery());

    controller.refresh_connection();
    assert!(link.open_calls().is_empty());
    assert_eq!(controller.stats().reconnect_attempts, 1);
}
