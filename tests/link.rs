//! End-to-end tests of the winch link against a fake S7 CPU.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{FakePlc, OnConnect, OnWrite};
use winch_link::{
    ConnectionConfig, S7Address, SessionState, SpeedScale, WinchError, WinchLink,
};

fn local_config() -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", "QW4")
}

fn wait_for_state(link: &WinchLink, state: SessionState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while link.status() != state {
        assert!(Instant::now() < deadline, "link never reached {state}");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_connect_and_set_speed() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = plc.link();

    link.connect(&local_config()).unwrap();
    assert_eq!(link.status(), SessionState::Connected);
    assert_eq!(
        link.session().tag_table().unwrap().address(),
        S7Address::output_word(4)
    );

    link.set_speed(1.0).unwrap();
    assert_eq!(plc.next_write(), 20601);

    link.stop().unwrap();
    assert_eq!(plc.next_write(), 13734);

    link.disconnect();
    assert_eq!(link.status(), SessionState::Disconnected);
}

#[test]
fn test_speeds_are_clamped_on_the_wire() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = plc.link();
    link.connect(&local_config()).unwrap();

    link.set_speed(100.0).unwrap();
    assert_eq!(plc.next_write(), 27468);
    link.set_speed(f64::NAN).unwrap();
    assert_eq!(plc.next_write(), 0);
    link.set_speed(-2.0).unwrap();
    assert_eq!(plc.next_write(), 0);
}

#[test]
fn test_custom_scale() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = WinchLink::with_settings(plc.settings(), SpeedScale::new(1.0, 1000));
    link.connect(&local_config()).unwrap();

    link.set_speed(0.5).unwrap();
    assert_eq!(plc.next_write(), 750);
}

#[test]
fn test_last_write_wins() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = plc.link();
    link.connect(&local_config()).unwrap();

    let speeds: Vec<f64> = (0..50).map(|n| -2.0 + f64::from(n) * 0.08).collect();
    for &speed in &speeds {
        link.set_speed(speed).unwrap();
    }
    let last = SpeedScale::default().to_output(*speeds.last().unwrap());

    let mut seen = Vec::new();
    loop {
        let value = plc.next_write();
        seen.push(value);
        if value == last {
            break;
        }
    }
    // Older values may be skipped, but never written after a newer one.
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
}

#[test]
fn test_connect_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let link = WinchLink::with_settings(
        winch_link::SessionSettings::default()
            .with_port(port)
            .with_connect_timeout(Duration::from_millis(500)),
        SpeedScale::default(),
    );

    let err = link.connect(&local_config()).unwrap_err();
    assert!(matches!(err, WinchError::Connection { .. }), "{err}");
    assert_eq!(link.status(), SessionState::Disconnected);
}

#[test]
fn test_connect_without_answer_times_out() {
    let plc = FakePlc::start_with(OnConnect::Silent, OnWrite::Ack);
    let link = plc.link();

    let err = link.connect(&local_config()).unwrap_err();
    assert!(matches!(err, WinchError::Connection { .. }), "{err}");
    assert_eq!(link.status(), SessionState::Disconnected);
}

#[test]
fn test_second_connect_while_connecting_is_rejected() {
    let plc = FakePlc::start_with(OnConnect::Silent, OnWrite::Ack);
    let link = Arc::new(plc.link());

    let first = {
        let link = Arc::clone(&link);
        thread::spawn(move || link.connect(&local_config()))
    };
    wait_for_state(&link, SessionState::Connecting);

    let err = link.connect(&local_config()).unwrap_err();
    assert!(matches!(err, WinchError::ConnectInProgress));

    assert!(first.join().unwrap().is_err());
    assert_eq!(link.status(), SessionState::Disconnected);
}

#[test]
fn test_disconnect_waits_for_pending_connect() {
    let plc = FakePlc::start_with(OnConnect::Silent, OnWrite::Ack);
    let settings = plc.settings().with_timeout(Duration::from_secs(2));
    let link = Arc::new(WinchLink::with_settings(settings, SpeedScale::default()));

    let connecting = {
        let link = Arc::clone(&link);
        thread::spawn(move || link.connect(&local_config()))
    };
    wait_for_state(&link, SessionState::Connecting);

    let disconnecting = {
        let link = Arc::clone(&link);
        thread::spawn(move || link.disconnect())
    };
    thread::sleep(Duration::from_millis(200));
    assert!(!disconnecting.is_finished());

    // The cancelled attempt still owns its socket, so no second one is opened.
    let err = link.connect(&local_config()).unwrap_err();
    assert!(matches!(err, WinchError::ConnectInProgress), "{err}");

    disconnecting.join().unwrap();
    assert_eq!(link.status(), SessionState::Disconnected);
    let err = connecting.join().unwrap().unwrap_err();
    assert!(matches!(err, WinchError::Connection { .. }), "{err}");
    assert_eq!(plc.accepted(), 1);
}

#[test]
fn test_connect_after_cancelled_attempt() {
    let plc = FakePlc::start_with(OnConnect::Silent, OnWrite::Ack);
    let link = Arc::new(plc.link());

    let connecting = {
        let link = Arc::clone(&link);
        thread::spawn(move || link.connect(&local_config()))
    };
    wait_for_state(&link, SessionState::Connecting);
    link.disconnect();

    assert_eq!(link.status(), SessionState::Disconnected);
    assert!(connecting.join().unwrap().is_err());

    // The next attempt runs to its own timeout instead of being rejected.
    let err = link.connect(&local_config()).unwrap_err();
    assert!(matches!(err, WinchError::Connection { .. }), "{err}");
    assert_eq!(link.status(), SessionState::Disconnected);
    assert_eq!(plc.accepted(), 2);
}

#[test]
fn test_invalid_config_never_reaches_network() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = plc.link();

    for config in [
        ConnectionConfig::default(),
        ConnectionConfig::new("127.0.0.1", "QW100"),
        ConnectionConfig::new("127.0.0.256", "QW4"),
    ] {
        let err = link.connect(&config).unwrap_err();
        assert!(matches!(err, WinchError::InvalidConfig { .. }), "{err}");
    }
    assert_eq!(link.status(), SessionState::Disconnected);
}

#[test]
fn test_set_speed_while_disconnected() {
    let link = WinchLink::new();
    assert!(matches!(link.set_speed(0.5), Err(WinchError::NotConnected)));
}

#[test]
fn test_transport_drop_notifies_once() {
    let plc = FakePlc::start(OnWrite::Drop);
    let link = plc.link();
    let (tx, rx) = mpsc::channel();
    link.on_write_error(move |err| tx.send(err.to_string()).unwrap());

    link.connect(&local_config()).unwrap();
    link.set_speed(1.0).unwrap();
    assert_eq!(plc.next_write(), 20601);

    let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(
        message.starts_with("Lost connection to PLC while writing QW4"),
        "{message}"
    );
    assert_eq!(link.status(), SessionState::Disconnected);
    assert!(matches!(link.set_speed(1.0), Err(WinchError::NotConnected)));
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
}

#[test]
fn test_reconnect_after_transport_drop() {
    let plc = FakePlc::start(OnWrite::Drop);
    let link = plc.link();
    let (tx, rx) = mpsc::channel();
    link.on_write_error(move |err| tx.send(err.to_string()).unwrap());

    link.connect(&local_config()).unwrap();
    link.set_speed(0.5).unwrap();
    plc.next_write();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    wait_for_state(&link, SessionState::Disconnected);

    link.connect(&local_config()).unwrap();
    assert!(link.is_connected());
    link.disconnect();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_item_rejection_keeps_session() {
    let plc = FakePlc::start(OnWrite::RejectItem);
    let link = plc.link();
    let (tx, rx) = mpsc::channel();
    link.on_write_error(move |err| tx.send(err.to_string()).unwrap());

    link.connect(&local_config()).unwrap();
    link.set_speed(0.0).unwrap();

    let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(message.starts_with("PLC rejected write to QW4"), "{message}");
    assert!(!message.contains("Lost connection"), "{message}");
    assert!(link.is_connected());
}

#[test]
fn test_reconnect_replaces_session() {
    let first = FakePlc::start(OnWrite::Ack);
    let link = first.link();
    link.connect(&local_config()).unwrap();

    link.connect(&ConnectionConfig::new("127.0.0.1", "QW8")).unwrap();
    assert!(link.is_connected());
    assert_eq!(
        link.session().tag_table().unwrap().address(),
        S7Address::output_word(8)
    );

    link.set_speed(-1.0).unwrap();
    assert_eq!(first.next_write(), 6867);
}

#[test]
fn test_disconnect_while_writing_does_not_notify() {
    let plc = FakePlc::start(OnWrite::Ack);
    let link = plc.link();
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    link.on_write_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    link.connect(&local_config()).unwrap();
    for n in 0..20 {
        link.set_speed(f64::from(n) / 10.0).unwrap();
    }
    link.disconnect();
    link.disconnect();

    assert_eq!(link.status(), SessionState::Disconnected);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn test_disconnect_during_failing_write_does_not_notify() {
    let plc = FakePlc::start(OnWrite::Silent);
    let link = plc.link();
    let (tx, rx) = mpsc::channel();
    link.on_write_error(move |err| tx.send(err.to_string()).unwrap());

    link.connect(&local_config()).unwrap();
    link.set_speed(1.0).unwrap();
    assert_eq!(plc.next_write(), 20601);

    // Returns only after the unanswered write has timed out.
    link.disconnect();
    assert_eq!(link.status(), SessionState::Disconnected);
    assert!(rx.recv_timeout(Duration::from_millis(700)).is_err());
}

#[test]
fn test_reconnect_during_failing_write_does_not_notify() {
    let plc = FakePlc::start(OnWrite::Silent);
    let link = plc.link();
    let (tx, rx) = mpsc::channel();
    link.on_write_error(move |err| tx.send(err.to_string()).unwrap());

    link.connect(&local_config()).unwrap();
    link.set_speed(-1.0).unwrap();
    assert_eq!(plc.next_write(), 6867);

    link.connect(&local_config()).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(700)).is_err());
    assert!(link.is_connected());
    assert_eq!(plc.accepted(), 2);

    link.disconnect();
}
