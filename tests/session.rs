mod common;

use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::time::Duration;

use common::{FakePlc, OnWrite};
use winch_link::{PlcTarget, S7Address, SessionManager, SessionState, WinchError, WINCH_TAG};

fn target(offset: u16) -> PlcTarget {
    PlcTarget {
        ip: Ipv4Addr::LOCALHOST,
        winch: S7Address::output_word(offset),
    }
}

#[test]
fn test_write_tag_reaches_plc() {
    let plc = FakePlc::start(OnWrite::Ack);
    let session = SessionManager::new(plc.settings());

    session.connect(&target(2)).unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session.write_tag(WINCH_TAG, 0x1234).unwrap();
    assert_eq!(plc.next_write(), 0x1234);
}

#[test]
fn test_write_unknown_tag() {
    let plc = FakePlc::start(OnWrite::Ack);
    let session = SessionManager::new(plc.settings());
    session.connect(&target(2)).unwrap();

    let err = session.write_tag("HOIST", 1).unwrap_err();
    assert!(matches!(err, WinchError::UnknownTag { ref tag } if tag == "HOIST"));
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_disconnect_from_failure_handler() {
    let plc = FakePlc::start(OnWrite::Drop);
    let session = std::sync::Arc::new(SessionManager::new(plc.settings()));
    let (tx, rx) = mpsc::channel();

    let handle = std::sync::Arc::downgrade(&session);
    session.on_write_error(move |err| {
        if let Some(session) = handle.upgrade() {
            session.disconnect();
        }
        tx.send(err.to_string()).unwrap();
    });

    session.connect(&target(4)).unwrap();
    session.write_tag(WINCH_TAG, 7).unwrap();
    plc.next_write();

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
}
