//! In-process fake S7 CPU answering just enough of the protocol for the link.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use winch_link::{SessionSettings, SpeedScale, WinchLink};

/// How the fake CPU treats a write-var job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnWrite {
    /// Acknowledge with item success.
    Ack,
    /// Close the socket without answering.
    Drop,
    /// Acknowledge with item return code 0x05 (invalid address).
    RejectItem,
    /// Record the value but never answer.
    Silent,
}

/// How the fake CPU treats the COTP connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConnect {
    /// Confirm the connection.
    Confirm,
    /// Accept TCP but never answer.
    Silent,
}

/// Fake CPU listening on 127.0.0.1.
pub struct FakePlc {
    pub addr: SocketAddr,
    pub writes: Receiver<u16>,
    accepted: Arc<AtomicUsize>,
}

impl FakePlc {
    pub fn start(on_write: OnWrite) -> Self {
        Self::start_with(OnConnect::Confirm, on_write)
    }

    pub fn start_with(on_connect: OnConnect, on_write: OnWrite) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, writes) = mpsc::channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let tx = tx.clone();
                thread::spawn(move || {
                    let _ = serve(stream, on_connect, on_write, tx);
                });
            }
        });

        Self {
            addr,
            writes,
            accepted,
        }
    }

    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Settings pointing a session at this fake.
    pub fn settings(&self) -> SessionSettings {
        SessionSettings::default()
            .with_port(self.port())
            .with_connect_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_millis(500))
    }

    pub fn link(&self) -> WinchLink {
        WinchLink::with_settings(self.settings(), SpeedScale::default())
    }

    /// Next value written by the link.
    pub fn next_write(&self) -> u16 {
        self.writes
            .recv_timeout(Duration::from_secs(5))
            .expect("no write reached the fake PLC")
    }
}

fn read_telegram(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut head = [0u8; 4];
    stream.read_exact(&mut head)?;
    let len = usize::from(u16::from_be_bytes([head[2], head[3]]));
    let mut telegram = vec![0u8; len];
    telegram[..4].copy_from_slice(&head);
    stream.read_exact(&mut telegram[4..])?;
    Ok(telegram)
}

fn ack(pdu_ref: [u8; 2], params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut pdu = vec![0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00, pdu_ref[0], pdu_ref[1]];
    pdu.extend_from_slice(&(params.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&(data.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&[0x00, 0x00]);
    pdu.extend_from_slice(params);
    pdu.extend_from_slice(data);

    let mut telegram = vec![0x03, 0x00];
    telegram.extend_from_slice(&((pdu.len() + 4) as u16).to_be_bytes());
    telegram.extend(pdu);
    telegram
}

const CONNECTION_CONFIRM: [u8; 22] = [
    0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x44, 0x00, 0xC0, 0x01, 0x0A, 0xC1,
    0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02,
];

fn serve(
    mut stream: TcpStream,
    on_connect: OnConnect,
    on_write: OnWrite,
    writes: Sender<u16>,
) -> io::Result<()> {
    loop {
        let telegram = read_telegram(&mut stream)?;

        if telegram[5] == 0xE0 {
            match on_connect {
                OnConnect::Confirm => stream.write_all(&CONNECTION_CONFIRM)?,
                // Keep reading until the client gives up and closes.
                OnConnect::Silent => {}
            }
            continue;
        }

        let pdu_ref = [telegram[11], telegram[12]];
        match telegram[17] {
            0xF0 => {
                let params = [0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0xF0];
                stream.write_all(&ack(pdu_ref, &params, &[]))?;
            }
            0x05 => {
                let n = telegram.len();
                let value = u16::from_be_bytes([telegram[n - 2], telegram[n - 1]]);
                let _ = writes.send(value);
                match on_write {
                    OnWrite::Ack => stream.write_all(&ack(pdu_ref, &[0x05, 0x01], &[0xFF]))?,
                    OnWrite::RejectItem => {
                        stream.write_all(&ack(pdu_ref, &[0x05, 0x01], &[0x05]))?
                    }
                    OnWrite::Drop => return Ok(()),
                    OnWrite::Silent => {}
                }
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected function 0x{other:02X}"),
                ))
            }
        }
    }
}
