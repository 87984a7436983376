//! Example: Driving the winch from a terminal
//!
//! Run with: cargo run --example winch_console -- [config.json]
//!
//! This example demonstrates:
//! - Loading the last used settings from a JSON-lines file
//! - Connecting and subscribing to write failures
//! - Sweeping the winch speed and stopping
//!
//! Set RUST_LOG=debug to see every telegram.

use std::thread;
use std::time::Duration;

use winch_link::{ConfigStore, ConnectionConfig, JsonLinesConfigStore, WinchLink};

fn main() -> winch_link::Result<()> {
    env_logger::init();

    // =========================================================================
    // Settings
    // =========================================================================

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let store = JsonLinesConfigStore::new(path);

    let config = match store.load() {
        Some(config) if config.is_complete() => config,
        _ => {
            // Factory default of the panel
            let config = ConnectionConfig::new("192.168.0.1", "QW4");
            store.save(&config)?;
            config
        }
    };
    println!("Using PLC {:?}, winch output {:?}", config.ip, config.winch);

    // =========================================================================
    // Connect
    // =========================================================================

    let link = WinchLink::new();
    link.on_write_error(|err| eprintln!("!! {err}"));
    link.connect(&config)?;
    println!("Connected ({})", link.status());

    // =========================================================================
    // Sweep from full pay-out to full haul-in
    // =========================================================================

    for step in -20..=20 {
        let speed = f64::from(step) / 10.0;
        let output = link.scale().to_output(speed);
        println!("speed {speed:+.1} -> {output}");
        if let Err(e) = link.set_speed(speed) {
            eprintln!("Stopped sweep: {e}");
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    // Release-to-stop
    if link.is_connected() {
        link.stop()?;
        thread::sleep(Duration::from_millis(200));
    }

    link.disconnect();
    println!("Disconnected");
    Ok(())
}
