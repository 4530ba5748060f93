//! Demonstration of the full capture pipeline against a scripted device.
//!
//! This example shows how to:
//! 1. Wire a link source into the background reader
//! 2. Wait for the firmware trigger marker
//! 3. Request and collect a log dump
//! 4. Build the chill-unit export table
//!
//! Run with: cargo run --example session_demo

use orchardlog::config::Config;
use orchardlog::core::create_shared_buffer;
use orchardlog::diagnostics::create_shared_log;
use orchardlog::session::SessionRunner;
use orchardlog::transport::{mock, LinkReader};
use std::thread;
use std::time::Duration;

fn main() {
    println!("Orchardlog - Session Demo");
    println!("=========================");
    println!();

    // A scripted device: boot banner and trigger line up front, the log
    // dump once the read command arrives. Chunks deliberately split lines
    // so the framer has real work to do.
    let preamble = vec![
        b"sensor logger v2 ready\r\n".to_vec(),
        b"File created and".to_vec(),
        b" data written.\r\n".to_vec(),
    ];
    let dump = vec![
        b"2024-01-01T10:00, Temp: 5.0\xC2\xB0C, Humi".to_vec(),
        b"dity: 60%\r\n2024-01-01T11:00, Temp: 9.5\xC2\xB0C, Humidity: 58%\r\n".to_vec(),
        b"2024-01-01T12:00, Temp: corrupted, Humidity: 57%\r\n".to_vec(),
        b"2024-01-01T13:00, Temp: 19.0\xC2\xB0C, Humidity: 51%\r\n".to_vec(),
        b"--- END OF FILE ---\r\n".to_vec(),
    ];

    let (source, sink, handle) = mock::scripted(preamble, Vec::new());

    // Simulate the device's turnaround: start dumping shortly after the
    // read command is received.
    let device = {
        let handle = handle.clone();
        thread::spawn(move || {
            while handle.written().is_empty() {
                thread::sleep(Duration::from_millis(10));
            }
            thread::sleep(Duration::from_millis(50));
            for chunk in dump {
                handle.push_chunk(chunk);
                thread::sleep(Duration::from_millis(20));
            }
        })
    };

    let buffer = create_shared_buffer();
    let diagnostics = create_shared_log();

    // Print pipeline progress as it happens.
    let messages = diagnostics.messages();
    let printer = thread::spawn(move || {
        for msg in messages.iter() {
            println!("  [pipeline] {msg}");
        }
    });

    let mut reader = LinkReader::new(Box::new(source), buffer.clone(), diagnostics.clone());
    if let Err(e) = reader.start() {
        eprintln!("Error starting reader: {e}");
        return;
    }

    let mut config = Config::default();
    config.data_path = std::env::temp_dir().join("orchardlog-demo");
    config.export_path = config.data_path.join("exports");

    let mut runner = SessionRunner::new(
        buffer,
        Box::new(sink),
        diagnostics.clone(),
        config,
        reader.alive_flag(),
    );

    println!("Running one capture cycle...");
    println!();

    match runner.auto_cycle() {
        Ok(table) => {
            device.join().ok();
            println!();
            println!("=== Export Table ===");
            println!("  {}", table.header.join(" | "));
            for row in &table.rows {
                println!(
                    "  {} | {} | {} | {} | {} | {}",
                    row.index,
                    row.record.timestamp,
                    row.record.temperature_c,
                    row.record.humidity_pct,
                    row.chill_units,
                    row.cumulative_chill_units
                );
            }
            println!();
            println!("Preview:");
            for line in table.preview_lines() {
                println!("  {line}");
            }
        }
        Err(e) => {
            eprintln!("Session failed: {e}");
        }
    }

    reader.stop();
    println!();
    println!("{}", diagnostics.summary());

    // Dropping every log handle disconnects the message channel and lets
    // the printer thread finish.
    drop(runner);
    drop(reader);
    drop(diagnostics);
    printer.join().ok();

    println!();
    println!("Demo complete!");
}
