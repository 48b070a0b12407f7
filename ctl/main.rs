#![forbid(unsafe_code)]

//! `mumble-link-probe` — local companion for `mumble-link-bridge`.
//!
//! Opens the Mumble Link region and prints the decoded record as JSON.
//! Useful for checking what the voice client currently sees. Never writes.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use mumble_link_bridge::link::{open_region, platform, LinkLocation, LinkRegion};

#[derive(Debug, Parser)]
#[command(
    name = "mumble-link-probe",
    about = "Print the current Mumble Link record",
    version,
    long_about = None
)]
struct Cli {
    /// Read this file instead of the platform's link region.
    #[arg(long)]
    path: Option<PathBuf>,

    /// Keep printing whenever the tick changes, polling every N milliseconds.
    #[arg(long)]
    follow_ms: Option<u64>,
}

fn main() {
    let args = Cli::parse();

    let location = match args.path {
        Some(path) => LinkLocation::Path(path),
        None => match platform::resolve_current() {
            Ok(location) => location,
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(1);
            }
        },
    };

    let region = match open_region(&location) {
        Ok(region) => region,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    };

    let mut last_tick = print_record(region.as_ref());

    let Some(interval) = args.follow_ms.map(Duration::from_millis) else {
        return;
    };

    loop {
        std::thread::sleep(interval);
        match region.read_record() {
            Ok(record) if Some(record.tick()) != last_tick => {
                last_tick = print_record(region.as_ref());
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(1);
            }
        }
    }
}

fn print_record(region: &dyn LinkRegion) -> Option<u32> {
    match region.read_record() {
        Ok(record) => {
            let snapshot = record.decode();
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("error: failed to serialize record: {err}"),
            }
            Some(snapshot.tick)
        }
        Err(err) => {
            eprintln!("error: {err}");
            None
        }
    }
}
