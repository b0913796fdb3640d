//! CLI smoke entry point.
//!
//! Usage: `secstore_cli [config.json]`. Opens the configured security store,
//! starts it (seeding defaults on first use) and prints per-kind counts.

use secstore_core::{SecurityStore, StoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("secstore: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => StoreConfig::from_path(path)?,
        None => StoreConfig::default(),
    };
    config.init_logging()?;

    let store = SecurityStore::open(&config)?;
    if let Some(report) = store.start()? {
        for entry in &report.kinds {
            println!(
                "bootstrap kind={} first_use={} seeded={}",
                entry.kind.table(),
                entry.first_use,
                entry.seeded
            );
        }
    }

    let counts = store.record_counts()?;
    println!("secstore_core version={}", secstore_core::core_version());
    println!(
        "users={} roles={} privileges={} user_role_mappings={}",
        counts.users, counts.roles, counts.privileges, counts.user_role_mappings
    );

    store.stop();
    Ok(())
}
