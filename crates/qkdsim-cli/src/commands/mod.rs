pub mod derive;
pub mod script;
pub mod shell;
pub mod simulate;

use qkdsim_core::Session;

/// Resolve the seed for a one-shot command, drawing from the OS if needed.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(s) => s,
        None => match qkdsim_core::session::os_seed() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}

/// Build a session from global flags.
pub fn make_session(seed: Option<u64>, workers: usize, photons: Option<usize>) -> Session {
    let mut session = match Session::new(seed) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    session.set_workers(workers);
    if let Some(n) = photons {
        if let Err(e) = session.simulation.set_photons(n) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    session
}

/// Write `value` as pretty JSON to `path`, exiting on failure.
pub fn write_json<T: serde::Serialize>(path: &str, value: &T) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    };
    match std::fs::write(path, json) {
        Ok(()) => println!("Results written to {path}"),
        Err(e) => {
            eprintln!("Failed to write {path}: {e}");
            std::process::exit(1);
        }
    }
}
