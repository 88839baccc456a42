use std::io::{self, BufRead, Write};

use qkdsim_core::Shell;

pub fn run(seed: Option<u64>, workers: usize, photons: Option<usize>) {
    let session = super::make_session(seed, workers, photons);
    println!(
        "qkdsim {}: session {} (seed {})",
        qkdsim_core::VERSION,
        session.id(),
        session.seed()
    );
    println!("Type 'help' or '?' for commands, 'enable' to begin.\n");

    let mut shell = Shell::new(session);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", shell.prompt());
        let _ = stdout.flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Failed to read input: {e}");
                std::process::exit(1);
            }
            None => {
                println!();
                break;
            }
        };

        for out in shell.execute(&line).lines {
            println!("{out}");
        }
        if shell.is_finished() {
            break;
        }
    }
}
