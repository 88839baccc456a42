use qkdsim_core::Shell;

pub fn run(
    file: &str,
    seed: Option<u64>,
    workers: usize,
    photons: Option<usize>,
    output_path: Option<&str>,
) {
    let text = match std::fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read {file}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("running {} line(s) from {file}", text.lines().count());

    let session = super::make_session(seed, workers, photons);
    println!("Session {} (seed {})", session.id(), session.seed());

    let mut shell = Shell::new(session);
    let mut diagnostics = 0usize;
    for line in text.lines() {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        println!("{}{command}", shell.prompt());
        let response = shell.execute(command);
        diagnostics += response.lines.iter().filter(|l| l.starts_with("% ")).count();
        for out in response.lines {
            println!("{out}");
        }
        if shell.is_finished() {
            break;
        }
    }

    if diagnostics > 0 {
        eprintln!("{diagnostics} command(s) reported errors");
    }

    if let Some(path) = output_path {
        super::write_json(path, &shell.session().export());
    }
}
