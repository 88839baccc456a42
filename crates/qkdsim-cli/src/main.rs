//! CLI for qkdsim: BB84 key distillation and photon-channel experiments.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "qkdsim")]
#[command(about = "qkdsim: BB84 key distillation and photon-channel experiments")]
#[command(version = qkdsim_core::VERSION)]
struct Cli {
    /// Session seed; omit to draw one from the OS (it is always printed)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Worker threads for parameter sweeps
    #[arg(long, global = true, default_value = "1")]
    workers: usize,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive experiment shell on stdin
    Shell {
        /// Photons per simulated run
        #[arg(long)]
        photons: Option<usize>,
    },

    /// Run shell commands from a file, echoing each command
    Script {
        /// Command file, one command per line ('!' starts a comment)
        file: String,

        /// Photons per simulated run
        #[arg(long)]
        photons: Option<usize>,

        /// Write the session (configuration + run ledger) as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Derive one key: sift, reconcile, amplify
    Derive {
        /// Raw qubits to exchange
        #[arg(long, default_value = "1024")]
        bits: usize,

        /// Measurement backend: local, noisy, noisy:<p>
        #[arg(long, default_value = "local")]
        backend: String,

        /// Insert an intercept-resend eavesdropper
        #[arg(long)]
        eve: bool,

        /// Probability that a slot is lost in the channel
        #[arg(long, default_value = "0")]
        loss: f64,

        /// XOR-encrypt this message with the key and decrypt it again
        #[arg(long)]
        message: Option<String>,

        /// Run the key-quality battery on the derived key
        #[arg(long)]
        quality: bool,

        /// Show raw bit/basis tables (first N slots)
        #[arg(long, default_value = "0")]
        show: usize,

        /// Write the full derivation as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Single photon-channel run with the given parameters
    Simulate {
        /// Photons to send
        #[arg(long, default_value = "5000")]
        photons: usize,

        /// Fibre loss in dB/km
        #[arg(long, default_value = "0")]
        loss: f64,

        /// Link length in km
        #[arg(long, default_value = "1")]
        distance: f64,

        /// Bit-flip probability after detection
        #[arg(long, default_value = "0")]
        noise: f64,

        /// Dark-count probability per detection window
        #[arg(long, default_value = "0")]
        dark_count: f64,

        /// Detector efficiency
        #[arg(long, default_value = "1")]
        detector_efficiency: f64,

        /// Minimum error fraction of the sifted key
        #[arg(long, default_value = "0")]
        error_floor: f64,

        /// Insert an intercept-resend eavesdropper
        #[arg(long)]
        eve: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::Shell { photons } => commands::shell::run(cli.seed, cli.workers, photons),
        Commands::Script {
            file,
            photons,
            output,
        } => commands::script::run(&file, cli.seed, cli.workers, photons, output.as_deref()),
        Commands::Derive {
            bits,
            backend,
            eve,
            loss,
            message,
            quality,
            show,
            output,
        } => commands::derive::run(commands::derive::DeriveCommandConfig {
            bits,
            backend: &backend,
            eve,
            loss,
            seed: cli.seed,
            message: message.as_deref(),
            quality,
            show,
            output_path: output.as_deref(),
        }),
        Commands::Simulate {
            photons,
            loss,
            distance,
            noise,
            dark_count,
            detector_efficiency,
            error_floor,
            eve,
        } => commands::simulate::run(commands::simulate::SimulateCommandConfig {
            seed: cli.seed,
            photons,
            loss,
            distance,
            noise,
            dark_count,
            detector_efficiency,
            error_floor,
            eve,
        }),
    }
}
