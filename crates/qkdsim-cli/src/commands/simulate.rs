use qkdsim_core::{ChannelConfig, ChannelParam, SimulationConfig, simulate};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub struct SimulateCommandConfig {
    pub seed: Option<u64>,
    pub photons: usize,
    pub loss: f64,
    pub distance: f64,
    pub noise: f64,
    pub dark_count: f64,
    pub detector_efficiency: f64,
    pub error_floor: f64,
    pub eve: bool,
}

pub fn run(cfg: SimulateCommandConfig) {
    let mut channel = ChannelConfig::default();
    let settings = [
        (ChannelParam::Loss, cfg.loss),
        (ChannelParam::Distance, cfg.distance),
        (ChannelParam::ChannelNoise, cfg.noise),
        (ChannelParam::DarkCount, cfg.dark_count),
        (ChannelParam::DetectorEfficiency, cfg.detector_efficiency),
    ];
    for (param, value) in settings {
        if let Err(e) = channel.set(param, value) {
            eprintln!("Invalid {param}: {e}");
            std::process::exit(1);
        }
    }

    let mut sim = SimulationConfig::default();
    if let Err(e) = sim
        .set_photons(cfg.photons)
        .and_then(|()| sim.set_error_floor(cfg.error_floor))
    {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let seed = super::resolve_seed(cfg.seed);
    let mut rng = StdRng::seed_from_u64(seed);

    println!(
        "Simulating {} photons over {} km (seed: {seed}{})...\n",
        sim.photons,
        channel.distance_km,
        if cfg.eve { ", eavesdropper on" } else { "" }
    );

    let outcome = simulate(&channel, &sim, cfg.eve, &mut rng);
    log::debug!("channel config: {channel:?}");
    let t = &outcome.tally;

    println!("{:<25} {:.6}", "Transmittance", channel.transmittance());
    println!("{:<25} {}", "Photons sent", t.sent);
    println!("{:<25} {}", "Lost in fibre", t.lost);
    println!("{:<25} {}", "Not detected", t.undetected);
    println!("{:<25} {}", "Detected", t.detected);
    println!("{:<25} {}", "Sifted length", t.sifted);
    println!("{:<25} {}", "Errors", t.errors);
    println!("{:<25} {:.4}", "QBER", outcome.qber);
    println!("{:<25} {}", "Final key length", outcome.final_key_length);
    println!();

    match outcome.abort {
        Some(reason) => println!("INSECURE: {reason}"),
        None => println!("SECURE"),
    }
}
