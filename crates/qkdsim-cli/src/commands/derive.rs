use qkdsim_core::bits::to_hex;
use qkdsim_core::{
    BackendSelector, DerivationOptions, KeyDerivation, SecretKey, derive_key_configured,
};
use qkdsim_tests::TestResult;

pub struct DeriveCommandConfig<'a> {
    pub bits: usize,
    pub backend: &'a str,
    pub eve: bool,
    pub loss: f64,
    pub seed: Option<u64>,
    pub message: Option<&'a str>,
    pub quality: bool,
    pub show: usize,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: DeriveCommandConfig<'_>) {
    let backend: BackendSelector = match cfg.backend.parse() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let options = DerivationOptions {
        eavesdropper: cfg.eve,
        loss_probability: cfg.loss,
    };
    if let Err(e) = options.validate() {
        eprintln!("{e}");
        std::process::exit(1);
    }
    let seed = super::resolve_seed(cfg.seed);

    println!(
        "Deriving key from {} raw qubits (backend: {backend}, seed: {seed}{})...\n",
        cfg.bits,
        if cfg.eve { ", eavesdropper on" } else { "" }
    );

    let d = match derive_key_configured(cfg.bits, &backend, &options, seed) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Key derivation failed: {e}");
            std::process::exit(1);
        }
    };

    if cfg.show > 0 {
        print_raw_table(&d, cfg.show);
    }
    print_summary(&d);

    let ciphertext = cfg.message.map(|m| {
        let ct = xor_with_key(m.as_bytes(), &d.secret_key);
        print_message_demo(m, &ct, &d.secret_key);
        ct
    });

    let battery = if cfg.quality {
        let results = qkdsim_tests::run_key_battery(&d.secret_key.bits());
        print_battery(&results);
        Some(results)
    } else {
        None
    };

    if let Some(path) = cfg.output_path {
        let mut value = serde_json::json!({
            "seed": seed,
            "derivation": d,
        });
        if let Some(ct) = &ciphertext {
            value["ciphertext_hex"] = serde_json::Value::String(to_hex(ct));
        }
        if let Some(results) = &battery {
            value["quality"] = serde_json::json!({
                "score": qkdsim_tests::calculate_quality_score(results),
                "tests": results.iter().map(battery_json).collect::<Vec<_>>(),
            });
        }
        super::write_json(path, &value);
    }
}

fn print_raw_table(d: &KeyDerivation, limit: usize) {
    let n = limit.min(d.sender_bits.len());
    println!(
        "{:>6} {:>4} {:>5} {:>5} {:>5} {:>4} {:>6}",
        "Slot", "Bit", "Alice", "Eve", "Bob", "Meas", "Kept"
    );
    println!("{}", "-".repeat(42));
    for i in 0..n {
        let eve = match &d.interception {
            Some(eve) => format!("{}:{}", eve.bases[i].symbol(), eve.bits[i]),
            None => "-".to_string(),
        };
        let (meas, kept) = if !d.received[i] {
            ("-".to_string(), "lost")
        } else if d.sender_bases[i] == d.receiver_bases[i] {
            (d.receiver_bits[i].to_string(), "yes")
        } else {
            (d.receiver_bits[i].to_string(), "")
        };
        println!(
            "{:>6} {:>4} {:>5} {:>5} {:>5} {:>4} {:>6}",
            i,
            d.sender_bits[i],
            d.sender_bases[i].symbol(),
            eve,
            d.receiver_bases[i].symbol(),
            meas,
            kept
        );
    }
    if n < d.sender_bits.len() {
        println!("  ... {} more slot(s)", d.sender_bits.len() - n);
    }
    println!();
}

fn print_summary(d: &KeyDerivation) {
    println!("{:<25} {}", "Backend", d.backend);
    println!("{:<25} {}", "Raw qubits", d.sender_bits.len());
    println!("{:<25} {:.4}", "Channel loss", d.loss);
    println!(
        "{:<25} {}",
        "Eavesdropper",
        if d.interception.is_some() { "intercept-resend" } else { "none" }
    );
    println!("{:<25} {}", "Sifted length", d.sifted.len());
    println!("{:<25} {:.4}", "QBER", d.qber);
    println!("{:<25} {:.4}", "Fidelity", d.fidelity);
    println!("{:<25} {}", "Bits corrected", d.bits_flipped);
    println!("{:<25} {}", "Parities disclosed", d.parities_disclosed);
    println!("{:<25} {}", "Residual errors", d.residual_errors);
    println!("{:<25} {}", "Key bits", d.secret_key.bit_len());
    if d.secret_key.is_empty() {
        println!("{:<25} (empty)", "Key");
    } else {
        println!("{:<25} {}", "Key", d.secret_key);
    }
    println!();

    match d.abort {
        Some(reason) => println!("!! Key rejected: {reason}. Do not use this key."),
        None => println!("Key accepted. Encryption allowed."),
    }
}

/// XOR `data` with the key bytes, cycling the key.
fn xor_with_key(data: &[u8], key: &SecretKey) -> Vec<u8> {
    let k = key.bytes();
    if k.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(k.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

fn print_message_demo(message: &str, ciphertext: &[u8], key: &SecretKey) {
    println!();
    if key.is_empty() {
        println!("Key is empty; message left unencrypted.");
    }
    let decrypted = xor_with_key(ciphertext, key);
    println!("{:<25} {message}", "Message");
    println!("{:<25} {}", "Ciphertext (hex)", to_hex(ciphertext));
    println!(
        "{:<25} {}",
        "Decrypted",
        String::from_utf8_lossy(&decrypted)
    );
}

fn print_battery(results: &[TestResult]) {
    println!();
    println!("{:<25} {:>10} {:>6} {:>6}", "Test", "p-value", "Grade", "Pass");
    println!("{}", "-".repeat(50));
    for r in results {
        let p = r
            .p_value
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<25} {:>10} {:>6} {:>6}",
            r.name,
            p,
            r.grade,
            if r.passed { "yes" } else { "no" }
        );
    }
    println!(
        "\nQuality score: {:.1}/100",
        qkdsim_tests::calculate_quality_score(results)
    );
}

fn battery_json(r: &TestResult) -> serde_json::Value {
    serde_json::json!({
        "name": r.name,
        "passed": r.passed,
        "p_value": r.p_value,
        "statistic": r.statistic,
        "details": r.details,
        "grade": r.grade.to_string(),
    })
}
