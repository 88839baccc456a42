//! Text rendering for shell output. Every function returns lines, never prints.

use crate::channel::ChannelParam;
use crate::ledger::{RunLedger, RunResult};
use crate::session::Session;
use crate::sweep::{MAX_SWEEP_RUNS, SweepPlan};

use super::mode::{Mode, verbs_in};

pub fn help(mode: Mode) -> Vec<String> {
    let mut lines = vec![format!("Commands available in {mode} mode:")];
    for verb in verbs_in(mode) {
        lines.push(format!("  {:<58} {}", verb.usage(), verb.description()));
    }
    lines
}

pub fn system(session: &Session) -> Vec<String> {
    let mut lines = vec!["Channel configuration:".to_string()];
    for param in ChannelParam::ALL {
        let unit = match param {
            ChannelParam::Loss => " dB/km",
            ChannelParam::Distance => " km",
            _ => "",
        };
        lines.push(format!(
            "  {:<22} {}{unit}",
            param.name(),
            session.channel.get(param)
        ));
    }
    lines.push(format!(
        "  {:<22} {:.6}",
        "transmittance",
        session.channel.transmittance()
    ));
    lines.push(format!("  {:<22} {}", "photons", session.simulation.photons));
    lines.push(format!("  {:<22} {}", "error-floor", session.simulation.error_floor));
    lines.push(format!("  {:<22} {}", "seed", session.seed()));
    lines.push(format!("  {:<22} {}", "workers", session.workers()));

    let nodes = session.topology.nodes();
    if nodes.is_empty() {
        lines.push("No nodes defined.".to_string());
    } else {
        lines.push(format!("Nodes ({}):", nodes.len()));
        for node in nodes {
            lines.push(format!("  {:<22} {}", node.name, node.role));
        }
    }
    let links = session.topology.links();
    if !links.is_empty() {
        lines.push(format!("Links ({}):", links.len()));
        for link in links {
            match link.distance_km {
                Some(d) => lines.push(format!("  {} <-> {} ({d} km)", link.a, link.b)),
                None => lines.push(format!("  {} <-> {}", link.a, link.b)),
            }
        }
    }
    lines
}

pub fn sweep_plan(plan: &SweepPlan) -> Vec<String> {
    if plan.mode().is_none() && plan.parameters().is_empty() {
        return vec!["No sweep configured".to_string()];
    }
    let mut lines = vec![match plan.mode() {
        Some(mode) => format!("Sweep mode: {mode}"),
        None => "Sweep mode: (not set)".to_string(),
    }];
    for (param, range) in plan.parameters() {
        lines.push(format!(
            "  {:<22} {range} ({} values)",
            param.name(),
            range.len()
        ));
    }
    match plan.run_count() {
        Ok(runs) if runs > MAX_SWEEP_RUNS => lines.push(format!(
            "Total runs: {runs} (exceeds the limit of {MAX_SWEEP_RUNS}; run will be refused)"
        )),
        Ok(runs) => lines.push(format!("Total runs: {runs}")),
        Err(e) => lines.push(e.to_string()),
    }
    lines
}

/// Progress line for one finished run.
pub fn run_line(result: &RunResult) -> String {
    let verdict = if result.secure { "secure" } else { "insecure" };
    format!(
        "Run {} done → {} (qber {:.4}, {verdict})",
        result.run_index,
        result.params_label(),
        result.qber
    )
}

pub fn results_summary(ledger: &RunLedger) -> Vec<String> {
    let Some(summary) = ledger.summary() else {
        return vec!["No results available.".to_string()];
    };

    let mut lines = vec![
        format!(
            "{:>4}  {:<40} {:>8} {:>8} {:>8} {:>8}",
            "Run", "Parameters", "QBER", "Sifted", "Final", "Secure"
        ),
        "-".repeat(82),
    ];
    for r in ledger.iter() {
        lines.push(format!(
            "{:>4}  {:<40} {:>8.4} {:>8} {:>8} {:>8}",
            r.run_index,
            r.params_label(),
            r.qber,
            r.sifted_length,
            r.final_key_length,
            if r.secure { "yes" } else { "no" }
        ));
    }
    lines.push("-".repeat(82));
    lines.push(format!(
        "{} runs, {} secure | QBER mean {:.4} min {:.4} max {:.4} | {} final key bits",
        summary.runs,
        summary.secure_runs,
        summary.mean_qber,
        summary.min_qber,
        summary.max_qber,
        summary.total_final_key_bits
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::ChannelOutcome;
    use crate::sweep::{ParamRange, SweepMode};

    #[test]
    fn test_empty_plan_and_ledger() {
        assert_eq!(sweep_plan(&SweepPlan::default()), vec!["No sweep configured"]);
        assert_eq!(results_summary(&RunLedger::new()), vec!["No results available."]);
    }

    #[test]
    fn test_plan_reports_run_count() {
        let mut plan = SweepPlan::default();
        plan.set_mode(SweepMode::Combo);
        plan.set_parameter(ChannelParam::Loss, ParamRange::new(0.0, 0.2, 0.05).unwrap())
            .unwrap();
        plan.set_parameter(ChannelParam::Distance, ParamRange::new(0.0, 4.0, 1.0).unwrap())
            .unwrap();
        let lines = sweep_plan(&plan);
        assert_eq!(lines[0], "Sweep mode: combo");
        assert_eq!(lines.last().unwrap(), "Total runs: 25");
    }

    #[test]
    fn test_summary_table_rows() {
        let mut ledger = RunLedger::new();
        ledger.record(&[(ChannelParam::Loss, 0.1)], &ChannelOutcome::from_counts(100, 1));
        ledger.record(&[(ChannelParam::Loss, 0.2)], &ChannelOutcome::from_counts(100, 30));
        let lines = results_summary(&ledger);
        // header, rule, two rows, rule, totals
        assert_eq!(lines.len(), 6);
        assert!(lines[2].contains("loss=0.1"));
        assert!(lines[3].trim_end().ends_with("no"));
        assert!(lines[5].starts_with("2 runs, 1 secure"));
    }

    #[test]
    fn test_run_line() {
        let mut ledger = RunLedger::new();
        let r = ledger.record(&[(ChannelParam::DarkCount, 0.01)], &ChannelOutcome::from_counts(10, 1));
        assert_eq!(run_line(r), "Run 1 done → dark-count=0.01 (qber 0.1000, secure)");
    }

    #[test]
    fn test_help_lists_mode_commands() {
        let lines = help(Mode::Config);
        assert!(lines.iter().any(|l| l.contains("create node")));
        assert!(!lines.iter().any(|l| l.contains("run bb84")));
    }
}
