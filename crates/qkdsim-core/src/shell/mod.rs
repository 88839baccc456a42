//! Mode-based command interpreter.
//!
//! One line in, a [`Response`] out. Dispatch is table-driven:
//!
//! 1. match leading keywords to a [`Verb`] (none → `UnknownCommand`)
//! 2. look up `(mode, verb)` in [`mode::TABLE`] (absent → `InvalidModeTransition`)
//! 3. parse arguments into a [`Command`] (bad → `InvalidCommandSyntax`)
//! 4. apply it to the [`Session`], then take the transition
//!
//! Every error is rendered as a single `% <message>` line and leaves the mode
//! unchanged. Nothing an operator types can end the process except `exit`
//! from user mode.

pub mod command;
pub mod mode;
pub mod render;

pub use command::{Command, SetTarget};
pub use mode::{Mode, Transition, Verb};

use crate::error::{Error, Result};
use crate::session::Session;

/// Output of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub lines: Vec<String>,
    /// Prompt for the *next* line.
    pub prompt: &'static str,
}

pub struct Shell {
    session: Session,
    mode: Mode,
    finished: bool,
}

impl Shell {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            mode: Mode::User,
            finished: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn prompt(&self) -> &'static str {
        self.mode.prompt()
    }

    /// True once `exit` was issued in user mode.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Interpret one line.
    pub fn execute(&mut self, line: &str) -> Response {
        let lines = match self.dispatch(line) {
            Ok(lines) => lines,
            Err(e) => {
                log::debug!("command rejected in {} mode: {e}", self.mode);
                vec![format!("% {e}")]
            }
        };
        Response {
            lines,
            prompt: self.prompt(),
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() || tokens[0].starts_with('!') {
            return Ok(Vec::new());
        }

        let (verb, args) =
            Verb::recognize(&tokens).ok_or_else(|| Error::UnknownCommand(line.trim().to_string()))?;

        let transition =
            mode::lookup(self.mode, verb).ok_or_else(|| Error::InvalidModeTransition {
                command: verb.keyword().to_string(),
                mode: self.mode.label(),
                valid_in: mode::modes_accepting(verb)
                    .iter()
                    .map(|m| m.label())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let command = Command::parse(verb, args)?;
        let lines = self.apply(command)?;

        match transition {
            Transition::Stay => {}
            Transition::Enter(next) => self.mode = next,
            Transition::Quit => self.finished = true,
        }
        Ok(lines)
    }

    fn apply(&mut self, command: Command) -> Result<Vec<String>> {
        let session = &mut self.session;
        let lines = match command {
            Command::Enable
            | Command::Exit
            | Command::ConfigureTerminal
            | Command::ExperimentConfigure => Vec::new(),
            Command::Help => render::help(self.mode),
            Command::ShowSystem => render::system(session),
            Command::ShowSweepPlan => render::sweep_plan(&session.sweep),
            Command::ShowResultsSummary => render::results_summary(session.ledger()),
            Command::ClearResults => {
                session.clear_results();
                vec!["Results cleared.".to_string()]
            }
            Command::RunBb84 { eve } => {
                if !session.sweep.is_configured() {
                    return Err(Error::SweepNotConfigured);
                }
                let eve = session.eavesdropper_active(eve);
                let mut lines = vec![format!(
                    "Starting BB84 experiment (photon-level simulation){}...",
                    if eve { " with eavesdropper" } else { "" }
                )];
                let results = session.run_sweep(eve)?;
                lines.extend(results.iter().map(render::run_line));
                lines.push("Experiment completed.".to_string());
                lines
            }
            Command::CreateNode { name, role } => {
                session.create_node(&name, role);
                vec![format!("Node {name} created as {role}")]
            }
            Command::CreateLink { a, b, distance_km } => {
                session.create_link(&a, &b, distance_km)?;
                match distance_km {
                    Some(d) => vec![format!("Link {a} <-> {b} created ({d} km)")],
                    None => vec![format!("Link {a} <-> {b} created")],
                }
            }
            Command::Set(target) => match target {
                SetTarget::Channel(param, value) => {
                    session.channel.set(param, value)?;
                    vec![format!("{param} set to {value}")]
                }
                SetTarget::Photons(n) => {
                    session.simulation.set_photons(n)?;
                    vec![format!("photons set to {n}")]
                }
                SetTarget::ErrorFloor(f) => {
                    session.simulation.set_error_floor(f)?;
                    vec![format!("error-floor set to {f}")]
                }
                SetTarget::Seed(seed) => {
                    let seed = session.reseed(seed)?;
                    vec![format!("seed set to {seed}")]
                }
            },
            Command::SweepMode(mode) => {
                session.sweep.set_mode(mode);
                vec![format!("Sweep mode set to {mode}")]
            }
            Command::SweepParameter { param, range } => {
                session.sweep.set_parameter(param, range)?;
                vec![format!(
                    "Sweep parameter {param}: {range} ({} values)",
                    range.len()
                )]
            }
            Command::SweepClear => {
                session.sweep.clear();
                vec!["Sweep plan cleared.".to_string()]
            }
        };
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        let mut session = Session::new(Some(1)).unwrap();
        session.simulation.photons = 200;
        Shell::new(session)
    }

    fn run(sh: &mut Shell, lines: &[&str]) -> Vec<Response> {
        lines.iter().map(|l| sh.execute(l)).collect()
    }

    // -----------------------------------------------------------------------
    // Modes
    // -----------------------------------------------------------------------

    #[test]
    fn test_mode_walk() {
        let mut sh = shell();
        assert_eq!(sh.prompt(), "qkdsim> ");
        assert_eq!(sh.execute("enable").prompt, "qkdsim# ");
        assert_eq!(sh.execute("configure terminal").prompt, "qkdsim(config)# ");
        assert_eq!(sh.execute("exit").prompt, "qkdsim# ");
        assert_eq!(sh.execute("experiment configure").prompt, "qkdsim(experiment)# ");
        assert_eq!(sh.execute("exit").prompt, "qkdsim# ");
        assert_eq!(sh.execute("exit").prompt, "qkdsim> ");
        assert!(!sh.is_finished());
        sh.execute("exit");
        assert!(sh.is_finished());
    }

    #[test]
    fn test_unknown_command_keeps_mode() {
        let mut sh = shell();
        sh.execute("enable");
        let r = sh.execute("launch missiles");
        assert_eq!(r.lines, vec!["% Unknown command: launch missiles"]);
        assert_eq!(sh.mode(), Mode::Privileged);
    }

    #[test]
    fn test_wrong_mode_names_valid_modes() {
        let mut sh = shell();
        let r = sh.execute("run bb84");
        assert_eq!(r.lines.len(), 1);
        assert!(r.lines[0].starts_with("% "));
        assert!(r.lines[0].contains("user mode"));
        assert!(r.lines[0].contains("privileged"));
        assert_eq!(sh.mode(), Mode::User);
    }

    #[test]
    fn test_syntax_error_does_not_transition() {
        let mut sh = shell();
        let r = sh.execute("enable please");
        assert!(r.lines[0].starts_with("% Usage: enable"));
        assert_eq!(sh.mode(), Mode::User);
    }

    #[test]
    fn test_blank_and_comment_lines() {
        let mut sh = shell();
        assert!(sh.execute("   ").lines.is_empty());
        assert!(sh.execute("! a comment").lines.is_empty());
    }

    #[test]
    fn test_help_in_every_mode() {
        let mut sh = shell();
        assert!(sh.execute("?").lines[0].contains("user mode"));
        sh.execute("enable");
        assert!(sh.execute("help").lines.iter().any(|l| l.contains("run bb84")));
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn test_config_commands() {
        let mut sh = shell();
        let out = run(
            &mut sh,
            &[
                "enable",
                "configure terminal",
                "create node alice role transmitter",
                "create node bob role receiver",
                "create link alice bob 15",
                "set loss 0.2",
                "set dark-count 0.001",
                "set photons 1000",
                "set seed 77",
            ],
        );
        assert_eq!(out[2].lines, vec!["Node alice created as transmitter"]);
        assert_eq!(out[4].lines, vec!["Link alice <-> bob created (15 km)"]);
        let s = sh.session();
        assert_eq!(s.channel.distance_km, 15.0);
        assert_eq!(s.channel.loss_db_per_km, 0.2);
        assert_eq!(s.simulation.photons, 1000);
        assert_eq!(s.seed(), 77);
    }

    #[test]
    fn test_config_rejections() {
        let mut sh = shell();
        let out = run(
            &mut sh,
            &[
                "enable",
                "configure terminal",
                "create link alice bob",
                "set channel-noise 1.2",
                "set photons 0",
            ],
        );
        assert!(out[2].lines[0].contains("unknown node 'alice'"));
        assert!(out[3].lines[0].starts_with("% channel-noise must be between 0 and 1"));
        assert!(out[4].lines[0].starts_with("% photon count"));
        assert_eq!(sh.session().channel.noise, 0.0);
        assert_eq!(sh.mode(), Mode::Config);
    }

    // -----------------------------------------------------------------------
    // Experiments
    // -----------------------------------------------------------------------

    #[test]
    fn test_run_without_sweep() {
        let mut sh = shell();
        sh.execute("enable");
        let r = sh.execute("run bb84");
        assert_eq!(
            r.lines,
            vec!["% Sweep not configured. Set 'sweep mode' and at least one 'sweep parameter' first"]
        );
        assert_eq!(sh.execute("show results summary").lines, vec!["No results available."]);
        assert_eq!(sh.execute("show sweep-plan").lines, vec!["No sweep configured"]);
    }

    #[test]
    fn test_single_sweep_run() {
        let mut sh = shell();
        let out = run(
            &mut sh,
            &[
                "enable",
                "experiment configure",
                "sweep mode single",
                "sweep parameter channel-noise 0 0.2 step 0.05",
                "exit",
                "run bb84",
            ],
        );
        let run_out = &out[5].lines;
        assert_eq!(run_out[0], "Starting BB84 experiment (photon-level simulation)...");
        assert!(run_out[1].starts_with("Run 1 done → channel-noise=0"));
        assert!(run_out[5].starts_with("Run 5 done → channel-noise=0.2"));
        assert_eq!(run_out[6], "Experiment completed.");
        assert_eq!(sh.session().ledger().len(), 5);

        let summary = sh.execute("show results summary").lines;
        assert_eq!(summary.len(), 2 + 5 + 2);

        sh.execute("clear results");
        assert!(sh.session().ledger().is_empty());
    }

    #[test]
    fn test_eve_run_is_insecure() {
        let mut sh = shell();
        sh.session_mut().simulation.photons = 4000;
        run(
            &mut sh,
            &[
                "enable",
                "experiment configure",
                "sweep mode single",
                "sweep parameter distance 1 1 step 1",
                "exit",
            ],
        );
        let r = sh.execute("run bb84 eve");
        assert!(r.lines[0].contains("with eavesdropper"));
        assert!(!sh.session().ledger().results()[0].secure);
    }

    #[test]
    fn test_runaway_combo_is_a_diagnostic() {
        let mut sh = shell();
        let out = run(
            &mut sh,
            &[
                "enable",
                "experiment configure",
                "sweep mode combo",
                "sweep parameter loss 0 999 step 1",
                "sweep parameter distance 0 999 step 1",
                "sweep parameter channel-noise 0 0.999 step 0.001",
                "show sweep-plan",
                "exit",
                "run bb84",
            ],
        );
        assert!(out[5].lines[0].ends_with("(1000 values)"));
        let plan = &out[6].lines;
        assert!(plan.last().unwrap().starts_with("Total runs: 1000000000 (exceeds the limit"));
        let r = &out[8].lines;
        assert_eq!(r.len(), 1);
        assert!(r[0].starts_with("% sweep expands to 1000000000 runs"));
        assert!(sh.session().ledger().is_empty());
        assert_eq!(sh.mode(), Mode::Privileged);
    }

    #[test]
    fn test_sweep_clear() {
        let mut sh = shell();
        run(
            &mut sh,
            &[
                "enable",
                "experiment configure",
                "sweep mode paired",
                "sweep parameter loss 0 1 step 0.5",
                "sweep clear",
            ],
        );
        assert_eq!(sh.execute("show sweep-plan").lines, vec!["No sweep configured"]);
    }
}
