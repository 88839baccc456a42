//! Modes, verbs and the static transition table.
//!
//! The table is the single source of truth for which verb is accepted in
//! which mode and where it leads. Dispatch, help output and the
//! "valid in" part of diagnostics are all derived from it.

/// Interpreter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    User,
    Privileged,
    Config,
    Experiment,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::User, Mode::Privileged, Mode::Config, Mode::Experiment];

    pub fn prompt(self) -> &'static str {
        match self {
            Self::User => "qkdsim> ",
            Self::Privileged => "qkdsim# ",
            Self::Config => "qkdsim(config)# ",
            Self::Experiment => "qkdsim(experiment)# ",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Privileged => "privileged",
            Self::Config => "config",
            Self::Experiment => "experiment",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Recognised command word(s), independent of arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Enable,
    Exit,
    Help,
    ConfigureTerminal,
    ExperimentConfigure,
    ShowSystem,
    ShowSweepPlan,
    ShowResultsSummary,
    RunBb84,
    ClearResults,
    CreateNode,
    CreateLink,
    Set,
    SweepMode,
    SweepParameter,
    SweepClear,
}

/// Keyword sequences, longest first so `show results summary` wins over shorter prefixes.
const KEYWORDS: &[(&[&str], Verb)] = &[
    (&["show", "results", "summary"], Verb::ShowResultsSummary),
    (&["configure", "terminal"], Verb::ConfigureTerminal),
    (&["experiment", "configure"], Verb::ExperimentConfigure),
    (&["show", "system"], Verb::ShowSystem),
    (&["show", "sweep-plan"], Verb::ShowSweepPlan),
    (&["run", "bb84"], Verb::RunBb84),
    (&["clear", "results"], Verb::ClearResults),
    (&["create", "node"], Verb::CreateNode),
    (&["create", "link"], Verb::CreateLink),
    (&["sweep", "mode"], Verb::SweepMode),
    (&["sweep", "parameter"], Verb::SweepParameter),
    (&["sweep", "clear"], Verb::SweepClear),
    (&["set"], Verb::Set),
    (&["enable"], Verb::Enable),
    (&["exit"], Verb::Exit),
    (&["help"], Verb::Help),
    (&["?"], Verb::Help),
];

impl Verb {
    /// Match the leading tokens of a command line. Returns the verb and the
    /// remaining argument tokens.
    pub fn recognize<'a, 'b>(tokens: &'a [&'b str]) -> Option<(Verb, &'a [&'b str])> {
        KEYWORDS.iter().find_map(|(words, verb)| {
            let matches = tokens.len() >= words.len()
                && words
                    .iter()
                    .zip(tokens)
                    .all(|(w, t)| w.eq_ignore_ascii_case(t));
            matches.then(|| (*verb, &tokens[words.len()..]))
        })
    }

    /// Canonical keyword text.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Exit => "exit",
            Self::Help => "help",
            Self::ConfigureTerminal => "configure terminal",
            Self::ExperimentConfigure => "experiment configure",
            Self::ShowSystem => "show system",
            Self::ShowSweepPlan => "show sweep-plan",
            Self::ShowResultsSummary => "show results summary",
            Self::RunBb84 => "run bb84",
            Self::ClearResults => "clear results",
            Self::CreateNode => "create node",
            Self::CreateLink => "create link",
            Self::Set => "set",
            Self::SweepMode => "sweep mode",
            Self::SweepParameter => "sweep parameter",
            Self::SweepClear => "sweep clear",
        }
    }

    /// Full syntax shown in help and usage errors.
    pub fn usage(self) -> &'static str {
        match self {
            Self::RunBb84 => "run bb84 [eve]",
            Self::CreateNode => "create node <name> role <transmitter|receiver|eavesdropper|relay>",
            Self::CreateLink => "create link <node-a> <node-b> [<distance-km>]",
            Self::Set => {
                "set <loss|channel-noise|dark-count|distance|detector-efficiency|photons|error-floor> <value> | set seed <n|random>"
            }
            Self::SweepMode => "sweep mode <single|paired|combo>",
            Self::SweepParameter => "sweep parameter <name> <start> <end> step <value>",
            other => other.keyword(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Enable => "Enter privileged mode",
            Self::Exit => "Leave the current mode",
            Self::Help => "List commands available in this mode",
            Self::ConfigureTerminal => "Enter channel configuration mode",
            Self::ExperimentConfigure => "Enter experiment (sweep) configuration mode",
            Self::ShowSystem => "Show channel parameters, nodes and links",
            Self::ShowSweepPlan => "Show the configured sweep",
            Self::ShowResultsSummary => "Tabulate results of the last run",
            Self::RunBb84 => "Run the configured sweep, optionally with an eavesdropper",
            Self::ClearResults => "Discard all recorded results",
            Self::CreateNode => "Create or replace a network node",
            Self::CreateLink => "Link two existing nodes",
            Self::Set => "Set a channel or run parameter",
            Self::SweepMode => "Choose how parameter ranges are combined",
            Self::SweepParameter => "Declare a parameter range",
            Self::SweepClear => "Discard the sweep plan",
        }
    }
}

/// Effect of an accepted verb on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Enter(Mode),
    /// End the session.
    Quit,
}

use Mode::{Config, Experiment, Privileged, User};
use Transition::{Enter, Quit, Stay};

/// `(mode, verb) → transition`. Absent pairs are rejected.
pub const TABLE: &[(Mode, Verb, Transition)] = &[
    (User, Verb::Enable, Enter(Privileged)),
    (User, Verb::Help, Stay),
    (User, Verb::Exit, Quit),
    (Privileged, Verb::ConfigureTerminal, Enter(Config)),
    (Privileged, Verb::ExperimentConfigure, Enter(Experiment)),
    (Privileged, Verb::ShowSystem, Stay),
    (Privileged, Verb::ShowSweepPlan, Stay),
    (Privileged, Verb::RunBb84, Stay),
    (Privileged, Verb::ShowResultsSummary, Stay),
    (Privileged, Verb::ClearResults, Stay),
    (Privileged, Verb::Help, Stay),
    (Privileged, Verb::Exit, Enter(User)),
    (Config, Verb::CreateNode, Stay),
    (Config, Verb::CreateLink, Stay),
    (Config, Verb::Set, Stay),
    (Config, Verb::ShowSystem, Stay),
    (Config, Verb::Help, Stay),
    (Config, Verb::Exit, Enter(Privileged)),
    (Experiment, Verb::SweepMode, Stay),
    (Experiment, Verb::SweepParameter, Stay),
    (Experiment, Verb::SweepClear, Stay),
    (Experiment, Verb::ShowSweepPlan, Stay),
    (Experiment, Verb::Help, Stay),
    (Experiment, Verb::Exit, Enter(Privileged)),
];

pub fn lookup(mode: Mode, verb: Verb) -> Option<Transition> {
    TABLE
        .iter()
        .find(|(m, v, _)| *m == mode && *v == verb)
        .map(|(_, _, t)| *t)
}

/// Modes in which `verb` is accepted, in table order.
pub fn modes_accepting(verb: Verb) -> Vec<Mode> {
    Mode::ALL
        .into_iter()
        .filter(|&m| lookup(m, verb).is_some())
        .collect()
}

/// Verbs accepted in `mode`, in table order.
pub fn verbs_in(mode: Mode) -> Vec<Verb> {
    TABLE
        .iter()
        .filter(|(m, _, _)| *m == mode)
        .map(|(_, v, _)| *v)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(lookup(User, Verb::Enable), Some(Enter(Privileged)));
        assert_eq!(lookup(User, Verb::Exit), Some(Quit));
        assert_eq!(lookup(Privileged, Verb::ConfigureTerminal), Some(Enter(Config)));
        assert_eq!(lookup(Privileged, Verb::ExperimentConfigure), Some(Enter(Experiment)));
        assert_eq!(lookup(Privileged, Verb::Exit), Some(Enter(User)));
        assert_eq!(lookup(Config, Verb::Exit), Some(Enter(Privileged)));
        assert_eq!(lookup(Experiment, Verb::Exit), Some(Enter(Privileged)));
    }

    #[test]
    fn test_commands_rejected_outside_their_mode() {
        assert_eq!(lookup(User, Verb::RunBb84), None);
        assert_eq!(lookup(Config, Verb::RunBb84), None);
        assert_eq!(lookup(Experiment, Verb::Set), None);
        assert_eq!(lookup(Config, Verb::ConfigureTerminal), None);
    }

    #[test]
    fn test_every_mode_has_help_and_exit() {
        for mode in Mode::ALL {
            assert!(lookup(mode, Verb::Help).is_some(), "{mode}");
            assert!(lookup(mode, Verb::Exit).is_some(), "{mode}");
        }
    }

    #[test]
    fn test_no_duplicate_entries() {
        for (i, (m, v, _)) in TABLE.iter().enumerate() {
            assert!(
                !TABLE[i + 1..].iter().any(|(m2, v2, _)| m == m2 && v == v2),
                "duplicate {m} {v:?}"
            );
        }
    }

    #[test]
    fn test_recognize_multi_word() {
        let tokens = ["show", "results", "summary"];
        assert_eq!(Verb::recognize(&tokens), Some((Verb::ShowResultsSummary, &[][..])));
        let tokens = ["RUN", "bb84", "eve"];
        let (verb, rest) = Verb::recognize(&tokens).unwrap();
        assert_eq!(verb, Verb::RunBb84);
        assert_eq!(rest, &["eve"]);
        assert_eq!(Verb::recognize(&["?"]).map(|(v, _)| v), Some(Verb::Help));
        assert!(Verb::recognize(&["show"]).is_none());
        assert!(Verb::recognize(&["frobnicate"]).is_none());
    }

    #[test]
    fn test_modes_accepting() {
        assert_eq!(modes_accepting(Verb::ShowSystem), vec![Privileged, Config]);
        assert_eq!(modes_accepting(Verb::ShowSweepPlan), vec![Privileged, Experiment]);
        assert_eq!(modes_accepting(Verb::Help).len(), 4);
    }

    #[test]
    fn test_prompts() {
        assert_eq!(User.prompt(), "qkdsim> ");
        assert_eq!(Privileged.prompt(), "qkdsim# ");
        assert_eq!(Config.prompt(), "qkdsim(config)# ");
        assert_eq!(Experiment.prompt(), "qkdsim(experiment)# ");
    }
}
