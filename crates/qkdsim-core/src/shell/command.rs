//! Argument parsing for recognised verbs.

use crate::channel::{ChannelParam, NodeRole};
use crate::error::{Error, Result};
use crate::sweep::{ParamRange, SweepMode};

use super::mode::Verb;

/// Target of a `set` command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetTarget {
    Channel(ChannelParam, f64),
    Photons(usize),
    ErrorFloor(f64),
    /// `None` means draw a fresh OS seed.
    Seed(Option<u64>),
}

/// A fully parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Enable,
    Exit,
    Help,
    ConfigureTerminal,
    ExperimentConfigure,
    ShowSystem,
    ShowSweepPlan,
    ShowResultsSummary,
    RunBb84 { eve: bool },
    ClearResults,
    CreateNode { name: String, role: NodeRole },
    CreateLink { a: String, b: String, distance_km: Option<f64> },
    Set(SetTarget),
    SweepMode(SweepMode),
    SweepParameter { param: ChannelParam, range: ParamRange },
    SweepClear,
}

fn usage(verb: Verb) -> Error {
    Error::syntax(format!("Usage: {}", verb.usage()))
}

fn number(verb: Verb, token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            Error::syntax(format!(
                "invalid number '{token}'. Usage: {}",
                verb.usage()
            ))
        })
}

impl Command {
    /// Parse the argument tokens that follow `verb`.
    pub fn parse(verb: Verb, args: &[&str]) -> Result<Self> {
        let bare = |cmd: Command| {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(usage(verb))
            }
        };

        match verb {
            Verb::Enable => bare(Self::Enable),
            Verb::Exit => bare(Self::Exit),
            Verb::Help => Ok(Self::Help),
            Verb::ConfigureTerminal => bare(Self::ConfigureTerminal),
            Verb::ExperimentConfigure => bare(Self::ExperimentConfigure),
            Verb::ShowSystem => bare(Self::ShowSystem),
            Verb::ShowSweepPlan => bare(Self::ShowSweepPlan),
            Verb::ShowResultsSummary => bare(Self::ShowResultsSummary),
            Verb::ClearResults => bare(Self::ClearResults),
            Verb::SweepClear => bare(Self::SweepClear),
            Verb::RunBb84 => match args {
                [] => Ok(Self::RunBb84 { eve: false }),
                [flag] if flag.eq_ignore_ascii_case("eve") => Ok(Self::RunBb84 { eve: true }),
                _ => Err(usage(verb)),
            },
            Verb::CreateNode => match args {
                [name, kw, role] if kw.eq_ignore_ascii_case("role") => Ok(Self::CreateNode {
                    name: name.to_string(),
                    role: role.parse()?,
                }),
                _ => Err(usage(verb)),
            },
            Verb::CreateLink => match args {
                [a, b] => Ok(Self::CreateLink {
                    a: a.to_string(),
                    b: b.to_string(),
                    distance_km: None,
                }),
                [a, b, d] => Ok(Self::CreateLink {
                    a: a.to_string(),
                    b: b.to_string(),
                    distance_km: Some(number(verb, d)?),
                }),
                _ => Err(usage(verb)),
            },
            Verb::Set => Self::parse_set(args).map(Self::Set),
            Verb::SweepMode => match args {
                [mode] => Ok(Self::SweepMode(mode.parse()?)),
                _ => Err(usage(verb)),
            },
            Verb::SweepParameter => match args {
                [name, start, end, kw, step] if kw.eq_ignore_ascii_case("step") => {
                    let param: ChannelParam = name.parse()?;
                    let range = ParamRange::new(
                        number(verb, start)?,
                        number(verb, end)?,
                        number(verb, step)?,
                    )?;
                    Ok(Self::SweepParameter { param, range })
                }
                _ => Err(usage(verb)),
            },
        }
    }

    fn parse_set(args: &[&str]) -> Result<SetTarget> {
        let [name, value] = args else {
            return Err(usage(Verb::Set));
        };
        match name.to_ascii_lowercase().as_str() {
            "photons" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| Error::syntax(format!("invalid photon count '{value}'")))?;
                Ok(SetTarget::Photons(n))
            }
            "error-floor" => Ok(SetTarget::ErrorFloor(number(Verb::Set, value)?)),
            "seed" if value.eq_ignore_ascii_case("random") => Ok(SetTarget::Seed(None)),
            "seed" => value
                .parse::<u64>()
                .map(|s| SetTarget::Seed(Some(s)))
                .map_err(|_| Error::syntax(format!("invalid seed '{value}'. Usage: set seed <n|random>"))),
            _ => {
                let param: ChannelParam = name.parse()?;
                let v = param.validate(number(Verb::Set, value)?)?;
                Ok(SetTarget::Channel(param, v))
            }
        }
    }
}
