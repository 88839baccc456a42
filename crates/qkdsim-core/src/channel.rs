//! Physical channel parameters and the node/link table.
//!
//! [`ChannelConfig`] is owned by the session and only changes through
//! explicit `set` commands; the simulator and sweep runner borrow it
//! read-only. Sweeps never mutate it either: each combination is applied to
//! a copy via [`ChannelConfig::with_overrides`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Tunable parameters
// ---------------------------------------------------------------------------

/// A channel parameter addressable by `set` and `sweep parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelParam {
    /// Fibre attenuation in dB/km.
    Loss,
    /// Probability of a bit flip after detection.
    ChannelNoise,
    /// Probability of a dark click per detection window.
    DarkCount,
    /// Link length in km.
    Distance,
    /// Probability that an arriving photon produces a click.
    DetectorEfficiency,
}

impl ChannelParam {
    pub const ALL: [ChannelParam; 5] = [
        ChannelParam::Loss,
        ChannelParam::ChannelNoise,
        ChannelParam::DarkCount,
        ChannelParam::Distance,
        ChannelParam::DetectorEfficiency,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::ChannelNoise => "channel-noise",
            Self::DarkCount => "dark-count",
            Self::Distance => "distance",
            Self::DetectorEfficiency => "detector-efficiency",
        }
    }

    /// Probabilities live in `[0, 1]`; loss and distance only need to be non-negative.
    pub fn is_probability(self) -> bool {
        matches!(
            self,
            Self::ChannelNoise | Self::DarkCount | Self::DetectorEfficiency
        )
    }

    /// Reject NaN, infinities and out-of-range values.
    pub fn validate(self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(Error::syntax(format!(
                "{} must be a finite number, got {value}",
                self.name()
            )));
        }
        if value < 0.0 {
            return Err(Error::syntax(format!(
                "{} must be >= 0, got {value}",
                self.name()
            )));
        }
        if self.is_probability() && value > 1.0 {
            return Err(Error::syntax(format!(
                "{} must be between 0 and 1, got {value}",
                self.name()
            )));
        }
        Ok(value)
    }
}

impl std::fmt::Display for ChannelParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelParam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                Error::syntax(format!(
                    "Unknown parameter '{s}'. Valid: {}",
                    names.join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Channel configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub loss_db_per_km: f64,
    pub noise: f64,
    pub dark_count: f64,
    pub distance_km: f64,
    pub detector_efficiency: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_db_per_km: 0.0,
            noise: 0.0,
            dark_count: 0.0,
            distance_km: 1.0,
            detector_efficiency: 1.0,
        }
    }
}

impl ChannelConfig {
    /// Probability that a photon survives the fibre: `10^(-loss * distance / 10)`.
    pub fn transmittance(&self) -> f64 {
        10f64.powf(-self.loss_db_per_km * self.distance_km / 10.0)
    }

    pub fn get(&self, param: ChannelParam) -> f64 {
        match param {
            ChannelParam::Loss => self.loss_db_per_km,
            ChannelParam::ChannelNoise => self.noise,
            ChannelParam::DarkCount => self.dark_count,
            ChannelParam::Distance => self.distance_km,
            ChannelParam::DetectorEfficiency => self.detector_efficiency,
        }
    }

    /// Validate and store `value`. On error the config is left untouched.
    pub fn set(&mut self, param: ChannelParam, value: f64) -> Result<()> {
        let value = param.validate(value)?;
        let slot = match param {
            ChannelParam::Loss => &mut self.loss_db_per_km,
            ChannelParam::ChannelNoise => &mut self.noise,
            ChannelParam::DarkCount => &mut self.dark_count,
            ChannelParam::Distance => &mut self.distance_km,
            ChannelParam::DetectorEfficiency => &mut self.detector_efficiency,
        };
        *slot = value;
        Ok(())
    }

    /// Copy of this config with each `(param, value)` applied in order.
    pub fn with_overrides(&self, overrides: &[(ChannelParam, f64)]) -> Result<Self> {
        let mut cfg = *self;
        for &(param, value) in overrides {
            cfg.set(param, value)?;
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Nodes and links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Transmitter,
    Receiver,
    Eavesdropper,
    Relay,
}

impl NodeRole {
    pub fn name(self) -> &'static str {
        match self {
            Self::Transmitter => "transmitter",
            Self::Receiver => "receiver",
            Self::Eavesdropper => "eavesdropper",
            Self::Relay => "relay",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "transmitter" | "tx" | "sender" => Ok(Self::Transmitter),
            "receiver" | "rx" => Ok(Self::Receiver),
            "eavesdropper" | "eve" => Ok(Self::Eavesdropper),
            "relay" => Ok(Self::Relay),
            _ => Err(Error::syntax(format!(
                "Unknown role '{s}'. Valid: transmitter, receiver, eavesdropper, relay"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub role: NodeRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: String,
    pub b: String,
    pub distance_km: Option<f64>,
}

/// Named nodes and the links between them, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl Topology {
    /// Add a node; an existing node with the same name is replaced.
    pub fn add_node(&mut self, name: &str, role: NodeRole) {
        match self.nodes.iter_mut().find(|n| n.name == name) {
            Some(node) => node.role = role,
            None => self.nodes.push(Node {
                name: name.to_string(),
                role,
            }),
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Add a link. Both endpoints must already exist.
    pub fn add_link(&mut self, a: &str, b: &str, distance_km: Option<f64>) -> Result<&Link> {
        for endpoint in [a, b] {
            if self.node(endpoint).is_none() {
                return Err(Error::UnknownNode(endpoint.to_string()));
            }
        }
        if let Some(d) = distance_km {
            ChannelParam::Distance.validate(d)?;
        }
        self.links.push(Link {
            a: a.to_string(),
            b: b.to_string(),
            distance_km,
        });
        Ok(&self.links[self.links.len() - 1])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// True if any node plays the eavesdropper role.
    pub fn has_eavesdropper(&self) -> bool {
        self.nodes.iter().any(|n| n.role == NodeRole::Eavesdropper)
    }
}
