use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::line::UndergroundLine;
use crate::network::{Branch, Bus, Network};
use crate::transformer::{ThreeWindingTransformer, Transformer};

/// Serialisable description of a network, applied to the store entry by entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDescription {
    #[serde(default = "default_name")]
    pub name: String,
    /// System power base in MVA.
    #[serde(default = "default_s_base")]
    pub s_base: f64,
    #[serde(default = "default_frequency")]
    pub frequency: f64,

    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub transformers: Vec<Transformer>,
    #[serde(default)]
    pub three_winding_transformers: Vec<ThreeWindingTransformer>,
    #[serde(default)]
    pub underground_lines: Vec<UndergroundLine>,
}

fn default_name() -> String {
    "network".to_string()
}

fn default_s_base() -> f64 {
    100.0
}

fn default_frequency() -> f64 {
    60.0
}

impl Default for NetworkDescription {
    fn default() -> Self {
        Self {
            name: default_name(),
            s_base: default_s_base(),
            frequency: default_frequency(),
            buses: Vec::new(),
            branches: Vec::new(),
            transformers: Vec::new(),
            three_winding_transformers: Vec::new(),
            underground_lines: Vec::new(),
        }
    }
}

impl NetworkDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the store. Buses go first, then lines, cables and transformers;
    /// the first rejected entry aborts the build.
    pub fn into_network(self) -> Result<Network> {
        let mut network = Network::new(self.name, self.s_base, self.frequency);
        for bus in self.buses {
            network.add_bus(bus)?;
        }
        for branch in self.branches {
            network.add_branch(branch)?;
        }
        for line in &self.underground_lines {
            network.add_underground_line(line)?;
        }
        for transformer in self.transformers {
            network.add_transformer(transformer)?;
        }
        for transformer in self.three_winding_transformers {
            network.add_three_winding_transformer(transformer)?;
        }
        info!("Loaded network description {}", network.case_name);
        Ok(network)
    }
}

impl TryFrom<NetworkDescription> for Network {
    type Error = Error;

    fn try_from(description: NetworkDescription) -> Result<Self> {
        description.into_network()
    }
}
