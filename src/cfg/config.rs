// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Default Diameter port.
pub const DIAMETER_PORT: u16 = 3868;
/// Default Diameter-over-TLS port.
pub const DIAMETER_SECURE_PORT: u16 = 5868;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Subscriber-store backend: `mem:` for the in-process map, or a spool
    /// directory (optionally prefixed with `file:`).
    pub db_uri: String,
    pub hss: HssConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HssConfig {
    #[serde(rename = "freeDiameter")]
    pub free_diameter: FreeDiameter,

    /// Hex-dump key material (K, OPC, CK, IK, KASME, XRES) in debug logs.
    /// Off by default; the logs carry `<redacted>` instead.
    #[serde(default)]
    pub log_keys: bool,
}

/// `hss.freeDiameter` is either a path to an external stack config or the
/// inline node description.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum FreeDiameter {
    Inline(DiameterNode),
    ConfPath(String),
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DiameterNode {
    /// Origin-Host of this HSS.
    pub identity: String,
    /// Origin-Realm.
    pub realm: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_sec_port")]
    pub sec_port: u16,
    pub listen_on: String,
    #[serde(default)]
    pub load_extension: Vec<Extension>,
    /// Static peers to connect to (remote HSS instances, MMEs).
    #[serde(default)]
    pub connect: Vec<Peer>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Extension {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Peer {
    pub identity: String,
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DIAMETER_PORT
}

fn default_sec_port() -> u16 {
    DIAMETER_SECURE_PORT
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.db_uri.is_empty(), "db_uri must not be empty");

        match &self.hss.free_diameter {
            FreeDiameter::ConfPath(path) => {
                ensure!(!path.is_empty(), "hss.freeDiameter path must not be empty");
            },
            FreeDiameter::Inline(node) => {
                ensure!(!node.identity.is_empty(), "identity must not be empty");
                ensure!(!node.realm.is_empty(), "realm must not be empty");
                ensure!(!node.listen_on.is_empty(), "listen_on must not be empty");
                ensure!(node.port != node.sec_port, "port and sec_port must differ");
                for peer in &node.connect {
                    ensure!(
                        !peer.identity.is_empty() && !peer.addr.is_empty(),
                        "connect entries need identity and addr"
                    );
                }
            },
        }

        Ok(())
    }

    /// The inline node description, when configured that way.
    pub fn node(&self) -> Option<&DiameterNode> {
        match &self.hss.free_diameter {
            FreeDiameter::Inline(node) => Some(node),
            FreeDiameter::ConfPath(_) => None,
        }
    }
}
