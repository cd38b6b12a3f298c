//! Network profiles (profiles.json): the per-network data to patch in.
//!
//! JSON shape:
//! {
//!   "networks": {
//!     "peregrine-stg": {
//!       "name": "KILT Peregrine Stagenet",     // top-level chain metadata
//!       "id": "peregrine_stg",
//!       "chain_type": "Live",
//!       "boot_nodes": ["/dns4/.../tcp/30333/p2p/12D3KooW..."],
//!       "para_id": 2086,
//!       "balances": [["4r1WkS3t8...", 10000000000000000000000000000]],
//!       "sudo": "4r1WkS3t8...",
//!       "session_keys": [["acc", "acc", {"aura": "..."}]],
//!       "staking": {"maxCollatorCandidateStake": 200000},   // merged
//!       "configuration": {"max_code_size": 5242880},      // merged into config
//!       "extra": [{"path": [...], "op": "set", "value": ...}]
//!     }
//!   }
//! }
//!
//! Every field is optional. Chain template, runtime, plain file name and
//! output path default to the built-in catalogue (`network.rs`).

pub mod network;

pub use network::{Network, NetworkKind};

use crate::document::{KeyPath, Pallet};
use crate::error::{Error, Result};
use crate::patch::{Assignment, PatchSet};
use crate::pipeline::{ChainTarget, Mode, PipelineConfig};

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `/ip4|ip6|dns|dns4|dns6/<host>/tcp/<port>[/ws|/wss]/p2p/<peer id>`
const BOOT_NODE_RE: &str = r"^/(ip4|ip6|dns|dns4|dns6)/[^/]+/tcp/\d{1,5}(/wss?)?/p2p/[1-9A-HJ-NP-Za-km-z]+$";

const CHAIN_TYPES: &[&str] = &["Development", "Local", "Live"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFile {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkProfile>,
}

/// Raw profile shape as it appears in profiles.json.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkProfile {
    // Tool invocation overrides.
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub plain_file: Option<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub disable_default_bootnode: Option<bool>,

    // Top-level chain metadata.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub chain_type: Option<String>,
    #[serde(default)]
    pub boot_nodes: Option<Vec<String>>,
    #[serde(default)]
    pub protocol_id: Option<String>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub relay_chain: Option<String>,
    #[serde(default)]
    pub para_id: Option<u32>,

    // Runtime genesis.
    #[serde(default)]
    pub balances: Vec<(String, Number)>,
    #[serde(default)]
    pub replace_balances: bool,
    #[serde(default)]
    pub sudo: Option<String>,
    #[serde(default)]
    pub session_keys: Option<Vec<Value>>,
    #[serde(default)]
    pub staking: Option<Map<String, Value>>,
    #[serde(default)]
    pub configuration: Option<Map<String, Value>>,
    #[serde(default)]
    pub council: Option<Vec<String>>,
    #[serde(default)]
    pub technical_committee: Option<Vec<String>>,

    /// Applied last, in order.
    #[serde(default)]
    pub extra: Vec<Assignment>,
}

impl ProfileFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read(path).map_err(|e| Error::io(format!("read profile file {}", path.display()), e))?;
        let file: ProfileFile = serde_json::from_slice(&text).map_err(|source| Error::Parse {
            context: format!("profile file {}", path.display()),
            source,
        })?;

        for key in file.networks.keys() {
            if Network::from_key(key).is_none() {
                let known: Vec<&str> = network::ALL.iter().map(|n| n.key()).collect();
                return Err(Error::InvalidProfile(format!(
                    "unknown network '{}' in {} (known: {})",
                    key,
                    path.display(),
                    known.join(", ")
                )));
            }
        }
        Ok(file)
    }

    pub fn get(&self, network: Network) -> Option<&NetworkProfile> {
        self.networks.get(network.key())
    }

    /// Validate the profile for `network` and turn it into a pipeline config.
    pub fn validate_and_build(&self, network: Network) -> Result<PipelineConfig> {
        let profile = self
            .get(network)
            .ok_or_else(|| Error::InvalidProfile(format!("no profile for network '{}'", network)))?;
        profile.validate_and_build(network)
    }
}

impl NetworkProfile {
    /// Check field formats, then build the pipeline config.
    ///
    /// Validation runs before anything is fetched so a typo in the profile
    /// does not cost a slow `build-spec` round trip.
    pub fn validate_and_build(&self, network: Network) -> Result<PipelineConfig> {
        self.validate(network)?;

        let defaults = network.defaults();
        let native = defaults.kind == NetworkKind::Native;
        let patch = self.patch_set();
        if native && (!patch.is_empty() || self.plain_file.is_some()) {
            return Err(Error::InvalidProfile(format!(
                "{}: native networks are exported as the node ships them; only chain, runtime, output and disable_default_bootnode apply",
                network
            )));
        }

        let target = ChainTarget {
            chain: self.chain.clone().unwrap_or_else(|| defaults.chain.to_string()),
            runtime: self
                .runtime
                .clone()
                .or_else(|| defaults.runtime.map(str::to_string)),
            disable_default_bootnode: self.disable_default_bootnode.unwrap_or(!native),
        };

        let mode = match defaults.kind {
            NetworkKind::Native => Mode::Native,
            NetworkKind::Patched { plain_file } => Mode::Patched {
                plain_file: self.plain_file.clone().unwrap_or_else(|| plain_file.to_string()),
                patch,
            },
        };

        Ok(PipelineConfig {
            target,
            output: self
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(defaults.output)),
            mode,
        })
    }

    fn validate(&self, network: Network) -> Result<()> {
        let invalid = |msg: String| Error::InvalidProfile(format!("{}: {}", network, msg));

        let boot_node_re = Regex::new(BOOT_NODE_RE).map_err(|e| invalid(e.to_string()))?;
        let amount_re = Regex::new(r"^\d+$").map_err(|e| invalid(e.to_string()))?;

        for node in self.boot_nodes.iter().flatten() {
            if !boot_node_re.is_match(node) {
                return Err(invalid(format!("malformed boot node address {:?}", node)));
            }
        }

        if let Some(chain_type) = &self.chain_type {
            if !CHAIN_TYPES.contains(&chain_type.as_str()) {
                return Err(invalid(format!(
                    "chain_type must be one of {}, got {:?}",
                    CHAIN_TYPES.join("/"),
                    chain_type
                )));
            }
        }

        for (idx, (account, amount)) in self.balances.iter().enumerate() {
            if account.trim().is_empty() {
                return Err(invalid(format!("balances[{}] has an empty account", idx)));
            }
            if !amount_re.is_match(&amount.to_string()) {
                return Err(invalid(format!(
                    "balances[{}] amount must be a non-negative integer, got {}",
                    idx, amount
                )));
            }
        }

        if let Some(sudo) = &self.sudo {
            if sudo.trim().is_empty() {
                return Err(invalid("sudo key is empty".to_string()));
            }
        }

        let account = |v: &Value| v.as_str().is_some_and(|s| !s.trim().is_empty());
        for (idx, entry) in self.session_keys.iter().flatten().enumerate() {
            let ok = entry
                .as_array()
                .is_some_and(|e| e.len() == 3 && account(&e[0]) && account(&e[1]) && e[2].is_object());
            if !ok {
                return Err(invalid(format!(
                    "session_keys[{}] must be [account, validator, {{keys}}] with non-empty addresses",
                    idx
                )));
            }
        }

        Ok(())
    }

    /// Build the patch set. Order matters only where two entries hit the same
    /// path; `extra` always comes last so it can override anything.
    ///
    /// Collective members are optional: runtimes without the pallet skip them
    /// with a warning.
    pub fn patch_set(&self) -> PatchSet {
        let mut patch = PatchSet::new();

        let top_level: [(&str, Option<Value>); 6] = [
            ("name", self.name.clone().map(Value::String)),
            ("id", self.id.clone().map(Value::String)),
            ("chainType", self.chain_type.clone().map(Value::String)),
            (
                "bootNodes",
                self.boot_nodes
                    .clone()
                    .map(|b| Value::Array(b.into_iter().map(Value::String).collect())),
            ),
            ("protocolId", self.protocol_id.clone().map(Value::String)),
            ("properties", self.properties.clone().map(Value::Object)),
        ];
        for (key, value) in top_level {
            if let Some(value) = value {
                patch = patch.set(KeyPath::root().key(key), value);
            }
        }

        if let Some(relay) = &self.relay_chain {
            patch = patch.set(
                KeyPath::root().any_of(&["relay_chain", "relayChain"]),
                Value::String(relay.clone()),
            );
        }

        if let Some(para_id) = self.para_id {
            patch = patch
                .set(KeyPath::root().any_of(&["para_id", "paraId"]), Value::from(para_id))
                .set(
                    KeyPath::pallet(Pallet::ParachainInfo).any_of(&["parachainId", "parachain_id"]),
                    Value::from(para_id),
                );
        }

        if !self.balances.is_empty() || self.replace_balances {
            let entries: Vec<Value> = self
                .balances
                .iter()
                .map(|(account, amount)| {
                    Value::Array(vec![Value::String(account.clone()), Value::Number(amount.clone())])
                })
                .collect();
            let path = KeyPath::pallet(Pallet::Balances).key("balances");
            patch = if self.replace_balances {
                patch.set(path, Value::Array(entries))
            } else {
                patch.append(path, entries).or_default(Value::Array(Vec::new()))
            };
        }

        if let Some(keys) = &self.session_keys {
            patch = patch.set(KeyPath::pallet(Pallet::Session).key("keys"), Value::Array(keys.clone()));
        }

        if let Some(sudo) = &self.sudo {
            patch = patch.set(KeyPath::pallet(Pallet::Sudo).key("key"), Value::String(sudo.clone()));
        }

        if let Some(staking) = &self.staking {
            patch = patch.merge(KeyPath::pallet(Pallet::Staking), staking.clone());
        }

        if let Some(configuration) = &self.configuration {
            patch = patch.merge(
                KeyPath::pallet(Pallet::Configuration).key("config"),
                configuration.clone(),
            );
        }

        for (pallet, members) in [
            (Pallet::Council, &self.council),
            (Pallet::TechnicalCommittee, &self.technical_committee),
        ] {
            if let Some(members) = members {
                patch = patch
                    .set(
                        KeyPath::pallet(pallet).key("members"),
                        Value::Array(members.iter().cloned().map(Value::String).collect()),
                    )
                    .optional();
            }
        }

        patch.extend(self.extra.iter().cloned());
        patch
    }
}
