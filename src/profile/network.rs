//! Built-in network catalogue.
//!
//! Only the identity of each network lives here: which chain template to
//! start from and where the compiled spec goes. Accounts, keys and
//! parameters come from the profile file.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Network {
    /// KILT on Westend.
    #[value(alias = "westend")]
    Wilt,
    Spiritnet,
    Peregrine,
    PeregrineRelay,
    PeregrineStg,
    PeregrineRelayStg,
    PeregrineDev,
    PeregrineRelayDev,
}

/// How a network's spec is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// `build-spec --raw` straight from a chain template the node ships.
    Native,
    /// Exported plain, patched from the profile, then compiled. The plain
    /// file keeps this name inside the run's work dir.
    Patched { plain_file: &'static str },
}

/// Per-network defaults a profile may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkDefaults {
    pub kind: NetworkKind,
    pub chain: &'static str,
    pub runtime: Option<&'static str>,
    pub output: &'static str,
}

pub const ALL: &[Network] = &[
    Network::Wilt,
    Network::Spiritnet,
    Network::Peregrine,
    Network::PeregrineRelay,
    Network::PeregrineStg,
    Network::PeregrineRelayStg,
    Network::PeregrineDev,
    Network::PeregrineRelayDev,
];

const RELAY_CHAIN: &str = "westend-local";

impl Network {
    /// Name used on the command line and as the key in the profile file.
    pub fn key(self) -> &'static str {
        match self {
            Network::Wilt => "wilt",
            Network::Spiritnet => "spiritnet",
            Network::Peregrine => "peregrine",
            Network::PeregrineRelay => "peregrine-relay",
            Network::PeregrineStg => "peregrine-stg",
            Network::PeregrineRelayStg => "peregrine-relay-stg",
            Network::PeregrineDev => "peregrine-dev",
            Network::PeregrineRelayDev => "peregrine-relay-dev",
        }
    }

    pub fn from_key(key: &str) -> Option<Network> {
        ALL.iter().copied().find(|n| n.key() == key)
    }

    pub fn defaults(self) -> NetworkDefaults {
        let patched = |plain_file| NetworkKind::Patched { plain_file };
        match self {
            Network::Wilt => NetworkDefaults {
                kind: NetworkKind::Native,
                chain: "wilt-new",
                runtime: Some("spiritnet"),
                output: "dev-specs/kilt-parachain/kilt-westend.json",
            },
            Network::Spiritnet => NetworkDefaults {
                kind: NetworkKind::Native,
                chain: "spiritnet-new",
                runtime: Some("spiritnet"),
                output: "nodes/parachain/res/spiritnet.json",
            },
            Network::Peregrine => NetworkDefaults {
                kind: patched("peregrine_kilt.plain.json"),
                chain: "dev",
                runtime: Some("peregrine"),
                output: "dev-specs/kilt-parachain/peregrine-kilt.json",
            },
            Network::PeregrineRelay => NetworkDefaults {
                kind: patched("peregrine_relay.plain.json"),
                chain: RELAY_CHAIN,
                runtime: None,
                output: "dev-specs/kilt-parachain/peregrine-relay.json",
            },
            Network::PeregrineStg => NetworkDefaults {
                kind: patched("peregrine_stg.plain.json"),
                chain: "dev",
                runtime: Some("peregrine"),
                output: "dev-specs/kilt-parachain/peregrine-stg-kilt.json",
            },
            Network::PeregrineRelayStg => NetworkDefaults {
                kind: patched("peregrine_stg_relay.plain.json"),
                chain: RELAY_CHAIN,
                runtime: None,
                output: "dev-specs/kilt-parachain/peregrine-stg-relay.json",
            },
            Network::PeregrineDev => NetworkDefaults {
                kind: patched("peregrine_dev_kilt.plain.json"),
                chain: "dev",
                runtime: Some("peregrine"),
                output: "dev-specs/kilt-parachain/peregrine-dev-kilt.json",
            },
            Network::PeregrineRelayDev => NetworkDefaults {
                kind: patched("peregrine_dev_relay.plain.json"),
                chain: RELAY_CHAIN,
                runtime: None,
                output: "dev-specs/kilt-parachain/peregrine-dev-relay.json",
            },
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
