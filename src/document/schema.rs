//! Known chain-spec layouts and pallet key names.
//!
//! The node's `build-spec` output moved the runtime genesis around between
//! releases, and several pallets were renamed in the JSON. Instead of probing
//! ad hoc at each call site, every supported variant is listed here in
//! priority order.

use serde_json::Value;

/// Where the runtime genesis lives inside a plain spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `genesis.runtime` (pre `RuntimeGenesisConfig` builder).
    Legacy,
    /// `genesis.runtimeGenesis.patch` (genesis presets / patch-based specs).
    RuntimeGenesisPatch,
    /// `genesis.runtimeGenesis.config` (full config embedded next to the code blob).
    RuntimeGenesisConfig,
}

/// Probe order for `Layout::detect`.
pub const LAYOUTS: &[Layout] = &[
    Layout::Legacy,
    Layout::RuntimeGenesisPatch,
    Layout::RuntimeGenesisConfig,
];

impl Layout {
    pub fn root(self) -> &'static [&'static str] {
        match self {
            Layout::Legacy => &["genesis", "runtime"],
            Layout::RuntimeGenesisPatch => &["genesis", "runtimeGenesis", "patch"],
            Layout::RuntimeGenesisConfig => &["genesis", "runtimeGenesis", "config"],
        }
    }

    /// First layout whose root object exists in `doc`.
    pub fn detect(doc: &Value) -> Option<Layout> {
        LAYOUTS.iter().copied().find(|layout| {
            let mut cur = doc;
            for key in layout.root() {
                match cur.get(*key) {
                    Some(next) => cur = next,
                    None => return false,
                }
            }
            cur.is_object()
        })
    }

    /// Rendered alternatives, used in error messages when nothing matched.
    pub fn describe_all() -> String {
        let alts: Vec<String> = LAYOUTS.iter().map(|l| l.root().join(".")).collect();
        format!("({})", alts.join("|"))
    }
}

/// Pallets whose genesis key has been seen under more than one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pallet {
    Balances,
    Configuration,
    ParachainInfo,
    Sudo,
    Session,
    Staking,
    Council,
    TechnicalCommittee,
}

pub const PALLETS: &[Pallet] = &[
    Pallet::Balances,
    Pallet::Configuration,
    Pallet::ParachainInfo,
    Pallet::Sudo,
    Pallet::Session,
    Pallet::Staking,
    Pallet::Council,
    Pallet::TechnicalCommittee,
];

impl Pallet {
    /// Candidate key names, highest priority first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Pallet::Balances => &["balances", "palletBalances"],
            Pallet::Configuration => &["configuration", "parachainsConfiguration"],
            Pallet::ParachainInfo => &["parachainInfo", "parachainInfoPallet"],
            Pallet::Sudo => &["sudo", "palletSudo"],
            Pallet::Session => &["session", "palletSession"],
            Pallet::Staking => &["staking", "parachainStaking"],
            Pallet::Council => &["council", "councilCollective"],
            Pallet::TechnicalCommittee => &["technicalCommittee", "technicalCommitteeCollective"],
        }
    }

    /// Look a pallet up by any of its aliases.
    pub fn from_alias(name: &str) -> Option<Pallet> {
        PALLETS
            .iter()
            .copied()
            .find(|p| p.aliases().contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn detects_each_layout() {
        let legacy = json!({"genesis": {"runtime": {"system": {}}}});
        let patch = json!({"genesis": {"runtimeGenesis": {"code": "0x00", "patch": {}}}});
        let config = json!({"genesis": {"runtimeGenesis": {"code": "0x00", "config": {}}}});

        assert_eq!(Layout::detect(&legacy), Some(Layout::Legacy));
        assert_eq!(Layout::detect(&patch), Some(Layout::RuntimeGenesisPatch));
        assert_eq!(Layout::detect(&config), Some(Layout::RuntimeGenesisConfig));
    }

    #[test]
    fn raw_spec_has_no_layout() {
        let raw = json!({"genesis": {"raw": {"top": {}}}});
        assert_eq!(Layout::detect(&raw), None);
        // A non-object root does not count.
        let odd = json!({"genesis": {"runtime": "0x00"}});
        assert_eq!(Layout::detect(&odd), None);
    }

    #[test]
    fn legacy_wins_when_both_present() {
        let both = json!({"genesis": {"runtime": {}, "runtimeGenesis": {"patch": {}}}});
        assert_eq!(Layout::detect(&both), Some(Layout::Legacy));
    }

    #[test]
    fn aliases_are_unique_across_pallets() {
        let mut seen = std::collections::BTreeSet::new();
        for pallet in PALLETS {
            for alias in pallet.aliases() {
                assert!(seen.insert(*alias), "alias {} listed twice", alias);
            }
            assert_eq!(Pallet::from_alias(pallet.aliases()[0]), Some(*pallet));
        }
        assert_eq!(Pallet::from_alias("parachainsConfiguration"), Some(Pallet::Configuration));
        assert_eq!(Pallet::from_alias("system"), None);
    }

    #[test]
    fn describe_lists_all_roots() {
        assert_eq!(
            Layout::describe_all(),
            "(genesis.runtime|genesis.runtimeGenesis.patch|genesis.runtimeGenesis.config)"
        );
    }
}
