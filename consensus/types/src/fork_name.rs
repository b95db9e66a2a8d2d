use crate::{ChainSpec, Epoch};
use std::fmt;
use std::str::FromStr;

/// The name of a beacon chain fork version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForkName {
    Base,
    Altair,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        vec![ForkName::Base, ForkName::Altair]
    }

    /// Set the activation epochs in the given `ChainSpec` so that the fork named by `self`
    /// is the only fork in effect from genesis.
    pub fn make_genesis_spec(&self, mut spec: ChainSpec) -> ChainSpec {
        match self {
            ForkName::Base => {
                spec.altair_fork_epoch = None;
                spec
            }
            ForkName::Altair => {
                spec.altair_fork_epoch = Some(Epoch::new(0));
                spec
            }
        }
    }

    /// Return the fork immediately preceding `self`, if any.
    pub fn previous_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => None,
            ForkName::Altair => Some(ForkName::Base),
        }
    }

    /// Return the fork immediately following `self`, if any.
    pub fn next_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => Some(ForkName::Altair),
            ForkName::Altair => None,
        }
    }
}

impl FromStr for ForkName {
    type Err = ();

    fn from_str(fork_name: &str) -> Result<Self, ()> {
        Ok(match fork_name.to_lowercase().as_ref() {
            "phase0" | "base" => ForkName::Base,
            "altair" => ForkName::Altair,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Altair => "altair".fmt(f),
        }
    }
}

/// The fork of a `BeaconState` object does not match the fork dictated by the slot and the
/// `ChainSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InconsistentFork {
    pub fork_at_slot: ForkName,
    pub object_fork: ForkName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_and_next_fork_consistent() {
        for fork in ForkName::list_all() {
            if let Some(previous) = fork.previous_fork() {
                assert_eq!(previous.next_fork(), Some(fork));
            }
            if let Some(next) = fork.next_fork() {
                assert_eq!(next.previous_fork(), Some(fork));
            }
        }
    }

    #[test]
    fn fork_name_from_str() {
        assert_eq!("phase0".parse::<ForkName>(), Ok(ForkName::Base));
        assert_eq!("altair".parse::<ForkName>(), Ok(ForkName::Altair));
        assert_eq!("bellatrix".parse::<ForkName>(), Err(()));
    }
}
