use crate::beacon_state::Error;
use crate::{ChainSpec, Epoch, Validator};
use safe_arith::SafeArith;
use std::collections::HashMap;

/// Map from exit epoch to the number of validators with that exit epoch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExitCache {
    initialized: bool,
    max_exit_epoch: Option<Epoch>,
    exit_epoch_counts: HashMap<Epoch, u64>,
}

impl ExitCache {
    /// Initialize a new cache for the given list of validators.
    pub fn new(validators: &[Validator], spec: &ChainSpec) -> Result<Self, Error> {
        let mut exit_cache = ExitCache {
            initialized: true,
            ..ExitCache::default()
        };

        // Add all validators with a non-default exit epoch to the cache.
        validators
            .iter()
            .filter(|validator| validator.exit_epoch != spec.far_future_epoch)
            .try_for_each(|validator| exit_cache.record_validator_exit(validator.exit_epoch))?;

        Ok(exit_cache)
    }

    /// Check that the cache is initialized and return an error if it is not.
    pub fn check_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::ExitCacheUninitialized)
        }
    }

    /// Record the exit of a single validator in the cache.
    pub fn record_validator_exit(&mut self, exit_epoch: Epoch) -> Result<(), Error> {
        self.check_initialized()?;

        self.exit_epoch_counts
            .entry(exit_epoch)
            .or_insert(0)
            .safe_add_assign(1)?;

        if self.max_exit_epoch.map_or(true, |max| exit_epoch > max) {
            self.max_exit_epoch = Some(exit_epoch);
        }

        Ok(())
    }

    /// Get the largest exit epoch with a recorded exit, if any.
    pub fn max_epoch(&self) -> Result<Option<Epoch>, Error> {
        self.check_initialized()?;
        Ok(self.max_exit_epoch)
    }

    /// Get number of validators with the given exit epoch.
    pub fn get_churn_at(&self, exit_epoch: Epoch) -> Result<u64, Error> {
        self.check_initialized()?;
        Ok(self
            .exit_epoch_counts
            .get(&exit_epoch)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_cache_refuses_queries() {
        let cache = ExitCache::default();
        assert_eq!(cache.max_epoch(), Err(Error::ExitCacheUninitialized));
        assert_eq!(
            cache.get_churn_at(Epoch::new(0)),
            Err(Error::ExitCacheUninitialized)
        );
    }

    #[test]
    fn tracks_max_epoch_and_churn() {
        let spec = ChainSpec::minimal();

        let exited = |epoch: u64| Validator {
            exit_epoch: Epoch::new(epoch),
            ..Validator::default()
        };
        let validators = vec![exited(5), exited(5), exited(7), Validator::default()];

        let mut cache = ExitCache::new(&validators, &spec).unwrap();
        assert_eq!(cache.max_epoch().unwrap(), Some(Epoch::new(7)));
        assert_eq!(cache.get_churn_at(Epoch::new(5)).unwrap(), 2);
        assert_eq!(cache.get_churn_at(Epoch::new(7)).unwrap(), 1);
        assert_eq!(cache.get_churn_at(Epoch::new(6)).unwrap(), 0);

        cache.record_validator_exit(Epoch::new(8)).unwrap();
        assert_eq!(cache.max_epoch().unwrap(), Some(Epoch::new(8)));
        assert_eq!(cache.get_churn_at(Epoch::new(8)).unwrap(), 1);
    }
}
