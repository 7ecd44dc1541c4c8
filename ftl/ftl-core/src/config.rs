//! Bring-up configuration (§6, modelled on the reference driver's
//! `kernel_params` bundle).

use ftl_geometry::Geometry;

/// Default path for the ABM snapshot file when none is supplied.
pub const DEFAULT_ABM_PATH: &str = "ftl.abm.snapshot";

/// Logical-to-physical translation granularity (§6). Only `Page` is
/// implemented; `Config::validate` rejects every other variant explicitly
/// rather than silently behaving as page-level (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingPolicy {
    None,
    Block,
    Page,
    Dftl,
    Segment,
}

/// Victim-selection strategy for garbage collection (§6). Only `Greedy` is
/// implemented (§4.5); `Config::validate` rejects every other variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPolicy {
    Merge,
    Random,
    Greedy,
    CostBenefit,
}

/// Whether TRIM requests release a block's remaining live pages early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trim {
    Enable,
    Disable,
}

/// Whether `store`/`load` perform any I/O at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("mapping policy is fixed at page-level")]
    UnsupportedMappingPolicy,
    #[error("gc policy is fixed at greedy victim selection")]
    UnsupportedGcPolicy,
}

/// Bring-up configuration for one [`crate::Ftl`] instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub geometry: Geometry,
    pub mapping_policy: MappingPolicy,
    pub gc_policy: GcPolicy,
    pub trim: Trim,
    pub snapshot: Snapshot,
    pub abm_path: String,
}

impl Config {
    /// Defaults: page mapping, greedy GC, TRIM enabled, snapshots enabled,
    /// the ABM path defaulted to [`DEFAULT_ABM_PATH`].
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            mapping_policy: MappingPolicy::Page,
            gc_policy: GcPolicy::Greedy,
            trim: Trim::Enable,
            snapshot: Snapshot::Enable,
            abm_path: String::from(DEFAULT_ABM_PATH),
        }
    }

    /// Validates the policy fields this core actually implements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mapping_policy != MappingPolicy::Page {
            return Err(ConfigError::UnsupportedMappingPolicy);
        }
        if self.gc_policy != GcPolicy::Greedy {
            return Err(ConfigError::UnsupportedGcPolicy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let g = Geometry::new(1, 1, 4, 4, 4096, 128).unwrap();
        assert!(Config::new(g).validate().is_ok());
    }

    #[test]
    fn non_page_mapping_policy_is_rejected() {
        let g = Geometry::new(1, 1, 4, 4, 4096, 128).unwrap();
        let mut config = Config::new(g);
        config.mapping_policy = MappingPolicy::Segment;
        assert_eq!(config.validate(), Err(ConfigError::UnsupportedMappingPolicy));
    }

    #[test]
    fn non_greedy_gc_policy_is_rejected() {
        let g = Geometry::new(1, 1, 4, 4, 4096, 128).unwrap();
        let mut config = Config::new(g);
        config.gc_policy = GcPolicy::CostBenefit;
        assert_eq!(config.validate(), Err(ConfigError::UnsupportedGcPolicy));
    }
}
