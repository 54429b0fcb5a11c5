// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{Config, RawConfig};
use crate::errors::{RepodagError, Result};
use crate::model::TargetId;

impl TryFrom<RawConfig> for Config {
    type Error = crate::errors::RepodagError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_stages(cfg)?;
    validate_discovery(cfg)?;
    validate_execution(cfg)?;
    validate_dispatch_slot(cfg)?;
    Ok(())
}

fn validate_stages(cfg: &RawConfig) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(RepodagError::ConfigError(
            "at least one [[stages]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    let mut priorities = HashSet::new();
    for stage in cfg.stages.iter() {
        if stage.name.trim().is_empty() {
            return Err(RepodagError::ConfigError(
                "stage names must not be empty".to_string(),
            ));
        }
        if !names.insert(stage.name.as_str()) {
            return Err(RepodagError::ConfigError(format!(
                "stage '{}' is defined more than once",
                stage.name
            )));
        }
        if !priorities.insert(stage.priority) {
            return Err(RepodagError::ConfigError(format!(
                "stage '{}' reuses priority {}; stage priorities must be distinct",
                stage.name, stage.priority
            )));
        }
    }
    Ok(())
}

fn validate_discovery(cfg: &RawConfig) -> Result<()> {
    let descriptor = cfg.discovery.descriptor.trim();
    if descriptor.is_empty() || descriptor.contains('/') {
        return Err(RepodagError::ConfigError(format!(
            "[discovery].descriptor must be a plain file name (got '{}')",
            cfg.discovery.descriptor
        )));
    }
    Ok(())
}

fn validate_execution(cfg: &RawConfig) -> Result<()> {
    if cfg.execution.max_parallel == 0 {
        return Err(RepodagError::ConfigError(
            "[execution].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_dispatch_slot(cfg: &RawConfig) -> Result<()> {
    let Some(args) = &cfg.dispatch else {
        return Ok(());
    };

    if !args.component_dir.is_absolute() {
        return Err(RepodagError::ConfigError(format!(
            "[dispatch].componentDir must be absolute (got '{}')",
            args.component_dir.display()
        )));
    }
    TargetId::parse(&args.target_id)
        .map_err(|e| RepodagError::ConfigError(format!("[dispatch].targetID: {e}")))?;
    if args.toolchain.trim().is_empty() {
        return Err(RepodagError::ConfigError(
            "[dispatch].toolchain must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::StageConfig;

    #[test]
    fn duplicate_stage_names_are_rejected() {
        let mut raw = RawConfig::default();
        raw.stages.push(StageConfig::new("build", 9));

        let err = Config::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn duplicate_stage_priorities_are_rejected() {
        let mut raw = RawConfig::default();
        raw.stages.push(StageConfig::new("package", 1));

        let err = Config::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut raw = RawConfig::default();
        raw.execution.max_parallel = 0;
        assert!(Config::try_from(raw).is_err());
    }
}
