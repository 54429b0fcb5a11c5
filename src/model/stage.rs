// src/model/stage.rs

use std::fmt;
use std::sync::Arc;

use crate::config::StageConfig;

/// A named phase with a global priority; lower runs earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub priority: i32,
}

/// The global stage table, sorted by priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    stages: Vec<Stage>,
}

impl StageTable {
    /// Build from validated `[[stages]]` entries.
    pub fn from_config(stages: &[StageConfig]) -> Self {
        let mut stages: Vec<Stage> = stages
            .iter()
            .map(|s| Stage {
                name: s.name.clone(),
                priority: s.priority,
            })
            .collect();
        stages.sort_by_key(|s| s.priority);
        Self { stages }
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn priority_of(&self, name: &str) -> Option<i32> {
        self.get(name).map(|s| s.priority)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for StageTable {
    fn default() -> Self {
        StageTable::from_config(&crate::config::model::default_stages())
    }
}

/// Maps a target name to a stage name when the descriptor omits `stage`.
#[derive(Clone)]
pub struct StageMapper(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>);

impl StageMapper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn map(&self, target_name: &str) -> Option<String> {
        (self.0)(target_name)
    }
}

impl fmt::Debug for StageMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StageMapper(..)")
    }
}

/// Match a target name against the stage names of `table`.
///
/// `build`, `lib-build`, `lib_build` and `libbuild` all map to `build`. When
/// several stages match, the longest stage name wins.
pub fn default_stage_mapper(table: &StageTable) -> StageMapper {
    let names: Vec<String> = table.iter().map(|s| s.name.clone()).collect();

    StageMapper::new(move |target| {
        names
            .iter()
            .filter(|stage| target == stage.as_str() || target.ends_with(stage.as_str()))
            .max_by_key(|stage| stage.len())
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_by_priority() {
        let table = StageTable::from_config(&[
            StageConfig::new("test", 5),
            StageConfig::new("build", 1),
        ]);
        assert_eq!(table.names(), vec!["build", "test"]);
        assert_eq!(table.priority_of("test"), Some(5));
        assert_eq!(table.priority_of("deploy"), None);
    }

    #[test]
    fn default_mapper_matches_suffixes() {
        let table = StageTable::default();
        let mapper = default_stage_mapper(&table);

        assert_eq!(mapper.map("build").as_deref(), Some("build"));
        assert_eq!(mapper.map("lib-build").as_deref(), Some("build"));
        assert_eq!(mapper.map("unit_test").as_deref(), Some("test"));
        assert_eq!(mapper.map("golint").as_deref(), Some("lint"));
        assert_eq!(mapper.map("package"), None);
    }

    #[test]
    fn longest_stage_name_wins() {
        let table = StageTable::from_config(&[
            StageConfig::new("test", 0),
            StageConfig::new("smoke-test", 1),
        ]);
        let mapper = default_stage_mapper(&table);
        assert_eq!(mapper.map("run-smoke-test").as_deref(), Some("smoke-test"));
    }
}
