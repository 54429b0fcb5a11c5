// src/engine/selection.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::{RepodagError, Result};
use crate::model::{Component, TargetId, NAMESPACE_SEPARATOR};

/// Which targets an invocation asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelector {
    /// Target names (matched in every selected component) or full IDs.
    pub targets: Vec<String>,
    /// Only targets of this stage.
    pub stage: Option<String>,
}

impl TargetSelector {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.stage.is_none()
    }

    /// Resolve against the selected components.
    ///
    /// Returns `None` ("every target") when nothing narrows the selection
    /// and all components are selected. Full IDs are passed through
    /// unchecked so the graph can report the ones that do not exist.
    pub fn resolve(
        &self,
        selected: &[Arc<Component>],
        all_selected: bool,
    ) -> Result<Option<Vec<TargetId>>> {
        if self.is_empty() && all_selected {
            return Ok(None);
        }

        let mut ids: Vec<TargetId> = Vec::new();
        let stage_ok = |stage: &str| self.stage.as_deref().is_none_or(|s| s == stage);

        if self.targets.is_empty() {
            for component in selected {
                ids.extend(
                    component
                        .targets
                        .values()
                        .filter(|t| stage_ok(t.stage.as_str()))
                        .map(|t| t.id.clone()),
                );
            }
        } else {
            for wanted in &self.targets {
                if wanted.contains(NAMESPACE_SEPARATOR) {
                    let id = TargetId::parse(wanted).map_err(RepodagError::ConfigError)?;
                    ids.push(id);
                    continue;
                }
                let before = ids.len();
                for component in selected {
                    if let Some(t) = component.target(wanted) {
                        if stage_ok(t.stage.as_str()) {
                            ids.push(t.id.clone());
                        }
                    }
                }
                if ids.len() == before {
                    debug!(target = %wanted, "no selected component defines this target");
                }
            }
        }

        ids.sort();
        ids.dedup();
        Ok(Some(ids))
    }
}
