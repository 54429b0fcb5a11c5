// src/engine/dispatched.rs

use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::{find_inside, DiscoveryOptions};
use crate::errors::{RepodagError, Result};
use crate::exec::{execute_runner, RunnerInvocation};
use crate::model::TargetId;
use crate::runner::RunnerRegistry;

/// Re-entry point of a toolchain dispatch.
///
/// Locates the component named by the `[dispatch]` slot, rebuilds the
/// runners of the addressed step and runs the addressed one in-process.
pub fn exec_dispatched_runner(
    config: &Config,
    registry: &RunnerRegistry,
    discovery: &DiscoveryOptions,
) -> Result<()> {
    let args = config.dispatch.clone().ok_or_else(|| {
        RepodagError::Assertion("config has no [dispatch] section to execute".to_string())
    })?;

    let component = find_inside(&args.component_dir, discovery)?;
    if component.root != args.component_dir {
        warn!(
            expected = %args.component_dir.display(),
            found = %component.root.display(),
            "dispatched component root differs"
        );
    }

    let target_id = TargetId::parse(&args.target_id).map_err(RepodagError::ConfigError)?;
    if target_id.namespace() != component.name {
        return Err(RepodagError::Assertion(format!(
            "dispatched target '{target_id}' does not belong to component '{}'",
            component.name
        )));
    }
    let target = component.target(target_id.name()).ok_or_else(|| {
        RepodagError::Assertion(format!("component '{}' has no target '{target_id}'", component.name))
    })?;
    let step = target.steps.get(args.step_index).ok_or_else(|| {
        RepodagError::Assertion(format!("target '{target_id}' has no step {}", args.step_index))
    })?;

    let instances = registry.create_for_step(&target.stage, step)?;
    let instance = instances.get(args.runner_index).ok_or_else(|| {
        RepodagError::Assertion(format!(
            "step {} of '{target_id}' has no runner {}",
            args.step_index, args.runner_index
        ))
    })?;
    if let Some(expected) = &args.runner_id {
        if *expected != instance.runner_id {
            return Err(RepodagError::Assertion(format!(
                "dispatched runner ID '{expected}' does not match '{}'",
                instance.runner_id
            )));
        }
    }

    // Never dispatch again from inside the toolchain.
    let mut local = config.clone();
    local.toolchain.skip_dispatch = true;
    local.dispatch = None;

    info!(
        target = %target_id,
        step = args.step_index,
        runner = args.runner_index,
        toolchain = %args.toolchain,
        "executing dispatched runner"
    );
    execute_runner(&RunnerInvocation {
        component: &component,
        target: &target_id,
        step_index: args.step_index,
        runner_index: args.runner_index,
        instance,
        dispatcher: None,
        config: &local,
        repo_root: &local.root_dir,
    })
}
