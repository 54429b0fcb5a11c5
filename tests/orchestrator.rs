// tests/orchestrator.rs

mod common;
use crate::common::*;

use std::fs;
use std::path::{Path, PathBuf};

use repodag::config::{load_and_validate, save_to_path};
use repodag::discovery::{find_inside, DiscoveryOptions};
use repodag::engine::{ChangeSource, Orchestrator, RunRequest, TargetSelector};
use repodag::errors::RepodagError;
use repodag::toolchain::DispatchArgs;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn shell_component(name: &str, depends: &[&str], log: &Path, cmd_suffix: &str) -> String {
    let depends = depends
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"name: {name}
version: 0.3.1
language: sh
inputs:
  src:
    patterns: ["^src/.*$"]
targets:
  build:
    stage: build
    inputs: [self::src]
    depends: [{depends}]
    steps:
      - runner: shell
        config:
          cmd: echo {name} >> "$RUN_LOG"{cmd_suffix}
          env:
            RUN_LOG: {log}
"#,
        log = log.display()
    )
}

/// `libs/core` and `apps/web` (depending on `core::build`) in a temp repo.
fn repo() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let log = root.join("run.log");

    write(
        &root.join("libs/core/.component.yaml"),
        &shell_component("core", &[], &log, ""),
    );
    write(
        &root.join("apps/web/.component.yaml"),
        &shell_component("web", &["core::build"], &log, ""),
    );
    write(&root.join("apps/web/src/main.sh"), "echo hi\n");
    write(&root.join(".git/hooks/.component.yaml"), "not: [valid");
    (tmp, root, log)
}

fn read_log(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn runs_discovered_components_in_order() -> TestResult {
    init_tracing();
    let (_tmp, root, log) = repo();
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let outcome = orchestrator.run(&RunRequest::default()).await?;
    let priorities = outcome.into_result()?;

    assert_eq!(priorities.len(), 2);
    assert_eq!(read_log(&log), vec!["core".to_string(), "web".to_string()]);
    Ok(())
}

#[tokio::test]
async fn changed_paths_limit_the_run() -> TestResult {
    let (_tmp, root, log) = repo();
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let request = RunRequest {
        changes: ChangeSource::Paths(vec![root.join("apps/web/src/main.sh")]),
        ..RunRequest::default()
    };
    orchestrator.run(&request).await?.into_result()?;

    assert_eq!(read_log(&log), vec!["web".to_string()]);
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    let (_tmp, root, log) = repo();
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).concurrent(2).build())?;

    let outcome = orchestrator
        .run(&RunRequest {
            dry_run: true,
            ..RunRequest::default()
        })
        .await?;

    assert!(outcome.report.is_none());
    let listing = repodag::dag::format_priorities(&outcome.priorities);
    assert_eq!(listing, "priority 1:\n  core::build\npriority 0:\n  web::build\n");
    assert!(read_log(&log).is_empty());
    Ok(())
}

#[tokio::test]
async fn component_filter_keeps_dependencies() -> TestResult {
    let (_tmp, root, log) = repo();
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let request = RunRequest {
        components: vec!["web".to_string()],
        ..RunRequest::default()
    };
    let graph = orchestrator.graph(&request).await?;
    assert_eq!(graph.selected_ids(), vec![&id("web::build")]);
    assert!(graph.contains(&id("core::build")));

    orchestrator.run(&request).await?.into_result()?;
    assert_eq!(read_log(&log), vec!["core".to_string(), "web".to_string()]);
    Ok(())
}

#[tokio::test]
async fn target_and_stage_selectors() -> TestResult {
    let (_tmp, root, _log) = repo();
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let by_stage = RunRequest {
        selector: TargetSelector {
            targets: Vec::new(),
            stage: Some("test".to_string()),
        },
        ..RunRequest::default()
    };
    assert!(orchestrator.run(&by_stage).await?.priorities.is_empty());

    let by_id = RunRequest {
        selector: TargetSelector {
            targets: vec!["core::build".to_string()],
            stage: None,
        },
        dry_run: true,
        ..RunRequest::default()
    };
    let outcome = orchestrator.run(&by_id).await?;
    assert_eq!(outcome.priorities.len(), 1);
    assert_eq!(outcome.priorities[0].nodes, vec![id("core::build")]);

    let unknown = RunRequest {
        selector: TargetSelector {
            targets: vec!["ghost::build".to_string()],
            stage: None,
        },
        ..RunRequest::default()
    };
    let err = orchestrator.run(&unknown).await.unwrap_err();
    assert!(matches!(err, RepodagError::SelectionNotFound(_)), "{err}");
    Ok(())
}

#[tokio::test]
async fn failing_shell_step_fails_the_run() -> TestResult {
    let (_tmp, root, log) = repo();
    write(
        &root.join("libs/core/.component.yaml"),
        &shell_component("core", &[], &log, " && exit 3"),
    );
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let err = orchestrator
        .run(&RunRequest::default())
        .await?
        .into_result()
        .unwrap_err();

    assert!(err.to_string().contains("exited with code 3"), "{err}");
    assert_eq!(read_log(&log), vec!["core".to_string()]);
    Ok(())
}

#[tokio::test]
async fn invalid_descriptors_are_all_reported() -> TestResult {
    let (_tmp, root, _log) = repo();
    write(&root.join("broken/one/.component.yaml"), "name: one\nversion: x\nlanguage: sh\n");
    write(&root.join("broken/two/.component.yaml"), "version: 1.0.0\n");
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let err = orchestrator.discover(&[]).await.unwrap_err();
    let text = err.to_string();
    assert!(err.errors().len() >= 2, "{text}");
    assert!(text.contains("semantic version"), "{text}");
    assert!(text.contains("name"), "{text}");
    Ok(())
}

#[tokio::test]
async fn duplicate_component_names_are_rejected() -> TestResult {
    let (_tmp, root, log) = repo();
    write(
        &root.join("legacy/core/.component.yaml"),
        &shell_component("core", &[], &log, ""),
    );
    let orchestrator = Orchestrator::new(ConfigBuilder::new(&root).build())?;

    let err = orchestrator.discover(&[]).await.unwrap_err();
    assert!(err.to_string().contains("duplicate component name 'core'"), "{err}");
    Ok(())
}

#[test]
fn find_inside_walks_upwards() {
    let (_tmp, root, _log) = repo();
    let opts = DiscoveryOptions::from_config(&ConfigBuilder::new(&root).build());

    let component = find_inside(&root.join("apps/web/src"), &opts).unwrap();
    assert_eq!(component.name, "web");
    assert_eq!(component.root, root.join("apps/web"));
    assert!(find_inside(&root, &opts).is_err());
}

#[test]
fn dispatched_runner_reenters_through_config_file() -> TestResult {
    init_tracing();
    let (_tmp, root, log) = repo();

    let mut config = ConfigBuilder::new(&root).build();
    config.dispatch = Some(DispatchArgs {
        component_dir: root.join("apps/web"),
        target_id: "web::build".to_string(),
        step_index: 0,
        runner_index: 0,
        runner_id: Some("repodag::shell".to_string()),
        toolchain: "none".to_string(),
    });
    let handoff = root.join("handoff.toml");
    save_to_path(&config, &handoff)?;

    let loaded = load_and_validate(&handoff)?;
    assert_eq!(loaded.dispatch, config.dispatch);
    Orchestrator::new(loaded)?.exec_dispatched()?;

    assert_eq!(read_log(&log), vec!["web".to_string()]);
    Ok(())
}

#[test]
fn dispatched_runner_finds_target_with_qualified_key() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;
    let log = root.join("run.log");
    write(
        &root.join("apps/web/.component.yaml"),
        &format!(
            r#"name: web
version: 0.3.1
language: sh
targets:
  "pkg::build":
    stage: build
    steps:
      - runner: shell
        config:
          cmd: echo pkg >> "$RUN_LOG"
          env:
            RUN_LOG: {}
"#,
            log.display()
        ),
    );

    let mut config = ConfigBuilder::new(&root).build();
    config.dispatch = Some(DispatchArgs {
        component_dir: root.join("apps/web"),
        target_id: "web::pkg-build".to_string(),
        step_index: 0,
        runner_index: 0,
        runner_id: Some("repodag::shell".to_string()),
        toolchain: "none".to_string(),
    });
    let handoff = root.join("handoff.toml");
    save_to_path(&config, &handoff)?;

    Orchestrator::new(load_and_validate(&handoff)?)?.exec_dispatched()?;

    assert_eq!(read_log(&log), vec!["pkg".to_string()]);
    Ok(())
}

#[test]
fn dispatched_runner_checks_runner_id() -> TestResult {
    let (_tmp, root, log) = repo();
    let mut config = ConfigBuilder::new(&root).build();
    config.dispatch = Some(DispatchArgs {
        component_dir: root.join("apps/web"),
        target_id: "web::build".to_string(),
        step_index: 0,
        runner_index: 0,
        runner_id: Some("other::runner".to_string()),
        toolchain: "none".to_string(),
    });

    let err = Orchestrator::new(config)?.exec_dispatched().unwrap_err();
    assert!(matches!(err, RepodagError::Assertion(_)), "{err}");
    assert!(read_log(&log).is_empty());
    Ok(())
}
