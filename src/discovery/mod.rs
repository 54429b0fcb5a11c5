// src/discovery/mod.rs

//! Component discovery.
//!
//! Walks a root directory in parallel (one blocking task per directory,
//! collected in a `JoinSet`), parses every descriptor file it finds and
//! initialises the components. Parse and validation errors do not stop the
//! walk; they are combined and returned once it is done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{combine, RepodagError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::git::{GitIgnoreOracle, IgnoreOracle, NoIgnore};
use crate::matcher::GlobFilter;
use crate::model::{
    default_stage_mapper, Component, ComponentDescriptor, InitOptions, StageMapper, StageTable,
};

/// Which discovered components are "selected".
#[derive(Debug, Clone, Default)]
pub enum ComponentFilter {
    #[default]
    All,
    /// Component names matched against include/exclude globs.
    Patterns(GlobFilter),
    /// The component whose root is the closest ancestor of this directory.
    Dir(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Descriptor file name.
    pub descriptor: String,
    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,
    pub stages: StageTable,
    pub stage_mapper: Option<StageMapper>,
    pub output_base: Option<PathBuf>,
    pub filter: ComponentFilter,
    pub fs: Arc<dyn FileSystem>,
    pub ignore: Arc<dyn IgnoreOracle>,
}

impl DiscoveryOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let stages = StageTable::from_config(&cfg.stages);
        let ignore: Arc<dyn IgnoreOracle> = if cfg.discovery.respect_git_ignore {
            Arc::new(GitIgnoreOracle::new(&cfg.root_dir))
        } else {
            Arc::new(NoIgnore)
        };

        Self {
            descriptor: cfg.discovery.descriptor.clone(),
            ignore_dirs: cfg.discovery.ignore_dirs.clone(),
            stage_mapper: Some(default_stage_mapper(&stages)),
            stages,
            output_base: cfg.discovery.output_base.clone(),
            filter: ComponentFilter::All,
            fs: Arc::new(RealFileSystem),
            ignore,
        }
    }

    pub fn with_filter(mut self, filter: ComponentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_ignore_oracle(mut self, ignore: Arc<dyn IgnoreOracle>) -> Self {
        self.ignore = ignore;
        self
    }

    fn init_options(&self) -> InitOptions<'_> {
        InitOptions {
            stages: &self.stages,
            stage_mapper: self.stage_mapper.as_ref(),
            output_base: self.output_base.as_deref(),
        }
    }
}

/// Result of a discovery walk, both sorted by component name.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub selected: Vec<Arc<Component>>,
    pub all: Vec<Arc<Component>>,
}

#[derive(Default)]
struct DirScan {
    subdirs: Vec<PathBuf>,
    component: Option<Result<Component>>,
    error: Option<RepodagError>,
}

/// Walk `root` and return all components plus the subset selected by
/// `opts.filter`.
pub async fn find(root: &Path, opts: &DiscoveryOptions) -> Result<Discovered> {
    let root = opts.fs.canonicalize(root)?;
    info!(root = %root.display(), descriptor = %opts.descriptor, "discovering components");

    let ctx = Arc::new(opts.clone());
    let mut tasks = JoinSet::new();
    spawn_scan(&mut tasks, &ctx, root.clone());

    let mut components = Vec::new();
    let mut errors: Option<RepodagError> = None;

    while let Some(joined) = tasks.join_next().await {
        let scan = match joined {
            Ok(scan) => scan,
            Err(join_err) => {
                let err = anyhow::anyhow!("directory scan task failed: {join_err}");
                errors = Some(combine(errors, err.into()));
                continue;
            }
        };

        for dir in scan.subdirs {
            spawn_scan(&mut tasks, &ctx, dir);
        }
        match scan.component {
            Some(Ok(component)) => components.push(component),
            Some(Err(err)) => errors = Some(combine(errors, err)),
            None => {}
        }
        if let Some(err) = scan.error {
            errors = Some(combine(errors, err));
        }
    }

    components.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.root.cmp(&b.root)));
    for pair in components.windows(2) {
        if pair[0].name == pair[1].name {
            let err = RepodagError::ConfigError(format!(
                "duplicate component name '{}' in {} and {}",
                pair[0].name,
                pair[0].root.display(),
                pair[1].root.display()
            ));
            errors = Some(combine(errors, err));
        }
    }

    if let Some(err) = errors {
        return Err(err);
    }

    let all: Vec<Arc<Component>> = components.into_iter().map(Arc::new).collect();
    let selected = select(&all, &opts.filter, opts.fs.as_ref())?;

    info!(
        total = all.len(),
        selected = selected.len(),
        "component discovery finished"
    );
    Ok(Discovered { selected, all })
}

/// Like [`find`], selecting by glob patterns (`!` excludes); fails when fewer
/// than `min_count` components are selected.
pub async fn find_by_patterns<S: AsRef<str>>(
    root: &Path,
    opts: &DiscoveryOptions,
    patterns: &[S],
    min_count: usize,
) -> Result<Discovered> {
    let filter = GlobFilter::new(patterns)?;
    let opts = opts.clone().with_filter(ComponentFilter::Patterns(filter));
    let found = find(root, &opts).await?;

    if found.selected.len() < min_count {
        let patterns: Vec<&str> = patterns.iter().map(|p| p.as_ref()).collect();
        return Err(RepodagError::ConfigError(format!(
            "expected at least {min_count} component(s) matching [{}], found {}",
            patterns.join(", "),
            found.selected.len()
        )));
    }
    Ok(found)
}

/// The first component found walking upward from `dir`.
pub fn find_inside(dir: &Path, opts: &DiscoveryOptions) -> Result<Component> {
    let start = opts.fs.canonicalize(dir)?;
    for candidate in start.ancestors() {
        let descriptor = candidate.join(&opts.descriptor);
        if opts.fs.is_file(&descriptor) {
            debug!(path = %descriptor.display(), "found enclosing component");
            return load_component(opts, &descriptor);
        }
    }
    Err(RepodagError::ConfigError(format!(
        "no '{}' found in {} or any parent directory",
        opts.descriptor,
        start.display()
    )))
}

fn spawn_scan(tasks: &mut JoinSet<DirScan>, ctx: &Arc<DiscoveryOptions>, dir: PathBuf) {
    let ctx = Arc::clone(ctx);
    tasks.spawn_blocking(move || scan_dir(&ctx, &dir));
}

fn scan_dir(opts: &DiscoveryOptions, dir: &Path) -> DirScan {
    let entries = match opts.fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            return DirScan {
                error: Some(err.context(format!("walking {}", dir.display())).into()),
                ..DirScan::default()
            };
        }
    };

    let mut scan = DirScan::default();
    let mut descriptor = None;

    for entry in entries {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if opts.fs.is_dir(&entry) {
            if opts.ignore_dirs.iter().any(|ignored| *ignored == name) {
                debug!(dir = %entry.display(), "skipping ignored directory");
                continue;
            }
            scan.subdirs.push(entry);
        } else if name == opts.descriptor {
            descriptor = Some(entry);
        }
    }

    if let Some(path) = descriptor {
        if opts.ignore.is_ignored(&path) {
            debug!(path = %path.display(), "descriptor is ignored by git");
        } else {
            scan.component = Some(load_component(opts, &path));
        }
    }
    scan
}

fn load_component(opts: &DiscoveryOptions, path: &Path) -> Result<Component> {
    let descriptor_error = |message: String| RepodagError::DescriptorError {
        path: path.to_path_buf(),
        message,
    };

    let text = opts
        .fs
        .read_to_string(path)
        .map_err(|e| descriptor_error(format!("{e:#}")))?;
    let desc = ComponentDescriptor::from_yaml(&text).map_err(|e| descriptor_error(e.to_string()))?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| descriptor_error("descriptor has no parent directory".to_string()))?;

    match Component::init(desc, root, &opts.init_options()) {
        Ok(component) => Ok(component),
        Err(err) => {
            warn!(path = %path.display(), "component descriptor is invalid");
            Err(err)
        }
    }
}

fn select(
    all: &[Arc<Component>],
    filter: &ComponentFilter,
    fs: &dyn FileSystem,
) -> Result<Vec<Arc<Component>>> {
    let selected = match filter {
        ComponentFilter::All => all.to_vec(),
        ComponentFilter::Patterns(globs) => all
            .iter()
            .filter(|c| globs.matches(&c.name))
            .cloned()
            .collect(),
        ComponentFilter::Dir(dir) => {
            let dir = fs.canonicalize(dir)?;
            all.iter()
                .filter(|c| dir.starts_with(&c.root))
                .max_by_key(|c| c.root.components().count())
                .cloned()
                .into_iter()
                .collect()
        }
    };
    Ok(selected)
}
