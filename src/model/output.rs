// src/model/output.rs

use std::path::{Path, PathBuf};

/// Name of the output directory, below a component root or an output base.
pub const OUTPUT_DIR_NAME: &str = ".output";

/// Output directory layout of one component.
///
/// ```text
/// <output>/
///   build/{bin,share,docs}
///   package/
///   coverage/{data,bin}
///   image/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// `<component_root>/.output`, or `<base>/.output/<component>` when a
    /// global output base is configured.
    pub fn new(component_root: &Path, component_name: &str, output_base: Option<&Path>) -> Self {
        let root = match output_base {
            Some(base) => base.join(OUTPUT_DIR_NAME).join(component_name),
            None => component_root.join(OUTPUT_DIR_NAME),
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn build_bin_dir(&self) -> PathBuf {
        self.build_dir().join("bin")
    }

    pub fn build_share_dir(&self) -> PathBuf {
        self.build_dir().join("share")
    }

    pub fn build_docs_dir(&self) -> PathBuf {
        self.build_dir().join("docs")
    }

    pub fn package_dir(&self) -> PathBuf {
        self.root.join("package")
    }

    pub fn coverage_dir(&self) -> PathBuf {
        self.root.join("coverage")
    }

    pub fn coverage_data_dir(&self) -> PathBuf {
        self.coverage_dir().join("data")
    }

    pub fn coverage_bin_dir(&self) -> PathBuf {
        self.coverage_dir().join("bin")
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.join("image")
    }

    /// Environment variables describing the layout, exported to shell steps.
    pub fn env_vars(&self) -> Vec<(&'static str, PathBuf)> {
        vec![
            ("REPODAG_OUTPUT_DIR", self.root.clone()),
            ("REPODAG_BUILD_DIR", self.build_dir()),
            ("REPODAG_BUILD_BIN_DIR", self.build_bin_dir()),
            ("REPODAG_BUILD_SHARE_DIR", self.build_share_dir()),
            ("REPODAG_BUILD_DOCS_DIR", self.build_docs_dir()),
            ("REPODAG_PACKAGE_DIR", self.package_dir()),
            ("REPODAG_COVERAGE_DATA_DIR", self.coverage_data_dir()),
            ("REPODAG_COVERAGE_BIN_DIR", self.coverage_bin_dir()),
            ("REPODAG_IMAGE_DIR", self.image_dir()),
        ]
    }
}
