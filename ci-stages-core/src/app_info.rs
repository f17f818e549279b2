//! # app_info: the application descriptor inside a repository checkout
//!
//! Every stage starts here. The descriptor (`app-info.yml` by default) names the
//! application, and that name is the only key used to find the CI metadata and
//! to address containers and compose services afterwards.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. the repository path is a directory,
//! 2. it contains the version-control marker directory,
//! 3. it contains the descriptor file,
//! 4. the descriptor parses and carries a usable name.
//!
//! Nothing is read from the descriptor until the first two checks pass.

use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::config::Layout;
use crate::error::MetadataError;

/// Identity and deployment settings of the application under build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub group: String,
    pub build_output_path: String,
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    application: ApplicationSection,
    #[serde(default)]
    deployment: DeploymentSection,
}

#[derive(Debug, Deserialize)]
struct ApplicationSection {
    name: String,
    #[serde(default)]
    group: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSection {
    #[serde(rename = "build-output-path", default)]
    build_output_path: String,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("application name pattern is valid")
    })
}

/// True when `name` can be used unquoted as a path segment and a command argument.
pub fn is_safe_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Reads and validates the descriptor of the repository at `repo_dir`.
pub fn read_app_info(repo_dir: &Path, layout: &Layout) -> Result<AppInfo, MetadataError> {
    info!(repo_dir = %repo_dir.display(), "Resolving application descriptor");

    if !repo_dir.is_dir() {
        error!(repo_dir = %repo_dir.display(), "Repository path does not exist or is not a directory");
        return Err(MetadataError::RepoDirMissing(repo_dir.to_path_buf()));
    }

    if !layout.vcs_marker_path(repo_dir).is_dir() {
        error!(repo_dir = %repo_dir.display(), marker = %layout.vcs_marker_dir, "Repository directory is not a git repository");
        return Err(MetadataError::NotARepository(repo_dir.to_path_buf()));
    }

    let descriptor_path = layout.descriptor_path(repo_dir);
    if !descriptor_path.is_file() {
        error!(path = %descriptor_path.display(), "Descriptor file not found");
        return Err(MetadataError::DescriptorMissing(repo_dir.to_path_buf()));
    }

    let content = fs::read_to_string(&descriptor_path).map_err(|source| {
        error!(error = ?source, path = %descriptor_path.display(), "Failed to read descriptor");
        MetadataError::DescriptorRead {
            path: descriptor_path.clone(),
            source,
        }
    })?;

    let raw: DescriptorFile = serde_yaml::from_str(&content).map_err(|source| {
        error!(error = %source, path = %descriptor_path.display(), "Failed to parse descriptor YAML");
        MetadataError::DescriptorParse {
            path: descriptor_path.clone(),
            source,
        }
    })?;

    if !is_safe_name(&raw.application.name) {
        error!(name = ?raw.application.name, "Descriptor carries an unusable application name");
        return Err(MetadataError::InvalidApplicationName(raw.application.name));
    }

    let app_info = AppInfo {
        name: raw.application.name,
        group: raw.application.group,
        build_output_path: raw.deployment.build_output_path,
    };
    info!(app = %app_info.name, group = %app_info.group, "Application descriptor resolved");
    debug!(?app_info, "Application descriptor (full debug)");
    Ok(app_info)
}
