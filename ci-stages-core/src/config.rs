use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Root of the pipeline library scripts on the build agents.
pub const DEFAULT_LIBRARY_ROOT: &str = "/stakater/pipeline-library";

/// Everything a stage needs besides its two path inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub layout: Layout,
    pub tools: Tools,
}

impl StagesConfig {
    pub fn trace_loaded(&self) {
        info!(
            descriptor_file = %self.layout.descriptor_file,
            ci_info_file = %self.layout.ci_info_file,
            publish_context = %self.layout.publish_context.display(),
            "Loaded stages config"
        );
        debug!(?self, "Stages config loaded (full debug)");
    }
}

/// Fixed file and directory names inside the repository checkout and the CI
/// metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Descriptor file name, relative to the repository root.
    pub descriptor_file: String,
    /// Directory whose presence marks a version-controlled checkout.
    pub vcs_marker_dir: String,
    /// CI info file name inside `<ci-metadata-dir>/<app-name>/`.
    pub ci_info_file: String,
    /// Image build context, relative to the repository root.
    pub publish_context: PathBuf,
    /// Dockerfile name inside the build context.
    pub dockerfile: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            descriptor_file: "app-info.yml".to_string(),
            vcs_marker_dir: ".git".to_string(),
            ci_info_file: "app-ci-info.yml".to_string(),
            publish_context: PathBuf::from("deployment/publish"),
            dockerfile: "Dockerfile".to_string(),
        }
    }
}

impl Layout {
    pub fn descriptor_path(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(&self.descriptor_file)
    }

    pub fn vcs_marker_path(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(&self.vcs_marker_dir)
    }

    /// `<ci_metadata_dir>/<app_name>/<ci_info_file>`
    pub fn ci_info_path(&self, ci_metadata_dir: &Path, app_name: &str) -> PathBuf {
        ci_metadata_dir.join(app_name).join(&self.ci_info_file)
    }

    pub fn publish_context_path(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(&self.publish_context)
    }
}

/// An external tool: the program plus the arguments that always precede the
/// stage-specific ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// The external collaborators the stages delegate to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub increment_build_number: ToolCommand,
    pub stop_compose_service: ToolCommand,
    pub run_compose_service: ToolCommand,
    pub container_build: ToolCommand,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            increment_build_number: ToolCommand::new("python3").with_args([format!(
                "{DEFAULT_LIBRARY_ROOT}/versioning/inc-build-number.py"
            )]),
            stop_compose_service: ToolCommand::new(format!(
                "{DEFAULT_LIBRARY_ROOT}/stages/stop-docker-compose-service.sh"
            )),
            run_compose_service: ToolCommand::new(format!(
                "{DEFAULT_LIBRARY_ROOT}/stages/run-docker-compose-service.sh"
            )),
            container_build: ToolCommand::new("docker").with_args(["build"]),
        }
    }
}
