//! Argument vectors for the external tools, derived from the resolved metadata.

use std::fmt;
use std::path::Path;

use crate::app_info::AppInfo;
use crate::ci_info::CiInfo;
use crate::config::{Layout, ToolCommand};
use crate::contract::Invocation;

/// OCI annotation carrying the literal CI version on published images.
pub const VERSION_LABEL: &str = "org.opencontainers.image.version";

/// Compose services the run script knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeService {
    Compile,
    Test,
}

impl ComposeService {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposeService::Compile => "compile",
            ComposeService::Test => "test",
        }
    }
}

impl fmt::Display for ComposeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn from_tool(tool: &ToolCommand) -> Invocation {
    Invocation::new(tool.program.clone()).args(tool.args.iter().cloned())
}

/// `<tool> -f <ci-info-file>`
pub fn increment_build_number(tool: &ToolCommand, ci_info_file: &Path) -> Invocation {
    from_tool(tool).arg("-f").arg(path_arg(ci_info_file))
}

/// `<tool> -a <app> -r <repo>`
pub fn stop_compose_service(tool: &ToolCommand, app: &AppInfo, repo_dir: &Path) -> Invocation {
    from_tool(tool)
        .args(["-a", app.name.as_str(), "-r"])
        .arg(path_arg(repo_dir))
}

/// `<tool> -a <app> -r <repo> -s <service>`
pub fn run_compose_service(
    tool: &ToolCommand,
    app: &AppInfo,
    repo_dir: &Path,
    service: ComposeService,
) -> Invocation {
    from_tool(tool)
        .args(["-a", app.name.as_str(), "-r"])
        .arg(path_arg(repo_dir))
        .args(["-s", service.as_str()])
}

/// Container tags allow `[A-Za-z0-9_.-]` only; anything else becomes `-`.
pub fn image_tag(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// `<tool> -t <app>:<tag> --label <VERSION_LABEL>=<version> -f <ctx>/<dockerfile> <ctx>`
pub fn build_container_image(
    tool: &ToolCommand,
    layout: &Layout,
    app: &AppInfo,
    ci_info: &CiInfo,
    repo_dir: &Path,
) -> Invocation {
    let context = layout.publish_context_path(repo_dir);
    let version = ci_info.current_version();
    from_tool(tool)
        .arg("-t")
        .arg(format!("{}:{}", app.name, image_tag(version)))
        .arg("--label")
        .arg(format!("{VERSION_LABEL}={version}"))
        .arg("-f")
        .arg(path_arg(&context.join(&layout.dockerfile)))
        .arg(path_arg(&context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_tag_replaces_build_metadata_separator() {
        assert_eq!(image_tag("1.4.0"), "1.4.0");
        assert_eq!(image_tag("1.4.0+12"), "1.4.0-12");
        assert_eq!(image_tag("release candidate/2"), "release-candidate-2");
    }

    #[test]
    fn tool_prefix_arguments_come_first() {
        let tool = ToolCommand::new("python3").with_args(["inc-build-number.py"]);
        let invocation = increment_build_number(&tool, Path::new("/ci/acme-api/app-ci-info.yml"));
        assert_eq!(invocation.program, "python3");
        assert_eq!(
            invocation.args,
            vec!["inc-build-number.py", "-f", "/ci/acme-api/app-ci-info.yml"]
        );
    }
}
