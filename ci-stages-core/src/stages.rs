//! Stage drivers: compile, test and publish.
//!
//! Each driver is a straight line of steps. A step starts only after the
//! previous one succeeded, and the first failure ends the stage where it is:
//!
//! - compile: resolve app info → increment build number → stop previous
//!   containers → run the `compile` compose service
//! - test: resolve app info → run the `test` compose service
//! - publish: resolve app info → resolve CI info → build the container image
//!
//! Completed steps are never rolled back. Callers get a [`StageReport`] of
//! what ran, or a [`StageError`] naming the step that failed.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::app_info::{read_app_info, AppInfo};
use crate::ci_info::{ci_info_path, read_ci_info};
use crate::config::StagesConfig;
use crate::contract::{CommandRunner, Invocation};
use crate::error::{StageError, UsageError};
use crate::invocation::{self, ComposeService};

pub const REPO_DIR_FLAG: &str = "--repo-dir";
pub const CI_METADATA_DIR_FLAG: &str = "--ci-metadata-dir";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Test,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Test => "test",
            Stage::Publish => "publish",
        }
    }

    /// Whether the stage cannot run without `--ci-metadata-dir`.
    pub fn requires_ci_metadata(&self) -> bool {
        !matches!(self, Stage::Test)
    }

    fn log_prefix(&self) -> &'static str {
        match self {
            Stage::Compile => "[COMPILE]",
            Stage::Test => "[TEST]",
            Stage::Publish => "[PUBLISH]",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// External steps a stage can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    IncrementBuildNumber,
    TeardownPreviousContainers,
    RunComposeService(ComposeService),
    BuildContainerImage,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::IncrementBuildNumber => f.write_str("increment build number"),
            Step::TeardownPreviousContainers => f.write_str("remove previous containers"),
            Step::RunComposeService(service) => write!(f, "run compose service {service}"),
            Step::BuildContainerImage => f.write_str("build container image"),
        }
    }
}

/// The two path inputs of a stage, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInputs {
    pub repo_dir: PathBuf,
    pub ci_metadata_dir: Option<PathBuf>,
}

fn present(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

impl StageInputs {
    /// Empty paths count as missing. The test stage does not need the CI
    /// metadata directory but keeps it when given.
    pub fn validate(
        stage: Stage,
        repo_dir: Option<PathBuf>,
        ci_metadata_dir: Option<PathBuf>,
    ) -> Result<Self, UsageError> {
        let repo_dir = present(repo_dir);
        let ci_metadata_dir = present(ci_metadata_dir);

        let mut missing = Vec::new();
        if repo_dir.is_none() {
            missing.push(REPO_DIR_FLAG);
        }
        if stage.requires_ci_metadata() && ci_metadata_dir.is_none() {
            missing.push(CI_METADATA_DIR_FLAG);
        }

        match repo_dir {
            Some(repo_dir) if missing.is_empty() => Ok(Self {
                repo_dir,
                ci_metadata_dir,
            }),
            _ => Err(UsageError { missing }),
        }
    }
}

/// What a finished stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub app: AppInfo,
    pub steps: Vec<Step>,
}

struct Driver<'a, R: ?Sized> {
    stage: Stage,
    runner: &'a R,
    report: StageReport,
}

impl<'a, R> Driver<'a, R>
where
    R: CommandRunner + ?Sized,
{
    fn new(stage: Stage, app: AppInfo, runner: &'a R) -> Self {
        Self {
            stage,
            runner,
            report: StageReport {
                stage,
                app,
                steps: Vec::new(),
            },
        }
    }

    async fn step(&mut self, step: Step, invocation: Invocation) -> Result<(), StageError> {
        let number = self.report.steps.len() + 1;
        info!(
            stage = %self.stage,
            app = %self.report.app.name,
            "{} Step {}: {}", self.stage.log_prefix(), number, step
        );
        match self.runner.run(invocation).await {
            Ok(()) => {
                self.report.steps.push(step);
                Ok(())
            }
            Err(source) => {
                error!(
                    stage = %self.stage,
                    app = %self.report.app.name,
                    error = %source,
                    "{}[ERROR] Step {} failed: {}", self.stage.log_prefix(), number, step
                );
                Err(StageError::Step {
                    stage: self.stage,
                    step,
                    source,
                })
            }
        }
    }

    fn finish(self) -> StageReport {
        info!(
            stage = %self.stage,
            app = %self.report.app.name,
            steps = self.report.steps.len(),
            "{} Stage complete", self.stage.log_prefix()
        );
        self.report
    }
}

/// Increments the build number, removes the previous containers and runs the
/// `compile` compose service.
pub async fn compile_stage<R>(
    repo_dir: &Path,
    ci_metadata_dir: &Path,
    config: &StagesConfig,
    runner: &R,
) -> Result<StageReport, StageError>
where
    R: CommandRunner + ?Sized,
{
    let app = read_app_info(repo_dir, &config.layout)?;
    let ci_info_file = ci_info_path(ci_metadata_dir, &app, &config.layout);

    let tools = &config.tools;
    let increment = invocation::increment_build_number(&tools.increment_build_number, &ci_info_file);
    let teardown = invocation::stop_compose_service(&tools.stop_compose_service, &app, repo_dir);
    let compose = invocation::run_compose_service(
        &tools.run_compose_service,
        &app,
        repo_dir,
        ComposeService::Compile,
    );

    let mut driver = Driver::new(Stage::Compile, app, runner);
    driver.step(Step::IncrementBuildNumber, increment).await?;
    driver.step(Step::TeardownPreviousContainers, teardown).await?;
    driver
        .step(Step::RunComposeService(ComposeService::Compile), compose)
        .await?;
    Ok(driver.finish())
}

/// Runs the `test` compose service against whatever compile produced.
pub async fn test_stage<R>(
    repo_dir: &Path,
    config: &StagesConfig,
    runner: &R,
) -> Result<StageReport, StageError>
where
    R: CommandRunner + ?Sized,
{
    let app = read_app_info(repo_dir, &config.layout)?;
    let compose = invocation::run_compose_service(
        &config.tools.run_compose_service,
        &app,
        repo_dir,
        ComposeService::Test,
    );

    let mut driver = Driver::new(Stage::Test, app, runner);
    driver
        .step(Step::RunComposeService(ComposeService::Test), compose)
        .await?;
    Ok(driver.finish())
}

/// Builds the container image for the current CI version from the publish
/// build context.
pub async fn publish_stage<R>(
    repo_dir: &Path,
    ci_metadata_dir: &Path,
    config: &StagesConfig,
    runner: &R,
) -> Result<StageReport, StageError>
where
    R: CommandRunner + ?Sized,
{
    let app = read_app_info(repo_dir, &config.layout)?;
    let ci_info = read_ci_info(&app, ci_metadata_dir, &config.layout)?;
    info!(
        app = %app.name,
        version = %ci_info.current_version(),
        "[PUBLISH] Building image for version"
    );
    let build = invocation::build_container_image(
        &config.tools.container_build,
        &config.layout,
        &app,
        &ci_info,
        repo_dir,
    );

    let mut driver = Driver::new(Stage::Publish, app, runner);
    driver.step(Step::BuildContainerImage, build).await?;
    Ok(driver.finish())
}

/// Dispatches to the driver of `stage`.
pub async fn run_stage<R>(
    stage: Stage,
    inputs: &StageInputs,
    config: &StagesConfig,
    runner: &R,
) -> Result<StageReport, StageError>
where
    R: CommandRunner + ?Sized,
{
    let ci_metadata_dir = || {
        inputs
            .ci_metadata_dir
            .as_deref()
            .ok_or_else(|| UsageError {
                missing: vec![CI_METADATA_DIR_FLAG],
            })
    };

    match stage {
        Stage::Compile => compile_stage(&inputs.repo_dir, ci_metadata_dir()?, config, runner).await,
        Stage::Test => test_stage(&inputs.repo_dir, config, runner).await,
        Stage::Publish => publish_stage(&inputs.repo_dir, ci_metadata_dir()?, config, runner).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_publish_require_both_paths() {
        for stage in [Stage::Compile, Stage::Publish] {
            let err = StageInputs::validate(stage, None, None).unwrap_err();
            assert_eq!(err.missing, vec![REPO_DIR_FLAG, CI_METADATA_DIR_FLAG]);

            let err = StageInputs::validate(stage, Some("/repo".into()), Some("".into()))
                .unwrap_err();
            assert_eq!(err.missing, vec![CI_METADATA_DIR_FLAG]);
        }
    }

    #[test]
    fn test_stage_tolerates_missing_ci_metadata_dir() {
        let inputs = StageInputs::validate(Stage::Test, Some("/repo".into()), None)
            .expect("test stage needs only the repository");
        assert_eq!(inputs.repo_dir, PathBuf::from("/repo"));
        assert_eq!(inputs.ci_metadata_dir, None);

        let err = StageInputs::validate(Stage::Test, Some("".into()), Some("/ci".into()))
            .unwrap_err();
        assert_eq!(err.missing, vec![REPO_DIR_FLAG]);
    }
}
