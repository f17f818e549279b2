//! Production [`CommandRunner`]: spawns the program and waits for it.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

use crate::contract::{CommandRunner, Invocation};
use crate::error::RunnerError;

/// Runs invocations as child processes with inherited stdio, so the tool's
/// output reaches the operator unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: Invocation) -> Result<(), RunnerError> {
        info!(command = %invocation, "Running external command");

        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                info!(program = %invocation.program, status = ?s, "External command succeeded");
                Ok(())
            }
            Ok(s) => {
                error!(program = %invocation.program, "External command exited with non-zero code: {}", s);
                Err(RunnerError::ExitStatus {
                    program: invocation.program,
                    code: s.code(),
                })
            }
            Err(e) => {
                error!(error = ?e, program = %invocation.program, "Failed to launch external command");
                Err(RunnerError::Spawn {
                    program: invocation.program,
                    source: e,
                })
            }
        }
    }
}
