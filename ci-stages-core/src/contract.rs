//! # contract: the seam between stage logic and the operating system
//!
//! Stages never build shell strings. Each external step is an [`Invocation`]
//! (program plus an argument vector) handed to a [`CommandRunner`], so names
//! and paths with special characters reach the tool as single arguments.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; tests use `MockCommandRunner` to
//!   assert the order of invocations and to inject failures.
//! - [`crate::runner::ProcessRunner`] is the production implementation.

use async_trait::async_trait;
use mockall::automock;
use std::fmt;

use crate::error::RunnerError;

/// A fully formed external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs one external command to completion.
///
/// Returns only after the child has exited. `Ok` means exit status zero;
/// anything else is an error and the calling stage must stop.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: Invocation) -> Result<(), RunnerError>;
}
