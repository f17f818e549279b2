#![doc = "ci-stages-core: metadata resolution and stage orchestration for the CI pipeline."]

//! This crate holds everything the stage executables share: reading the
//! application descriptor from a repository checkout, reading the CI metadata
//! kept outside the repository, building the external tool invocations and
//! driving them in order.
//!
//! # Usage
//! The `ci-stages` binaries parse arguments and load configuration, then call
//! [`stages::run_stage`] with a [`contract::CommandRunner`]. Tests pass a
//! `MockCommandRunner` instead of [`runner::ProcessRunner`].

pub mod app_info;
pub mod ci_info;
pub mod config;
pub mod contract;
pub mod error;
pub mod invocation;
pub mod runner;
pub mod stages;
