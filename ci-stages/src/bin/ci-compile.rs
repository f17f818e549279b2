use ci_stages::cli::stage_main;
use ci_stages_core::stages::Stage;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    stage_main(Stage::Compile).await
}
