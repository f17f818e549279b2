use std::process::ExitCode;

fn main() -> ExitCode {
    ci_stages::cli::metadata_main()
}
