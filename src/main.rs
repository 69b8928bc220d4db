use std::process::ExitCode;

fn main() -> ExitCode {
    fest_runner::cli::run()
}
