use std::process::ExitCode;

fn main() -> ExitCode {
    basketbot_cli::run()
}
