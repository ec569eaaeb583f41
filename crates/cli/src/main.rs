use std::process::ExitCode;

fn main() -> ExitCode {
    easyshop_cli::run()
}
