use std::process::ExitCode;

fn main() -> ExitCode {
    vscse_lib::run()
}
