use std::process::ExitCode;

fn main() -> ExitCode {
    match hub::run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if !hub::is_silent(&e) {
                eprintln!("{e:#}");
            }

            ExitCode::from(hub::exit_code(&e))
        }
    }
}
