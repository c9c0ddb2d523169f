#![allow(clippy::missing_errors_doc)]

use std::process::ExitCode;

use crate::config::{Environment, lossy_args};
use crate::launcher::Launcher;

mod config;
mod launcher;
mod loader;
mod paths;
mod runtime;
mod util;

pub fn main() -> ExitCode {
    let env = Environment::capture();
    launcher::init_logging(&env);
    env.report_skipped();
    let args = lossy_args(std::env::args_os());
    match Launcher::new(args, env).launch() {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(?err, "launch failed");
            err.report();
            ExitCode::from(err.exit_code())
        }
    }
}
