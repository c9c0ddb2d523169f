use std::process::ExitCode;

use derive_more::Display;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::cli::{LAUNCHER_HELP, USAGE};
use crate::config::{ConfigError, ENV_LOG, Environment, LauncherConfig};
use crate::loader::RuntimeHandle;
use crate::paths::{Installation, PathError};
use crate::runtime::variant::{VariantRequest, VariantTable};
use crate::runtime::{Bootstrapper, Outcome, RuntimeError};

const USAGE_EXIT: u8 = 2;
const LOADER_EXIT: u8 = 6;

/// Installs the stderr log subscriber. `LIJY_LOG` takes an `EnvFilter` directive;
/// otherwise everything is traced when `_JAVA_LAUNCHER_DEBUG` is set and only
/// warnings are shown when it is not.
pub fn init_logging(env: &Environment) {
    let fallback = if env.trace_launcher() { "trace" } else { "warn" };
    let filter = env
        .get(ENV_LOG)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug, Clone)]
pub struct Launcher {
    args: Vec<String>,
    env: Environment,
}

impl Launcher {
    pub fn new(args: Vec<String>, env: Environment) -> Self {
        Self { args, env }
    }

    pub fn launch(&self) -> Result<ExitCode, LaunchError> {
        let config = LauncherConfig::from_args(self.args.iter().cloned(), &self.env)?;
        let install = Installation::discover(&self.env)?;
        let table = VariantTable::locate(&install.runtime_home, install.arch).map_err(RuntimeError::from)?;
        debug!(source = table.source(), variants = table.len(), "variant table loaded");

        let mut forwarded = config.forwarded.clone();
        let request = VariantRequest::from_flags(&table, &mut forwarded, config.alternate_vm.as_deref());
        debug!(?request, "variant requested");

        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&forwarded)?;
        let resolution = boot.resolve_variant(&table, &request)?;
        if config.print {
            println!("{}", boot.command_line());
            return Ok(ExitCode::SUCCESS);
        }

        let runtime = boot.load_library(|resolution| RuntimeHandle::load(&install.runtime_home, install.arch, resolution))?;
        debug!(%resolution, "runtime library ready");
        let help = config.help.then(|| help_text(&table));
        match boot.run(&runtime, help)? {
            Outcome::Success => Ok(ExitCode::SUCCESS),
            Outcome::Failure => Ok(ExitCode::FAILURE),
        }
    }
}

/// The launcher help, followed by the variants the installed runtime offers.
pub fn help_text(table: &VariantTable) -> String {
    let mut text = LAUNCHER_HELP.to_owned();
    let lines = table.usage_lines();
    if !lines.is_empty() {
        text.push_str("Java VM variants (select with -J<flag>):\n");
        for line in lines {
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

#[derive(Debug, Display, Error)]
pub enum LaunchError {
    Config(#[from] ConfigError),
    Path(#[from] PathError),
    Runtime(#[from] RuntimeError),
}

impl LaunchError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Path(_) => USAGE_EXIT,
            Self::Runtime(RuntimeError::Loader(_)) => LOADER_EXIT,
            Self::Runtime(_) => 1,
        }
    }

    /// Prints the error the way the user should see it.
    pub fn report(&self) {
        match self {
            Self::Config(err) => {
                eprintln!("{err}");
                eprint!("{USAGE}");
            }
            Self::Path(err) => eprintln!("{err}"),
            Self::Runtime(err) => eprintln!("Error: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::cli::CliError;
    use crate::loader::LoaderError;
    use crate::runtime::variant::VariantError;

    #[test]
    fn exit_codes_by_kind() {
        assert_eq!(LaunchError::from(ConfigError::from(CliError::MissingClasspath)).exit_code(), 2);
        assert_eq!(LaunchError::from(PathError::NoJavaHome).exit_code(), 2);
        let missing = RuntimeError::from(LoaderError::NotFound(PathBuf::from("/jre/lib/server/libjvm.so")));
        assert_eq!(LaunchError::from(missing).exit_code(), 6);
        let unknown = RuntimeError::from(VariantError::Unknown("-fast".into()));
        assert_eq!(LaunchError::from(unknown).exit_code(), 1);
        assert_eq!(LaunchError::from(RuntimeError::WorkerPanicked).exit_code(), 1);
    }

    #[test]
    fn help_lists_variants() {
        let table = VariantTable::parse("jvm.cfg", "-server KNOWN\n-client IGNORE\n-hotspot ALIASED_TO -server\n");
        let text = help_text(&table);
        assert!(text.starts_with("Jython launcher-specific options:"));
        assert!(text.contains("to select the \"server\" VM (default)"));
        assert!(text.contains("is a synonym for the \"server\" VM"));
    }

    #[test]
    fn help_without_variants_is_launcher_help() {
        assert_eq!(help_text(&VariantTable::default()), LAUNCHER_HELP);
    }
}
