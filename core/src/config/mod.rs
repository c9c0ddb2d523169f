pub mod cli;

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::IsTerminal as _;

use derive_more::Display;
use thiserror::Error;
use tracing::warn;

use crate::config::cli::{CliArgs, CliError};
use crate::util::PropertyLookup as _;

pub const ENV_CLASSPATH: &str = "CLASSPATH";
pub const ENV_JAVA_MEM: &str = "JAVA_MEM";
pub const ENV_JAVA_STACK: &str = "JAVA_STACK";
pub const ENV_JAVA_HOME: &str = "JAVA_HOME";
pub const ENV_JYTHON_HOME: &str = "JYTHON_HOME";
pub const ENV_ALTERNATE_VM: &str = "JDK_ALTERNATE_VM";
pub const ENV_LAUNCHER_DEBUG: &str = "_JAVA_LAUNCHER_DEBUG";
pub const ENV_LOG: &str = "LIJY_LOG";

const DEFAULT_CLASSPATH: &str = ".";
const DEFAULT_MEM: &str = "-Xmx512m";
const DEFAULT_STACK: &str = "-Xss1024k";

pub const PROP_UNAME: &str = "python.launcher.uname";
pub const PROP_TTY: &str = "python.launcher.tty";

/// Snapshot of the process environment, taken once at startup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
    /// Variables left out because their name or value is not UTF-8.
    non_utf8: Vec<String>,
}

impl Environment {
    pub fn capture() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    pub fn from_os_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env = Self::default();
        for (key, value) in pairs {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => {
                    env.vars.insert(key, value);
                }
                (Ok(key), Err(_)) => env.non_utf8.push(key),
                (Err(key), _) => env.non_utf8.push(key.to_string_lossy().into_owned()),
            }
        }
        env
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            non_utf8: Vec::new(),
        }
    }

    pub fn non_utf8_keys(&self) -> &[String] {
        &self.non_utf8
    }

    /// Warns about every variable the snapshot had to leave out.
    pub fn report_skipped(&self) {
        for key in &self.non_utf8 {
            warn!(key, "environment variable is not valid UTF-8; ignored");
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn java_home(&self) -> Option<&str> {
        self.non_empty(ENV_JAVA_HOME)
    }

    pub fn launcher_home(&self) -> Option<&str> {
        self.non_empty(ENV_JYTHON_HOME)
    }

    pub fn classpath(&self) -> Option<&str> {
        self.get(ENV_CLASSPATH)
    }

    pub fn alternate_vm(&self) -> Option<&str> {
        self.non_empty(ENV_ALTERNATE_VM)
    }

    /// Launcher tracing, enabled by `_JAVA_LAUNCHER_DEBUG`.
    pub fn trace_launcher(&self) -> bool {
        self.get(ENV_LAUNCHER_DEBUG).is_some()
    }
}

/// Everything the launch needs to know from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub program: String,
    pub properties: Vec<String>,
    pub forwarded: Vec<String>,
    pub classpath: String,
    /// `CLASSPATH` as found in the environment, if set at all.
    pub env_classpath: Option<String>,
    pub max_heap: String,
    pub stack_size: String,
    pub platform: String,
    pub tty: bool,
    pub boot: bool,
    pub debugger: bool,
    pub profile: bool,
    pub help: bool,
    pub print: bool,
    pub trace: bool,
    pub alternate_vm: Option<String>,
    pub app_args: Vec<String>,
}

impl LauncherConfig {
    pub fn from_args<I, S>(args: I, env: &Environment) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cli = CliArgs::parse(args)?;
        let platform = cli
            .properties
            .value_of(PROP_UNAME)
            .map_or_else(platform_name, str::to_owned);
        let tty = !cli.properties.defines(PROP_TTY) && std::io::stdin().is_terminal();
        Ok(Self::with_defaults(cli, env, platform, tty))
    }

    /// Fills unset values from the environment, then from built-in defaults.
    pub fn with_defaults(cli: CliArgs, env: &Environment, platform: String, tty: bool) -> Self {
        let env_or = |key: &str, fallback: &str| env.get(key).unwrap_or(fallback).to_owned();
        Self {
            classpath: cli.classpath.unwrap_or_else(|| env_or(ENV_CLASSPATH, DEFAULT_CLASSPATH)),
            env_classpath: env.classpath().map(str::to_owned),
            max_heap: cli.max_heap.unwrap_or_else(|| env_or(ENV_JAVA_MEM, DEFAULT_MEM)),
            stack_size: cli.stack_size.unwrap_or_else(|| env_or(ENV_JAVA_STACK, DEFAULT_STACK)),
            program: cli.program,
            properties: cli.properties,
            forwarded: cli.forwarded,
            platform,
            tty,
            boot: cli.boot,
            debugger: cli.jdb,
            profile: cli.profile,
            help: cli.help,
            print: cli.print,
            trace: env.trace_launcher(),
            alternate_vm: env.alternate_vm().map(str::to_owned),
            app_args: cli.passthrough,
        }
    }

    pub fn is_cygwin(&self) -> bool {
        self.platform == "cygwin"
    }
}

/// Converts command-line arguments, replacing invalid UTF-8 with U+FFFD and warning about it.
pub fn lossy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            arg.into_string().unwrap_or_else(|arg| {
                let converted = arg.to_string_lossy().into_owned();
                warn!(index, arg = %converted, "argument is not valid UTF-8; invalid bytes replaced");
                converted
            })
        })
        .collect()
}

/// Lowercased operating system name, with every Cygwin flavour reported as `cygwin`.
pub fn platform_name() -> String {
    let name = system_name();
    if name.starts_with("cygwin") {
        "cygwin".to_owned()
    } else {
        name
    }
}

#[cfg(unix)]
fn system_name() -> String {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&raw mut uts) } != 0 {
        return std::env::consts::OS.to_owned();
    }
    let sysname = unsafe { std::ffi::CStr::from_ptr(uts.sysname.as_ptr()) };
    sysname.to_string_lossy().to_lowercase()
}

#[cfg(not(unix))]
fn system_name() -> String {
    "windows".to_owned()
}

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    Cli(#[from] CliError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str], env: &[(&str, &str)]) -> LauncherConfig {
        let cli = CliArgs::parse(std::iter::once("jython").chain(args.iter().copied())).unwrap();
        LauncherConfig::with_defaults(cli, &Environment::from_pairs(env.iter().copied()), "linux".into(), false)
    }

    #[test]
    fn built_in_defaults_apply() {
        let config = config(&[], &[]);
        assert_eq!(config.classpath, ".");
        assert_eq!(config.max_heap, "-Xmx512m");
        assert_eq!(config.stack_size, "-Xss1024k");
        assert_eq!(config.env_classpath, None);
        assert!(!config.trace);
    }

    #[test]
    fn environment_beats_defaults() {
        let config = config(
            &[],
            &[("CLASSPATH", "/lib/a.jar"), ("JAVA_MEM", "-Xmx2g"), ("JAVA_STACK", "-Xss4m"), ("_JAVA_LAUNCHER_DEBUG", "1")],
        );
        assert_eq!(config.classpath, "/lib/a.jar");
        assert_eq!(config.env_classpath.as_deref(), Some("/lib/a.jar"));
        assert_eq!(config.max_heap, "-Xmx2g");
        assert_eq!(config.stack_size, "-Xss4m");
        assert!(config.trace);
    }

    #[test]
    fn command_line_beats_environment() {
        let config = config(&["-J-Xmx3g", "-J-cp", "/x"], &[("CLASSPATH", "/lib/a.jar"), ("JAVA_MEM", "-Xmx2g")]);
        assert_eq!(config.classpath, "/x");
        assert_eq!(config.max_heap, "-Xmx3g");
        assert_eq!(config.env_classpath.as_deref(), Some("/lib/a.jar"));
    }

    #[test]
    fn uname_property_overrides_platform() {
        let config = LauncherConfig::from_args(
            ["jython", "-Dpython.launcher.uname=cygwin", "-Dpython.launcher.tty=true"],
            &Environment::default(),
        )
        .unwrap();
        assert!(config.is_cygwin());
        assert!(!config.tty);
    }

    #[test]
    fn usage_errors_surface() {
        let err = LauncherConfig::from_args(["jython", "-J-cp"], &Environment::default()).unwrap_err();
        assert_eq!(err.to_string(), "Argument expected for -J-classpath option");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_variables_are_recorded() {
        use std::os::unix::ffi::OsStringExt as _;

        let env = Environment::from_os_pairs([
            (OsString::from("JAVA_HOME"), OsString::from_vec(b"/jdk\xff".to_vec())),
            (OsString::from("JYTHON_HOME"), OsString::from("/opt/jython")),
        ]);
        assert_eq!(env.java_home(), None);
        assert_eq!(env.non_utf8_keys(), ["JAVA_HOME"]);
        assert_eq!(env.launcher_home(), Some("/opt/jython"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_are_replaced() {
        use std::os::unix::ffi::OsStringExt as _;

        let args = lossy_args([OsString::from("jython"), OsString::from_vec(b"caf\xe9.py".to_vec())]);
        assert_eq!(args, ["jython", "caf\u{fffd}.py"]);
    }

    #[test]
    fn platform_name_is_lowercase() {
        let name = platform_name();
        assert!(!name.is_empty());
        assert_eq!(name, name.to_lowercase());
    }
}
