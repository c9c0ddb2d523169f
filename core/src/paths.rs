//! Locating the runtime and launcher installations on disk.

use std::env::consts::EXE_SUFFIX;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use derive_more::Display;
use thiserror::Error;
use tracing::debug;

use crate::config::Environment;
use crate::util::TrueOrErr as _;

const DEV_JAR: &str = "jython-dev.jar";
const RELEASE_JAR: &str = "jython.jar";

/// Library directory name of the host architecture under `<jre>/lib`.
pub const ARCH: &str = if cfg!(target_arch = "x86_64") {
    "amd64"
} else if cfg!(target_arch = "x86") {
    "i386"
} else if cfg!(target_arch = "aarch64") {
    "aarch64"
} else {
    "unknown"
};

#[derive(Debug, Display, Error)]
pub enum PathError {
    #[display("could not determine the launcher's own path: {_0}")]
    Executable(#[source] io::Error),
    #[display("JAVA_HOME is not set and no java executable was found on PATH")]
    NoJavaHome,
    #[display("JAVA_HOME `{}' is not a directory", _0.display())]
    BadJavaHome(PathBuf),
    #[display(
        "{} contains neither jython-dev.jar nor jython.jar.\nTry running this launcher from the 'bin' directory of an installed Jython or setting $JYTHON_HOME.",
        _0.display()
    )]
    NoLauncherJar(PathBuf),
    #[display("cygpath failed: {_0}")]
    Cygpath(String),
    #[display("could not run cygpath: {_0}")]
    CygpathIo(#[from] io::Error),
}

/// Resolved locations of everything the launch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// The JDK or JRE root, as given by `JAVA_HOME`.
    pub java_home: PathBuf,
    /// `<java_home>/jre` when present, otherwise `java_home`.
    pub runtime_home: PathBuf,
    pub launcher_home: PathBuf,
    pub launcher_jar: PathBuf,
    pub executable: PathBuf,
    pub arch: &'static str,
}

impl Installation {
    pub fn discover(env: &Environment) -> Result<Self, PathError> {
        let executable = std::env::current_exe()
            .and_then(|exe| exe.canonicalize())
            .map_err(PathError::Executable)?;
        Self::discover_from(env, executable)
    }

    pub fn discover_from(env: &Environment, executable: PathBuf) -> Result<Self, PathError> {
        let java_home = match env.java_home() {
            Some(home) => PathBuf::from(home),
            None => java_home_from_path(env.get("PATH")).ok_or(PathError::NoJavaHome)?,
        };
        java_home.is_dir().or_error(PathError::BadJavaHome(java_home.clone()))?;
        let jre = java_home.join("jre");
        let runtime_home = if jre.is_dir() { jre } else { java_home.clone() };

        let launcher_home = match env.launcher_home() {
            Some(home) => PathBuf::from(home),
            None => executable
                .parent()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let launcher_jar = [DEV_JAR, RELEASE_JAR]
            .iter()
            .map(|jar| launcher_home.join(jar))
            .find(|jar| jar.is_file())
            .ok_or_else(|| PathError::NoLauncherJar(launcher_home.clone()))?;

        let installation = Self {
            java_home,
            runtime_home,
            launcher_home,
            launcher_jar,
            executable,
            arch: ARCH,
        };
        debug!(?installation, "installation discovered");
        Ok(installation)
    }

    /// Directory holding the launcher jar.
    pub fn jar_dir(&self) -> &Path {
        self.launcher_jar.parent().unwrap_or(&self.launcher_home)
    }

    /// The launcher's install root: the executable's directory, minus a trailing `bin`.
    pub fn application_home(&self) -> PathBuf {
        let dir = self.executable.parent().unwrap_or(Path::new("/"));
        match dir.file_name() {
            Some(name) if name == "bin" => dir.parent().unwrap_or(dir).to_path_buf(),
            _ => dir.to_path_buf(),
        }
    }
}

fn java_home_from_path(path_var: Option<&str>) -> Option<PathBuf> {
    let java = format!("java{EXE_SUFFIX}");
    let found = std::env::split_paths(path_var?)
        .map(|dir| dir.join(&java))
        .find(|candidate| candidate.is_file())?
        .canonicalize()
        .ok()?;
    let home = found.parent()?.parent()?;
    match home.file_name() {
        Some(name) if name == "jre" => home.parent().map(Path::to_path_buf),
        _ => Some(home.to_path_buf()),
    }
}

/// Translates a path with `cygpath --windows`.
pub fn cygpath(path: &Path) -> Result<String, PathError> {
    let output = Command::new("cygpath").arg("--windows").arg(path).output()?;
    if !output.status.success() {
        return Err(PathError::Cygpath(output.status.to_string()));
    }
    let stdout = String::from_utf8(output.stdout).map_err(|err| PathError::Cygpath(err.to_string()))?;
    let line = stdout.lines().next().unwrap_or_default();
    Ok(line.trim_end().to_owned())
}
