use std::path::Path;

use tracing::trace;

use crate::util::{build_option, checked_concat};

#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

pub const CLASSPATH_OPTION: &str = "-Djava.class.path=";
pub const BOOT_CLASSPATH_OPTION: &str = "-Xbootclasspath/a:";

const LIBRARY_WILDCARD: &str = "/javalib/*";

/// Class path for the launcher's own jars, optionally followed by the caller's.
///
/// In boot mode the caller's path is left out; it is installed as a separate
/// ordinary class-path option.
pub fn build_classpath(launcher_home: &str, launcher_jar: &str, caller: &str, boot: bool) -> Option<String> {
    let separator = PATH_SEPARATOR.to_string();
    if boot {
        checked_concat(&[launcher_jar, &separator, launcher_home, LIBRARY_WILDCARD])
    } else {
        checked_concat(&[launcher_jar, &separator, launcher_home, LIBRARY_WILDCARD, &separator, caller])
    }
}

/// Option string installing `classpath`, either as the class path or appended to the boot path.
pub fn classpath_option(classpath: &str, expand: bool, boot: bool) -> Option<String> {
    let prefix = if boot { BOOT_CLASSPATH_OPTION } else { CLASSPATH_OPTION };
    if expand {
        build_option(prefix, &expand_wildcards(classpath))
    } else {
        build_option(prefix, classpath)
    }
}

/// Class path of the command-line debugger's support libraries.
pub fn debugger_classpath(java_home: &Path, runtime_home: &Path) -> String {
    [
        java_home.join("lib").join("tools.jar"),
        java_home.join("lib").join("sa-jdi.jar"),
        runtime_home.join("classes"),
    ]
    .iter()
    .map(|path| path.display().to_string())
    .collect::<Vec<_>>()
    .join(&PATH_SEPARATOR.to_string())
}

/// Replaces each `dir/*` entry with the jar files found in `dir`.
///
/// Entries that exist literally are kept as they are. A wildcard that matches
/// no jars is dropped.
pub fn expand_wildcards(classpath: &str) -> String {
    if !classpath.contains('*') {
        return classpath.to_owned();
    }
    let mut expanded = Vec::new();
    for entry in classpath.split(PATH_SEPARATOR) {
        match wildcard_dir(entry) {
            Some(dir) => {
                let jars = jars_in(dir);
                trace!(entry, count = jars.len(), "expanded class path wildcard");
                expanded.extend(jars);
            }
            None => expanded.push(entry.to_owned()),
        }
    }
    expanded.join(&PATH_SEPARATOR.to_string())
}

fn wildcard_dir(entry: &str) -> Option<&str> {
    if Path::new(entry).exists() {
        return None;
    }
    if entry == "*" {
        return Some(".");
    }
    entry
        .strip_suffix("/*")
        .or_else(|| entry.strip_suffix("\\*").filter(|_| cfg!(windows)))
}

fn jars_in(dir: &str) -> Vec<String> {
    let escaped = glob::Pattern::escape(dir);
    let mut jars: Vec<String> = ["jar", "JAR"]
        .iter()
        .filter_map(|ext| glob::glob(&format!("{escaped}/*.{ext}")).ok())
        .flatten()
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .map(|path| path.display().to_string())
        .collect();
    jars.sort();
    jars.dedup();
    jars
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn non_boot_appends_caller_path() {
        let cp = build_classpath("/opt/rt", "/opt/rt/launch.jar", "/x:/y", false).unwrap();
        assert_eq!(cp, "/opt/rt/launch.jar:/opt/rt/javalib/*:/x:/y");
    }

    #[cfg(not(windows))]
    #[test]
    fn boot_leaves_caller_path_out() {
        let cp = build_classpath("/opt/rt", "/opt/rt/launch.jar", "/x:/y", true).unwrap();
        assert_eq!(cp, "/opt/rt/launch.jar:/opt/rt/javalib/*");
    }

    #[test]
    fn option_prefix_follows_mode() {
        assert_eq!(classpath_option("a.jar", false, false).unwrap(), "-Djava.class.path=a.jar");
        assert_eq!(classpath_option("a.jar", false, true).unwrap(), "-Xbootclasspath/a:a.jar");
    }

    #[cfg(not(windows))]
    #[test]
    fn wildcards_expand_to_sorted_jars() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("javalib");
        fs::create_dir(&lib).unwrap();
        for name in ["b.jar", "a.JAR", "notes.txt"] {
            fs::write(lib.join(name), b"").unwrap();
        }
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let input = format!("first.jar:{}/*:{}/*", lib.display(), empty.display());
        let expanded = expand_wildcards(&input);
        assert_eq!(
            expanded,
            format!("first.jar:{}:{}", lib.join("a.JAR").display(), lib.join("b.jar").display())
        );
    }

    #[test]
    fn paths_without_wildcards_pass_through() {
        assert_eq!(expand_wildcards("/a.jar:/b"), "/a.jar:/b");
    }

    #[cfg(not(windows))]
    #[test]
    fn expansion_applies_to_options() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.jar"), b"").unwrap();
        let option = classpath_option(&format!("{}/*", dir.path().display()), true, false).unwrap();
        assert_eq!(option, format!("-Djava.class.path={}", dir.path().join("only.jar").display()));
    }

    #[cfg(not(windows))]
    #[test]
    fn debugger_path_names_support_jars() {
        let cp = debugger_classpath(Path::new("/usr/jdk"), Path::new("/usr/jdk/jre"));
        assert_eq!(cp, "/usr/jdk/lib/tools.jar:/usr/jdk/lib/sa-jdi.jar:/usr/jdk/jre/classes");
    }
}
