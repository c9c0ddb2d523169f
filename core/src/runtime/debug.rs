//! Reshaping a launch for the command-line debugger, and the `--print` rendering.

use std::path::Path;

use crate::runtime::classpath::{CLASSPATH_OPTION, classpath_option, debugger_classpath};
use crate::runtime::options::{JvmOption, OptionAssembler, is_memory_option};
use crate::runtime::{DEBUGGER_ENTRY, ENTRY_CLASS_NAME};

const DEBUGGER_INITIAL_HEAP: &str = "-Xms8m";

/// A launch that starts the debugger, which in turn starts the application.
#[derive(Debug)]
pub struct DebugLaunch {
    pub options: OptionAssembler,
    pub entry: &'static str,
    pub args: Vec<String>,
}

/// Command-line tokens for `options`, as a `java`-style front end expects them.
///
/// The class path becomes `-classpath <value>`; it is never quoted because the
/// debugger rejects quoted class paths. Other options with whitespace get the
/// part after `=` quoted.
pub fn command_tokens(options: &[JvmOption]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(options.len() + 1);
    for JvmOption { option, .. } in options {
        if let Some(classpath) = option.strip_prefix(CLASSPATH_OPTION) {
            tokens.push("-classpath".to_owned());
            tokens.push(classpath.to_owned());
        } else if option.contains(char::is_whitespace) {
            tokens.push(quote_value(option));
        } else {
            tokens.push(option.clone());
        }
    }
    tokens
}

fn quote_value(option: &str) -> String {
    match option.split_once('=') {
        Some((name, value)) => format!("{name}=\"{value}\""),
        None => option.to_owned(),
    }
}

/// Moves the application launch behind the debugger's entry class.
///
/// The application options become debugger arguments, followed by the
/// application class and its arguments. The runtime itself only gets the
/// memory options, a small initial heap and the debugger's class path.
pub fn rewrite_for_debugger(
    options: &OptionAssembler,
    app_args: &[String],
    java_home: &Path,
    runtime_home: &Path,
) -> DebugLaunch {
    let mut args = command_tokens(options.as_slice());
    args.push(ENTRY_CLASS_NAME.to_owned());
    args.extend(app_args.iter().cloned());

    let mut reduced = OptionAssembler::new();
    for entry in options.as_slice() {
        if is_memory_option(&entry.option) {
            reduced.append(entry.option.clone(), entry.extra_info);
        }
    }
    reduced.push(DEBUGGER_INITIAL_HEAP);
    if let Some(option) = classpath_option(&debugger_classpath(java_home, runtime_home), true, false) {
        reduced.push(option);
    }

    DebugLaunch {
        options: reduced,
        entry: DEBUGGER_ENTRY,
        args,
    }
}

/// The equivalent `java` (or `jdb`) command line.
pub fn render_command_line(java_home: &Path, debugger: bool, options: &OptionAssembler, app_args: &[String]) -> String {
    let program = java_home
        .join("bin")
        .join(if debugger { "jdb" } else { "java" });
    let mut tokens = vec![program.display().to_string()];
    tokens.extend(command_tokens(options.as_slice()));
    tokens.push(ENTRY_CLASS_NAME.to_owned());
    tokens.extend(app_args.iter().cloned());
    tokens.join(" ")
}
