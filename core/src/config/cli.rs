use derive_more::Display;
use thiserror::Error;

/// Short usage, printed after a bad launcher option.
pub const USAGE: &str = "\
usage: jython [option] ... [-c cmd | -m mod | file | -] [arg] ...
Try `jython -h' for more information.
";

/// Launcher-specific part of the `--help` text.
pub const LAUNCHER_HELP: &str = "\
Jython launcher-specific options:
-Dname=value : pass name=value property to Java VM (e.g. -Dpython.path=/a/b/c)
-Jarg    : pass argument through to Java VM (e.g. -J-Xmx512m)
--boot   : speeds up launch performance by putting Jython jars on the boot classpath
--help   : this help message
--jdb    : run under JDB java debugger
--print  : print the Java command with args for launching Jython instead of executing it
--profile: run with the Java Interactive Profiler (http://jiprof.sf.net)
--       : pass remaining arguments through to Jython
Jython launcher environment variables:
JAVA_MEM   : Java memory (sets via -Xmx)
JAVA_STACK : Java stack size (sets via -Xss)
JAVA_HOME  : Java installation directory
JYTHON_HOME: Jython installation directory
";

/// One command-line token, classified by the launcher's own dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LauncherArg<'a> {
    Property(&'a str),
    ClasspathFlag,
    MaxHeap(&'a str),
    StackSize(&'a str),
    Forwarded(&'a str),
    Print,
    Help,
    Boot,
    Jdb,
    Profile,
    Passthrough(&'a str),
    Operand,
}

impl<'a> From<&'a str> for LauncherArg<'a> {
    fn from(arg: &'a str) -> Self {
        match arg {
            "-J-classpath" | "-J-cp" => Self::ClasspathFlag,
            "--print" => Self::Print,
            "-h" | "--help" => Self::Help,
            "--boot" => Self::Boot,
            "--jdb" => Self::Jdb,
            "--profile" => Self::Profile,
            _ if arg.starts_with("-D") => Self::Property(arg),
            _ if arg.starts_with("-J-Xmx") => Self::MaxHeap(&arg[2..]),
            _ if arg.starts_with("-J-Xss") => Self::StackSize(&arg[2..]),
            _ if arg.starts_with("-J") => Self::Forwarded(&arg[2..]),
            _ if arg.starts_with("--") => Self::Passthrough(arg),
            _ => Self::Operand,
        }
    }
}

/// The command line split into launcher settings and application arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub program: String,
    pub properties: Vec<String>,
    pub forwarded: Vec<String>,
    pub classpath: Option<String>,
    pub max_heap: Option<String>,
    pub stack_size: Option<String>,
    pub boot: bool,
    pub jdb: bool,
    pub profile: bool,
    pub help: bool,
    pub print: bool,
    pub passthrough: Vec<String>,
}

impl CliArgs {
    /// Classifies `args`, the first of which is the program name.
    ///
    /// Scanning stops at the first token that is not a launcher flag; it and
    /// everything after it belong to the application.
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut parsed = Self {
            program: args.next().unwrap_or_default(),
            ..Self::default()
        };
        while let Some(arg) = args.next() {
            match LauncherArg::from(arg.as_str()) {
                LauncherArg::Property(definition) => parsed.properties.push(definition.to_owned()),
                LauncherArg::ClasspathFlag => {
                    let value = args.next().ok_or(CliError::MissingClasspath)?;
                    if value.starts_with('-') {
                        return Err(CliError::BadClasspath);
                    }
                    parsed.classpath = Some(value);
                }
                LauncherArg::MaxHeap(option) => parsed.max_heap = Some(option.to_owned()),
                LauncherArg::StackSize(option) => parsed.stack_size = Some(option.to_owned()),
                LauncherArg::Forwarded(flag) => parsed.forwarded.push(flag.to_owned()),
                LauncherArg::Print => parsed.print = true,
                LauncherArg::Help => parsed.help = true,
                LauncherArg::Boot => parsed.boot = true,
                LauncherArg::Jdb => parsed.jdb = true,
                LauncherArg::Profile => parsed.profile = true,
                LauncherArg::Passthrough(arg) => parsed.passthrough.push(arg.to_owned()),
                LauncherArg::Operand => {
                    parsed.passthrough.push(arg);
                    parsed.passthrough.extend(args.by_ref());
                }
            }
        }
        Ok(parsed)
    }
}

#[derive(Debug, Error, Display, PartialEq, Eq)]
pub enum CliError {
    #[display("Argument expected for -J-classpath option")]
    MissingClasspath,
    #[display("Bad option for -J-classpath")]
    BadClasspath,
}
