pub mod classpath;
pub mod debug;
pub mod jvm;
pub mod options;
pub mod variant;

use std::io;
use std::thread;
use std::time::Instant;

use derive_more::Display;
use lijy_api::JniError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::{LauncherConfig, PROP_TTY, PROP_UNAME};
use crate::loader::LoaderError;
use crate::paths::{Installation, PathError, cygpath};
use crate::runtime::classpath::{build_classpath, classpath_option, expand_wildcards};
use crate::runtime::debug::{render_command_line, rewrite_for_debugger};
use crate::runtime::options::{JvmOption, OptionAssembler};
use crate::runtime::variant::{Resolution, VariantError, VariantRequest, VariantTable, is_server_class_machine};
use crate::util::{PropertyLookup as _, TrueOrErr as _, build_option};

/// Entry class in the form the runtime's class lookup expects.
pub const ENTRY_CLASS: &str = "org/python/util/jython";
/// The same class as it appears on a command line.
pub const ENTRY_CLASS_NAME: &str = "org.python.util.jython";
pub const DEBUGGER_ENTRY: &str = "com/sun/tools/example/debug/tty/TTY";

const LAUNCHER_NAME: &str = "LIJY-LAUNCH";
const PROP_EXECUTABLE: &str = "python.executable";
const PROP_HOME: &str = "python.home";
const PROP_CONSOLE: &str = "python.console";
const PLAIN_CONSOLE: &str = "org.python.core.PlainConsole";
const PROFILE_VERIFIER: &str = "-XX:-UseSplitVerifier";
const PROFILE_AGENT: &str = "javalib/profile.jar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum BootState {
    Init,
    OptionsAssembled,
    VariantResolved,
    LibraryLoaded,
    RuntimeCreated,
    EntryRunning,
    Torndown,
}

/// How the launched application ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Uncaught fault in the application, or a failure reported by the runtime.
    Failure,
}

/// The class the worker thread starts, and what it is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub class: String,
    pub args: Vec<String>,
    /// In help mode the class's `usage` text is printed, followed by this text, instead of running it.
    pub help: Option<String>,
}

/// A loaded runtime library that can create an instance of the runtime.
pub trait RuntimeLibrary: Sync {
    type Instance: RuntimeInstance;

    fn default_stack_size(&self) -> Option<u64>;

    /// Creates the runtime, attaching the calling thread to it.
    fn create(&self, options: &[JvmOption]) -> Result<Self::Instance, JniError>;
}

pub trait RuntimeInstance {
    fn run_entry(&mut self, entry: &EntryPoint) -> anyhow::Result<Outcome>;
    fn detach(&mut self) -> Result<(), JniError>;
    /// Waits for the runtime's remaining non-daemon threads, then releases it.
    fn destroy(self) -> Result<(), JniError>;
}

#[derive(Debug, Display, Error)]
pub enum RuntimeError {
    #[display("bootstrap step {attempted} attempted while {current}")]
    OutOfOrder { current: BootState, attempted: BootState },
    Variant(#[from] VariantError),
    Loader(#[from] LoaderError),
    Path(#[from] PathError),
    #[display("Could not create the Java Virtual Machine: {_0}")]
    Create(#[source] JniError),
    #[display("could not start the main thread: {_0}")]
    Spawn(#[from] io::Error),
    #[display("main thread panicked")]
    WorkerPanicked,
}

/// Drives one launch from option assembly to teardown.
#[derive(Debug)]
pub struct Bootstrapper<'a> {
    config: &'a LauncherConfig,
    install: &'a Installation,
    state: BootState,
    options: OptionAssembler,
    resolution: Option<Resolution>,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(config: &'a LauncherConfig, install: &'a Installation) -> Self {
        Self {
            config,
            install,
            state: BootState::Init,
            options: OptionAssembler::new(),
            resolution: None,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    pub fn options(&self) -> &OptionAssembler {
        &self.options
    }

    fn transition(&mut self, expected: BootState, next: BootState) -> Result<(), RuntimeError> {
        (self.state == expected).or_error(RuntimeError::OutOfOrder {
            current: self.state,
            attempted: next,
        })?;
        debug!(from = %self.state, to = %next, "bootstrap transition");
        self.state = next;
        Ok(())
    }

    /// Builds the runtime option list. `forwarded` must already be free of variant selectors.
    pub fn assemble_options(&mut self, forwarded: &[String]) -> Result<(), RuntimeError> {
        (self.state == BootState::Init).or_error(RuntimeError::OutOfOrder {
            current: self.state,
            attempted: BootState::OptionsAssembled,
        })?;
        let config = self.config;
        let install = self.install;
        let options = &mut self.options;

        if config.trace {
            options.push("-Dsun.java.launcher.diag=true");
        }
        options.push(config.max_heap.as_str());
        options.push(config.stack_size.as_str());
        for flag in forwarded {
            options.push(flag.as_str());
        }

        let home = install.jar_dir().display().to_string();
        let jar = install.launcher_jar.display().to_string();
        let expand = !config.print;
        let classpath_options = if config.boot {
            vec![
                classpath_option(&config.classpath, expand, false),
                build_classpath(&home, &jar, &config.classpath, true).and_then(|cp| classpath_option(&cp, true, true)),
            ]
        } else {
            vec![build_classpath(&home, &jar, &config.classpath, false).and_then(|cp| classpath_option(&cp, expand, false))]
        };
        for option in classpath_options {
            match option {
                Some(option) => options.push(option),
                None => warn!("class path too long, not installed"),
            }
        }

        if let Some(env_classpath) = &config.env_classpath {
            push_built(options, "-Denv.class.path=", &expand_wildcards(env_classpath));
        }
        push_built(options, "-Dapplication.home=", &install.application_home().display().to_string());
        let command = std::iter::once(ENTRY_CLASS_NAME)
            .chain(config.app_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        push_built(options, "-Dsun.java.command=", &command);
        push_built(options, "-Dsun.java.launcher=", LAUNCHER_NAME);

        let properties = config.properties.as_slice();
        if !properties.defines(PROP_EXECUTABLE) {
            push_property(options, PROP_EXECUTABLE, &install.executable.display().to_string());
        }
        if !properties.defines(PROP_UNAME) {
            push_property(options, PROP_UNAME, &config.platform);
        }
        if !properties.defines(PROP_TTY) {
            push_property(options, PROP_TTY, if config.tty { "true" } else { "false" });
        }
        if !properties.defines(PROP_HOME) {
            let python_home = if config.is_cygwin() {
                cygpath(install.jar_dir())?
            } else {
                home.clone()
            };
            push_property(options, PROP_HOME, &python_home);
        }
        if config.is_cygwin() && !properties.defines(PROP_CONSOLE) {
            push_property(options, PROP_CONSOLE, PLAIN_CONSOLE);
        }
        for property in properties {
            options.push(property.as_str());
        }
        if cfg!(target_os = "linux") {
            push_built(options, "-Dsun.java.launcher.pid=", &std::process::id().to_string());
        }
        if config.profile {
            options.push(PROFILE_VERIFIER);
            let agent = install.jar_dir().join(PROFILE_AGENT);
            push_built(options, "-javaagent:", &agent.display().to_string());
        }

        debug!(count = options.len(), capacity = options.capacity(), "options assembled");
        self.transition(BootState::Init, BootState::OptionsAssembled)
    }

    pub fn resolve_variant(
        &mut self,
        table: &VariantTable,
        request: &VariantRequest,
    ) -> Result<Resolution, RuntimeError> {
        self.resolve_variant_with(table, request, is_server_class_machine)
    }

    pub fn resolve_variant_with(
        &mut self,
        table: &VariantTable,
        request: &VariantRequest,
        server_class: impl FnOnce() -> bool,
    ) -> Result<Resolution, RuntimeError> {
        self.transition(BootState::OptionsAssembled, BootState::VariantResolved)?;
        let resolution = table.resolve(request, false, server_class)?;
        debug!(%resolution, "variant resolved");
        self.resolution = Some(resolution.clone());
        Ok(resolution)
    }

    /// The equivalent `java` command line for the assembled options.
    pub fn command_line(&self) -> String {
        render_command_line(
            &self.install.java_home,
            self.config.debugger,
            &self.options,
            &self.config.app_args,
        )
    }

    pub fn load_library<T>(&mut self, load: impl FnOnce(&Resolution) -> Result<T, LoaderError>) -> Result<T, RuntimeError> {
        let resolution = self.resolution.clone().unwrap_or(Resolution::Error);
        self.transition(BootState::VariantResolved, BootState::LibraryLoaded)?;
        Ok(load(&resolution)?)
    }

    /// Creates the runtime on a worker thread, runs the entry point there and tears the runtime down.
    pub fn run<L: RuntimeLibrary>(&mut self, library: &L, help: Option<String>) -> Result<Outcome, RuntimeError> {
        (self.state == BootState::LibraryLoaded).or_error(RuntimeError::OutOfOrder {
            current: self.state,
            attempted: BootState::RuntimeCreated,
        })?;
        let (options, entry) = if self.config.debugger {
            let launch = rewrite_for_debugger(
                &self.options,
                &self.config.app_args,
                &self.install.java_home,
                &self.install.runtime_home,
            );
            let entry = EntryPoint {
                class: launch.entry.to_owned(),
                args: launch.args,
                help: None,
            };
            (launch.options, entry)
        } else {
            let entry = EntryPoint {
                class: ENTRY_CLASS.to_owned(),
                args: self.config.app_args.clone(),
                help,
            };
            (std::mem::take(&mut self.options), entry)
        };

        let stack_size = options
            .sizes()
            .thread_stack
            .filter(|size| *size > 0)
            .or_else(|| library.default_stack_size());
        let mut builder = thread::Builder::new().name("main".to_owned());
        if let Some(size) = stack_size {
            builder = builder.stack_size(usize::try_from(size).unwrap_or(usize::MAX));
        }
        debug!(?stack_size, entry = %entry.class, "starting main thread");

        let state = &mut self.state;
        let outcome = thread::scope(|scope| {
            let worker = builder.spawn_scoped(scope, || run_worker(library, options.as_slice(), &entry, state))?;
            worker.join().map_err(|_| RuntimeError::WorkerPanicked)?
        });
        self.state = BootState::Torndown;
        outcome
    }
}

fn push_built(options: &mut OptionAssembler, prefix: &str, value: &str) {
    match build_option(prefix, value) {
        Some(option) => options.push(option),
        None => warn!(prefix, "option too long, not installed"),
    }
}

fn push_property(options: &mut OptionAssembler, name: &str, value: &str) {
    push_built(options, &format!("-D{name}="), value);
}

/// Body of the worker thread. Once the runtime exists it is always detached, then destroyed.
fn run_worker<L: RuntimeLibrary>(
    library: &L,
    options: &[JvmOption],
    entry: &EntryPoint,
    state: &mut BootState,
) -> Result<Outcome, RuntimeError> {
    let start = Instant::now();
    let mut instance = library.create(options).map_err(RuntimeError::Create)?;
    *state = BootState::RuntimeCreated;
    debug!(elapsed_us = start.elapsed().as_micros(), "runtime created");

    *state = BootState::EntryRunning;
    let mut outcome = instance.run_entry(entry).unwrap_or_else(|err| {
        error!("{err:#}");
        Outcome::Failure
    });
    if let Err(err) = instance.detach() {
        error!("could not detach main thread: {err}");
        outcome = Outcome::Failure;
    }
    if let Err(err) = instance.destroy() {
        warn!("could not destroy the Java Virtual Machine: {err}");
    }
    *state = BootState::Torndown;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use lijy_api::misc::JniStatus;

    use super::*;
    use crate::config::Environment;
    use crate::config::cli::CliArgs;

    fn config(args: &[&str]) -> LauncherConfig {
        let cli = CliArgs::parse(std::iter::once("jython").chain(args.iter().copied())).unwrap();
        LauncherConfig::with_defaults(cli, &Environment::default(), "linux".into(), false)
    }

    fn install() -> Installation {
        Installation {
            java_home: PathBuf::from("/jdk"),
            runtime_home: PathBuf::from("/jdk/jre"),
            launcher_home: PathBuf::from("/opt/jython"),
            launcher_jar: PathBuf::from("/opt/jython/jython.jar"),
            executable: PathBuf::from("/opt/jython/bin/jython"),
            arch: "amd64",
        }
    }

    #[derive(Default)]
    struct MockLibrary {
        events: Arc<Mutex<Vec<String>>>,
        fail_create: bool,
        fail_detach: bool,
        fault: bool,
        default_stack: Option<u64>,
    }

    struct MockInstance {
        events: Arc<Mutex<Vec<String>>>,
        fail_detach: bool,
        fault: bool,
    }

    impl MockLibrary {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RuntimeLibrary for MockLibrary {
        type Instance = MockInstance;

        fn default_stack_size(&self) -> Option<u64> {
            self.events.lock().unwrap().push("default_stack_size".into());
            self.default_stack
        }

        fn create(&self, options: &[JvmOption]) -> Result<MockInstance, JniError> {
            self.events.lock().unwrap().push(format!("create:{}", options.len()));
            if self.fail_create {
                return Err(JniStatus::NoMemory.into());
            }
            Ok(MockInstance {
                events: Arc::clone(&self.events),
                fail_detach: self.fail_detach,
                fault: self.fault,
            })
        }
    }

    impl RuntimeInstance for MockInstance {
        fn run_entry(&mut self, entry: &EntryPoint) -> anyhow::Result<Outcome> {
            self.events.lock().unwrap().push(format!("run:{}", entry.class));
            Ok(if self.fault { Outcome::Failure } else { Outcome::Success })
        }

        fn detach(&mut self) -> Result<(), JniError> {
            self.events.lock().unwrap().push("detach".into());
            if self.fail_detach {
                return Err(JniStatus::Detached.into());
            }
            Ok(())
        }

        fn destroy(self) -> Result<(), JniError> {
            self.events.lock().unwrap().push("destroy".into());
            Ok(())
        }
    }

    fn ready<'a>(config: &'a LauncherConfig, install: &'a Installation) -> Bootstrapper<'a> {
        let table = VariantTable::parse("jvm.cfg", "-server KNOWN\n");
        let mut boot = Bootstrapper::new(config, install);
        boot.assemble_options(&config.forwarded).unwrap();
        boot.resolve_variant_with(&table, &VariantRequest::Default, || false).unwrap();
        boot.load_library(|_| Ok(())).unwrap();
        boot
    }

    #[test]
    fn options_follow_launch_order() {
        let config = config(&["-Dfoo=bar", "-J-Xint", "script.py", "-v"]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&config.forwarded).unwrap();
        let options: Vec<_> = boot.options().iter().collect();
        assert_eq!(&options[..3], ["-Xmx512m", "-Xss1024k", "-Xint"]);
        assert!(options[3].starts_with("-Djava.class.path=/opt/jython/jython.jar"));
        assert!(options.contains(&"-Dapplication.home=/opt/jython"));
        assert!(options.contains(&"-Dsun.java.command=org.python.util.jython script.py -v"));
        assert!(options.contains(&"-Dsun.java.launcher=LIJY-LAUNCH"));
        assert!(options.contains(&"-Dpython.home=/opt/jython"));
        assert!(options.contains(&"-Dpython.launcher.uname=linux"));
        assert!(options.contains(&"-Dpython.launcher.tty=false"));
        assert!(!options.iter().any(|option| option.starts_with("-Dpython.console=")));
        let user = options.iter().position(|option| *option == "-Dfoo=bar").unwrap();
        let launcher = options.iter().position(|option| option.starts_with("-Dsun.java.launcher=")).unwrap();
        assert!(user > launcher);
        assert_eq!(boot.state(), BootState::OptionsAssembled);
        assert_eq!(boot.options().sizes().max_heap, Some(512 << 20));
    }

    #[test]
    fn user_properties_suppress_defaults() {
        let config = config(&["-Dpython.home=/elsewhere", "-Dpython.executable=/bin/jy"]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&[]).unwrap();
        let homes = boot.options().iter().filter(|option| option.starts_with("-Dpython.home=")).count();
        assert_eq!(homes, 1);
        assert!(boot.options().iter().any(|option| option == "-Dpython.executable=/bin/jy"));
    }

    #[test]
    fn boot_mode_installs_both_paths() {
        let config = config(&["--boot", "-J-cp", "/app"]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&[]).unwrap();
        let options: Vec<_> = boot.options().iter().collect();
        let classpath = options.iter().position(|option| *option == "-Djava.class.path=/app").unwrap();
        let bootpath = options
            .iter()
            .position(|option| option.starts_with("-Xbootclasspath/a:/opt/jython/jython.jar"))
            .unwrap();
        assert_eq!(bootpath, classpath + 1);
    }

    #[test]
    fn profile_adds_agent() {
        let config = config(&["--profile"]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&[]).unwrap();
        let options: Vec<_> = boot.options().iter().collect();
        assert_eq!(
            &options[options.len() - 2..],
            ["-XX:-UseSplitVerifier", "-javaagent:/opt/jython/javalib/profile.jar"]
        );
    }

    #[test]
    fn steps_must_run_in_order() {
        let config = config(&[]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        let table = VariantTable::parse("jvm.cfg", "-server KNOWN\n");
        let err = boot.resolve_variant_with(&table, &VariantRequest::Default, || false).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::OutOfOrder { current: BootState::Init, attempted: BootState::VariantResolved }
        ));
        assert!(matches!(boot.run(&MockLibrary::default(), None), Err(RuntimeError::OutOfOrder { .. })));
        boot.assemble_options(&[]).unwrap();
        assert!(boot.assemble_options(&[]).is_err());
    }

    #[test]
    fn resolution_failure_stops_before_loading() {
        let config = config(&[]);
        let install = install();
        let mut boot = Bootstrapper::new(&config, &install);
        boot.assemble_options(&[]).unwrap();
        let table = VariantTable::parse("jvm.cfg", "-server KNOWN\n-fast ALIASED_TO -turbo\n");
        let err = boot
            .resolve_variant_with(&table, &VariantRequest::Flag("-fast".into()), || false)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Variant(VariantError::MissingAlias(_))));
    }

    #[test]
    fn detach_precedes_destroy() {
        let config = config(&["script.py"]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary::default();
        assert_eq!(boot.run(&library, None).unwrap(), Outcome::Success);
        let events = library.events();
        assert!(events[0].starts_with("create:"));
        assert_eq!(&events[1..], ["run:org/python/util/jython", "detach", "destroy"]);
        assert_eq!(boot.state(), BootState::Torndown);
    }

    #[test]
    fn fault_is_a_failure_after_teardown() {
        let config = config(&[]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary { fault: true, ..MockLibrary::default() };
        assert_eq!(boot.run(&library, None).unwrap(), Outcome::Failure);
        assert!(library.events().ends_with(&["detach".to_owned(), "destroy".to_owned()]));
    }

    #[test]
    fn detach_failure_forces_failure() {
        let config = config(&[]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary { fail_detach: true, ..MockLibrary::default() };
        assert_eq!(boot.run(&library, None).unwrap(), Outcome::Failure);
        assert!(library.events().ends_with(&["detach".to_owned(), "destroy".to_owned()]));
    }

    #[test]
    fn create_failure_never_detaches() {
        let config = config(&[]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary { fail_create: true, ..MockLibrary::default() };
        assert!(matches!(boot.run(&library, None), Err(RuntimeError::Create(_))));
        let events = library.events();
        assert!(!events.iter().any(|event| event == "detach" || event == "destroy"));
    }

    #[test]
    fn stack_size_from_options_skips_runtime_default() {
        let config = config(&[]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary { default_stack: Some(1 << 20), ..MockLibrary::default() };
        boot.run(&library, None).unwrap();
        assert!(!library.events().iter().any(|event| event == "default_stack_size"));
    }

    #[test]
    fn runtime_default_used_without_stack_option() {
        let mut config = config(&[]);
        config.stack_size = "-Xsslarge".into();
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary { default_stack: Some(1 << 20), ..MockLibrary::default() };
        boot.run(&library, None).unwrap();
        assert_eq!(library.events()[0], "default_stack_size");
    }

    #[test]
    fn zero_stack_size_defers_to_runtime_default() {
        let mut config = config(&[]);
        config.stack_size = "-Xss0".into();
        let install = install();
        let mut boot = ready(&config, &install);
        assert_eq!(boot.options().sizes().thread_stack, Some(0));
        let library = MockLibrary { default_stack: Some(1 << 20), ..MockLibrary::default() };
        boot.run(&library, None).unwrap();
        assert_eq!(library.events()[0], "default_stack_size");
    }

    #[test]
    fn debugger_mode_starts_debugger_entry() {
        let config = config(&["--jdb", "script.py"]);
        let install = install();
        let mut boot = ready(&config, &install);
        let library = MockLibrary::default();
        boot.run(&library, None).unwrap();
        let events = library.events();
        assert_eq!(events[0], "create:4");
        assert_eq!(events[1], "run:com/sun/tools/example/debug/tty/TTY");
    }
}
