//! The `jvm.cfg` variant table and variant selection.
//!
//! Each record names a runtime variant in flag form (`-server`) together with
//! how a request for it is treated. The first record is the default variant.

use std::fs;
use std::path::{Path, PathBuf};

use derive_more::Display;
use sysinfo::System;
use thiserror::Error;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "jvm.cfg";
const ALT_VARIANT_PREFIX: &str = "-XXaltjvm=";
const SERVER_CLASS_CPUS: usize = 2;
const SERVER_CLASS_MEMORY: u64 = (2 << 30) - (256 << 20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantKind {
    Known,
    AliasedTo(String),
    Warn,
    Error,
    IfServerClass(String),
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Flag form, leading `-` retained.
    pub name: String,
    pub kind: VariantKind,
}

impl VariantDescriptor {
    /// The name without its leading `-`, as used for directory lookups.
    pub fn bare_name(&self) -> &str {
        self.name.strip_prefix('-').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantRequest {
    Default,
    /// A flag that names a table entry.
    Flag(String),
    /// A raw variant name or path that bypasses the table.
    Alternate(String),
}

impl VariantRequest {
    /// Picks the variant selection out of the forwarded runtime flags.
    ///
    /// Selection flags are removed from `forwarded`; the last one given wins.
    /// `alternate_env` is used when no flag selects anything.
    pub fn from_flags(table: &VariantTable, forwarded: &mut Vec<String>, alternate_env: Option<&str>) -> Self {
        let mut request = alternate_env
            .filter(|name| !name.is_empty())
            .map_or(Self::Default, |name| Self::Alternate(name.to_owned()));
        forwarded.retain(|flag| {
            if table.index_of(flag).is_some() {
                request = Self::Flag(flag.clone());
                false
            } else if let Some(name) = flag.strip_prefix(ALT_VARIANT_PREFIX) {
                request = Self::Alternate(name.to_owned());
                false
            } else {
                true
            }
        });
        request
    }
}

/// Outcome of resolving a request against the table.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Resolution {
    /// Bare variant name found through the table.
    #[display("{_0}")]
    Variant(String),
    /// Name or path supplied as an alternate variant.
    #[display("{_0}")]
    Alternate(String),
    /// Speculative resolution failed.
    #[display("ERROR")]
    Error,
}

/// Result of following `ALIASED_TO` edges from one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasWalk {
    Resolved(usize),
    Cycle,
    MissingTarget(String),
}

#[derive(Debug, Display, Error)]
pub enum VariantError {
    #[display("could not open `{}': {_1}", _0.display())]
    Unreadable(PathBuf, #[source] std::io::Error),
    #[display("no known VMs (check for corrupt jvm.cfg file)")]
    Empty,
    #[display("corrupt jvm.cfg file; cycle in alias list")]
    AliasCycle,
    #[display("unable to resolve VM alias {_0}")]
    MissingAlias(String),
    #[display("{_0} VM not supported")]
    Unsupported(String),
    #[display("{_0} is not a known VM")]
    Unknown(String),
}

#[derive(Debug, Clone, Default)]
pub struct VariantTable {
    source: String,
    entries: Vec<VariantDescriptor>,
}

impl VariantTable {
    /// Parses the records of a configuration file.
    ///
    /// Malformed records are reported and skipped; they never fail the parse.
    pub fn parse(source: &str, text: &str) -> Self {
        let mut entries = Vec::new();
        for (lineno, line) in (1..).zip(text.lines()) {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if !line.starts_with('-') {
                warn!("no leading - on line {lineno} of `{source}'");
            }
            let mut tokens = line.split_whitespace();
            let (Some(name), Some(keyword)) = (tokens.next(), tokens.next()) else {
                warn!("missing VM type on line {lineno} of `{source}'");
                continue;
            };
            let kind = match keyword {
                "KNOWN" => VariantKind::Known,
                "WARN" => VariantKind::Warn,
                "IGNORE" => VariantKind::Ignore,
                "ERROR" => VariantKind::Error,
                "ALIASED_TO" => {
                    let Some(target) = tokens.next() else {
                        warn!("missing VM type on line {lineno} of `{source}'");
                        continue;
                    };
                    VariantKind::AliasedTo(target.to_owned())
                }
                "IF_SERVER_CLASS" => {
                    let Some(alternative) = tokens.next() else {
                        warn!("missing server class VM on line {lineno} of `{source}'");
                        continue;
                    };
                    VariantKind::IfServerClass(alternative.to_owned())
                }
                _ => {
                    warn!("unknown VM type on line {lineno} of `{source}'");
                    VariantKind::Known
                }
            };
            debug!(index = entries.len(), name, ?kind, "variant entry");
            entries.push(VariantDescriptor {
                name: name.to_owned(),
                kind,
            });
        }
        Self {
            source: source.to_owned(),
            entries,
        }
    }

    /// Reads and parses `path`.
    ///
    /// A speculative load reports an unreadable file as `Ok(None)`.
    pub fn load(path: &Path, speculative: bool) -> Result<Option<Self>, VariantError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&path.display().to_string(), &text))),
            Err(_) if speculative => Ok(None),
            Err(err) => Err(VariantError::Unreadable(path.to_path_buf(), err)),
        }
    }

    /// Loads the table of a runtime installation.
    ///
    /// `<home>/lib/<arch>/jvm.cfg` is preferred over `<home>/lib/jvm.cfg`.
    pub fn locate(runtime_home: &Path, arch: &str) -> Result<Self, VariantError> {
        let lib = runtime_home.join("lib");
        let table = match Self::load(&lib.join(arch).join(CONFIG_FILE), true)? {
            Some(table) => table,
            None => Self::load(&lib.join(CONFIG_FILE), false)?.ok_or(VariantError::Empty)?,
        };
        if table.is_empty() {
            return Err(VariantError::Empty);
        }
        Ok(table)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entries(&self) -> &[VariantDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the entry for `flag`, accepting the `-J` forwarding marker.
    pub fn index_of(&self, flag: &str) -> Option<usize> {
        let flag = flag.strip_prefix("-J").unwrap_or(flag);
        self.entries.iter().position(|entry| entry.name == flag)
    }

    /// Follows alias edges from `start`, taking at most `len()` steps.
    pub fn walk_aliases(&self, start: usize) -> AliasWalk {
        let mut current = start;
        for _ in 0..=self.entries.len() {
            let VariantKind::AliasedTo(target) = &self.entries[current].kind else {
                return AliasWalk::Resolved(current);
            };
            match self.index_of(target) {
                Some(next) => current = next,
                None => return AliasWalk::MissingTarget(target.clone()),
            }
        }
        AliasWalk::Cycle
    }

    /// Resolves `request` to the variant that should be loaded.
    ///
    /// With `speculative` set, configuration errors yield [`Resolution::Error`]
    /// instead of failing. `server_class` is only consulted for a default
    /// request whose first entry is `IF_SERVER_CLASS`.
    pub fn resolve(
        &self,
        request: &VariantRequest,
        speculative: bool,
        server_class: impl FnOnce() -> bool,
    ) -> Result<Resolution, VariantError> {
        let default = self.entries.first().ok_or(VariantError::Empty)?;
        let start = match request {
            VariantRequest::Alternate(name) => return Ok(Resolution::Alternate(name.clone())),
            VariantRequest::Default => {
                let chosen = match &default.kind {
                    VariantKind::IfServerClass(alternative) if server_class() => {
                        alternative.strip_prefix('-').unwrap_or(alternative)
                    }
                    _ => default.bare_name(),
                };
                debug!(variant = chosen, "default VM");
                return Ok(Resolution::Variant(chosen.to_owned()));
            }
            VariantRequest::Flag(flag) => self
                .index_of(flag)
                .ok_or_else(|| VariantError::Unknown(flag.clone()))?,
        };

        let failed = |err: VariantError| if speculative { Ok(Resolution::Error) } else { Err(err) };
        let terminal = match self.walk_aliases(start) {
            AliasWalk::Resolved(idx) => &self.entries[idx],
            AliasWalk::Cycle => return failed(VariantError::AliasCycle),
            AliasWalk::MissingTarget(target) => return failed(VariantError::MissingAlias(target)),
        };
        match terminal.kind {
            VariantKind::Warn => {
                if !speculative {
                    warn!(
                        "{} VM not supported; {} VM will be used",
                        terminal.bare_name(),
                        default.bare_name()
                    );
                }
                Ok(Resolution::Variant(default.bare_name().to_owned()))
            }
            VariantKind::Ignore => Ok(Resolution::Variant(default.bare_name().to_owned())),
            VariantKind::Error => failed(VariantError::Unsupported(terminal.bare_name().to_owned())),
            VariantKind::Known | VariantKind::IfServerClass(_) | VariantKind::AliasedTo(_) => {
                Ok(Resolution::Variant(terminal.bare_name().to_owned()))
            }
        }
    }

    /// Lines describing the selectable variants, for the help text.
    pub fn usage_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let bare = entry.bare_name();
            match &entry.kind {
                VariantKind::Known if idx == 0 => {
                    lines.push(format!("    {:<12} to select the \"{bare}\" VM (default)", entry.name));
                }
                VariantKind::Known => {
                    lines.push(format!("    {:<12} to select the \"{bare}\" VM", entry.name));
                }
                VariantKind::AliasedTo(target) => {
                    lines.push(format!("    {:<12} is a synonym for the \"{}\" VM", entry.name, target.trim_start_matches('-')));
                }
                VariantKind::IfServerClass(alternative) if idx == 0 => {
                    lines.push(format!(
                        "    {:<12} to select the \"{bare}\" VM (default, \"{}\" on server-class machines)",
                        entry.name,
                        alternative.trim_start_matches('-')
                    ));
                }
                VariantKind::Warn | VariantKind::Ignore | VariantKind::Error | VariantKind::IfServerClass(_) => {}
            }
        }
        lines
    }
}

/// Machine classification used by `IF_SERVER_CLASS` defaults.
pub fn is_server_class_machine() -> bool {
    let mut system = System::new();
    system.refresh_cpu_all();
    system.refresh_memory();
    let cpus = system.cpus().len();
    let memory = system.total_memory();
    debug!(cpus, memory, "server-class check");
    cpus >= SERVER_CLASS_CPUS && memory >= SERVER_CLASS_MEMORY
}
