use lijy_api::ExtraInfo;

const INITIAL_CAPACITY: usize = 4;

/// Parses a memory size such as `512m` or `1024k` into bytes.
///
/// Units are powers of 1024. At most one unit character may trail the digits.
pub fn parse_size(text: &str) -> Option<u64> {
    let digits_end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(idx, _)| idx);
    let (digits, unit) = text.split_at(digits_end);
    if digits.is_empty() {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    let multiplier: u64 = match unit {
        "" => 1,
        "k" | "K" => 1 << 10,
        "m" | "M" => 1 << 20,
        "g" | "G" => 1 << 30,
        "t" | "T" => 1 << 40,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

/// Sizes picked up from `-Xss`, `-Xmx` and `-Xms` as options are appended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemorySizes {
    pub thread_stack: Option<u64>,
    pub max_heap: Option<u64>,
    pub initial_heap: Option<u64>,
}

impl MemorySizes {
    fn observe(&mut self, option: &str) {
        let (slot, rest) = if let Some(rest) = option.strip_prefix("-Xss") {
            (&mut self.thread_stack, rest)
        } else if let Some(rest) = option.strip_prefix("-Xmx") {
            (&mut self.max_heap, rest)
        } else if let Some(rest) = option.strip_prefix("-Xms") {
            (&mut self.initial_heap, rest)
        } else {
            return;
        };
        if let Some(size) = parse_size(rest) {
            *slot = Some(size);
        }
    }
}

/// Whether an option string sets one of the tracked memory sizes.
pub fn is_memory_option(option: &str) -> bool {
    ["-Xss", "-Xmx", "-Xms"]
        .iter()
        .any(|prefix| option.starts_with(prefix))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvmOption {
    pub option: String,
    pub extra_info: ExtraInfo,
}

/// Ordered, append-only list of runtime initialization options.
#[derive(Debug, Default)]
pub struct OptionAssembler {
    options: Vec<JvmOption>,
    sizes: MemorySizes,
}

impl OptionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, option: impl Into<String>, extra_info: ExtraInfo) {
        let option = option.into();
        if self.options.len() == self.options.capacity() {
            let grown = self.options.capacity().saturating_mul(2).max(INITIAL_CAPACITY);
            self.options.reserve_exact(grown - self.options.len());
        }
        self.sizes.observe(&option);
        tracing::trace!(%option, "option appended");
        self.options.push(JvmOption { option, extra_info });
    }

    pub fn push(&mut self, option: impl Into<String>) {
        self.append(option, ExtraInfo::NONE);
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity()
    }

    pub fn sizes(&self) -> MemorySizes {
        self.sizes
    }

    pub fn as_slice(&self) -> &[JvmOption] {
        &self.options
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|entry| entry.option.as_str())
    }
}
