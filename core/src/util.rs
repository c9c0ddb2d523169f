/// Concatenates `parts`, summing their lengths with checked arithmetic.
///
/// `None` means the combined length does not fit in `usize`.
pub fn checked_concat(parts: &[&str]) -> Option<String> {
    let total = parts
        .iter()
        .try_fold(0usize, |acc, part| acc.checked_add(part.len()))?;
    let mut joined = String::with_capacity(total);
    for part in parts {
        joined.push_str(part);
    }
    Some(joined)
}

/// Builds a `<prefix><value>` option string.
pub fn build_option(prefix: &str, value: &str) -> Option<String> {
    checked_concat(&[prefix, value])
}

pub trait TrueOrErr {
    fn or_error<E>(self, error: E) -> Result<(), E>;
}

impl TrueOrErr for bool {
    fn or_error<E>(self, error: E) -> Result<(), E> {
        match self {
            true => Ok(()),
            false => Err(error),
        }
    }
}

/// Looks up whether a `-D<name>=` definition is present.
pub trait PropertyLookup {
    fn defines(&self, name: &str) -> bool;
    fn value_of(&self, name: &str) -> Option<&str>;
}

impl<S: AsRef<str>> PropertyLookup for [S] {
    fn defines(&self, name: &str) -> bool {
        self.value_of(name).is_some()
    }

    fn value_of(&self, name: &str) -> Option<&str> {
        self.iter().rev().find_map(|definition| {
            definition
                .as_ref()
                .strip_prefix("-D")?
                .strip_prefix(name)?
                .strip_prefix('=')
        })
    }
}
