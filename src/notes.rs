//! Note editing rules.
//!
//! Some actors may only append to the stored note. Appending is judged by
//! prefix comparison against the note as last saved, so an edit that keeps
//! the saved text as a prefix is accepted as an append even when it only adds
//! whitespace.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteAccess {
    Full,
    /// Only text after `locked_prefix` may change.
    AppendOnly { locked_prefix: String },
    ReadOnly,
}

impl NoteAccess {
    /// Returns the note to keep after the user typed `value`, or `None` when
    /// the edit is refused outright.
    pub fn apply(&self, value: &str) -> Option<String> {
        match self {
            NoteAccess::Full => Some(value.to_string()),
            NoteAccess::AppendOnly { locked_prefix } => Some(keep_prefix(locked_prefix, value)),
            NoteAccess::ReadOnly => None,
        }
    }
}

/// Forces `value` to start with `base`, salvaging whatever was typed past
/// the length of `base`.
pub fn keep_prefix(base: &str, value: &str) -> String {
    if base.is_empty() || value.starts_with(base) {
        return value.to_string();
    }
    if base.starts_with(value) {
        return base.to_string();
    }
    let appended = value.get(base.len()..).unwrap_or("");
    format!("{base}{appended}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appending_is_kept() {
        assert_eq!(keep_prefix("first", "first, second"), "first, second");
        assert_eq!(keep_prefix("", "anything"), "anything");
    }

    #[test]
    fn deleting_into_the_prefix_restores_it() {
        assert_eq!(keep_prefix("first", "fir"), "first");
    }

    #[test]
    fn rewriting_the_prefix_keeps_only_the_tail() {
        assert_eq!(keep_prefix("first", "FIRST more"), "first more");
        assert_eq!(keep_prefix("first", "nope"), "first");
    }

    #[test]
    fn read_only_refuses() {
        assert_eq!(NoteAccess::ReadOnly.apply("x"), None);
        assert_eq!(NoteAccess::Full.apply("x"), Some("x".to_string()));
    }
}
