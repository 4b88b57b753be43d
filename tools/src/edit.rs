//! String replacement for the `edit_file` tool.

use std::fmt;

/// Why a replacement could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    NotFound,
    Ambiguous { occurrences: usize },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("old_string not found in file"),
            Self::Ambiguous { occurrences } => write!(
                f,
                "old_string found {occurrences} times in file, must be unique or use replace_all"
            ),
        }
    }
}

/// Apply one edit to `content`.
///
/// An empty `old` appends `new`. Otherwise `old` must occur exactly once unless
/// `replace_all` is set, in which case every occurrence is replaced (zero is fine).
pub fn apply_edit(content: &str, old: &str, new: &str, replace_all: bool) -> Result<String, EditError> {
    if old.is_empty() {
        let mut out = String::with_capacity(content.len() + new.len());
        out.push_str(content);
        out.push_str(new);
        return Ok(out);
    }

    if replace_all {
        return Ok(content.replace(old, new));
    }

    match content.matches(old).count() {
        0 => Err(EditError::NotFound),
        1 => Ok(content.replacen(old, new, 1)),
        occurrences => Err(EditError::Ambiguous { occurrences }),
    }
}

#[cfg(test)]
mod tests {
    use super::{EditError, apply_edit};

    #[test]
    fn unique_match_is_replaced() {
        assert_eq!(apply_edit("a b c", "b", "x", false).unwrap(), "a x c");
    }

    #[test]
    fn empty_old_appends() {
        assert_eq!(apply_edit("line\n", "", "more\n", false).unwrap(), "line\nmore\n");
    }

    #[test]
    fn missing_match_is_rejected() {
        let err = apply_edit("abc", "z", "y", false).unwrap_err();
        assert_eq!(err, EditError::NotFound);
        assert_eq!(err.to_string(), "old_string not found in file");
    }

    #[test]
    fn ambiguous_match_reports_count() {
        let err = apply_edit("x x x", "x", "y", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "old_string found 3 times in file, must be unique or use replace_all"
        );
    }

    #[test]
    fn replace_all_replaces_every_occurrence() {
        assert_eq!(apply_edit("x x x", "x", "y", true).unwrap(), "y y y");
        assert_eq!(apply_edit("abc", "z", "y", true).unwrap(), "abc");
    }

    #[test]
    fn overlapping_needle_counts_non_overlapping() {
        // "aa" occurs once non-overlapping in "aaa".
        assert_eq!(apply_edit("aaa", "aa", "b", false).unwrap(), "ba");
    }
}
