//! # Composite cursors
//!
//! One pagination token carrying two independently advancing sub-cursors,
//! private side first: `"<private>|<public>"`.
//!
//! - only the first `|` separates the sides, so sub-cursors must never contain one
//! - a side whose sub-cursor is the literal `"undefined"` is exhausted and is not
//!   fetched again
//! - a missing token means both sides start from the beginning
//!
//! A token without any `|` is read as a private sub-cursor with a fresh public
//! side, and an empty sub-cursor is read as a fresh start.

use std::fmt;

/// Separator between the private and public sub-cursors
pub const CURSOR_SEPARATOR: char = '|';
/// Literal marking an exhausted side
pub const EXHAUSTED_CURSOR: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubCursor {
    /// Fetch from the beginning
    Start,
    At(String),
    /// Nothing further; never fetch this side again
    Exhausted,
}

impl SubCursor {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => SubCursor::Start,
            Some(EXHAUSTED_CURSOR) => SubCursor::Exhausted,
            Some(cursor) => SubCursor::At(cursor.to_string()),
        }
    }

    /// The next sub-cursor as reported by a source after a fetch
    pub fn next(cursor: Option<String>) -> Self {
        match cursor {
            Some(cursor) if cursor != EXHAUSTED_CURSOR => SubCursor::At(cursor),
            _ => SubCursor::Exhausted,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, SubCursor::Exhausted)
    }

    /// The cursor to hand to the underlying source
    pub fn as_request(&self) -> Option<String> {
        match self {
            SubCursor::At(cursor) => Some(cursor.clone()),
            SubCursor::Start | SubCursor::Exhausted => None,
        }
    }
}

impl fmt::Display for SubCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubCursor::At(cursor) => f.write_str(cursor),
            // an absent next cursor stringifies as exhausted
            SubCursor::Start | SubCursor::Exhausted => f.write_str(EXHAUSTED_CURSOR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeCursor {
    pub private: SubCursor,
    pub public: SubCursor,
}

impl CompositeCursor {
    pub fn start() -> Self {
        Self {
            private: SubCursor::Start,
            public: SubCursor::Start,
        }
    }

    pub fn parse(cursor: Option<&str>) -> Self {
        let Some(cursor) = cursor else {
            return Self::start();
        };
        match cursor.split_once(CURSOR_SEPARATOR) {
            Some((private, public)) => Self {
                private: SubCursor::parse(Some(private)),
                public: SubCursor::parse(Some(public)),
            },
            None => Self {
                private: SubCursor::parse(Some(cursor)),
                public: SubCursor::Start,
            },
        }
    }

    /// Both sides are exhausted; the caller should stop paginating
    pub fn is_exhausted(&self) -> bool {
        self.private.is_exhausted() && self.public.is_exhausted()
    }
}

impl fmt::Display for CompositeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.private, CURSOR_SEPARATOR, self.public)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_and_merge_round_trip() {
        for (a, b) in [("abc", "def"), ("0", "1700000000::bafy"), ("x y", "z")] {
            let token = format!("{}|{}", a, b);
            let cursor = CompositeCursor::parse(Some(&token));
            assert_eq!(cursor.private, SubCursor::At(a.to_string()));
            assert_eq!(cursor.public, SubCursor::At(b.to_string()));
            assert_eq!(cursor.to_string(), token);
        }
    }

    #[test]
    fn test_splits_at_first_separator_only() {
        let cursor = CompositeCursor::parse(Some("a|b|c"));
        assert_eq!(cursor.private, SubCursor::At("a".to_string()));
        assert_eq!(cursor.public, SubCursor::At("b|c".to_string()));
    }

    #[test]
    fn test_missing_cursor_is_first_page() {
        assert_eq!(CompositeCursor::parse(None), CompositeCursor::start());
        assert!(!CompositeCursor::start().is_exhausted());
    }

    #[test]
    fn test_undefined_marks_exhaustion() {
        let cursor = CompositeCursor::parse(Some("undefined|def"));
        assert!(cursor.private.is_exhausted());
        assert_eq!(cursor.public.as_request(), Some("def".to_string()));

        let done = CompositeCursor::parse(Some("undefined|undefined"));
        assert!(done.is_exhausted());
        assert_eq!(done.to_string(), "undefined|undefined");
    }

    #[test]
    fn test_lenient_forms() {
        let no_separator = CompositeCursor::parse(Some("abc"));
        assert_eq!(no_separator.private, SubCursor::At("abc".to_string()));
        assert_eq!(no_separator.public, SubCursor::Start);

        let empty_side = CompositeCursor::parse(Some("|def"));
        assert_eq!(empty_side.private, SubCursor::Start);
    }

    #[test]
    fn test_absent_next_cursor_formats_as_undefined() {
        let cursor = CompositeCursor {
            private: SubCursor::next(None),
            public: SubCursor::next(Some("p2".to_string())),
        };
        assert_eq!(cursor.to_string(), "undefined|p2");
    }
}
