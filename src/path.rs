//! Parses a FUSE path of the form `/DIR` or `/DIR/NAME.EXT` under the 8.3
//! naming rule.
//!
//! This mirrors the original's `sscanf(path, "/%[^/]/%[^.].%s", dir, fname,
//! fext)`: up to the first `/` after the leading slash fills `dir`; text up
//! to the next `.` fills `fname`; everything after that `.` fills `fext`.
//! Each field conversion only succeeds if at least one character is
//! available for it, exactly like `scanf`'s `%[...]`/`%s` — a field that
//! can't be filled stops parsing there and `tokens` records how many fields
//! before it succeeded.

use crate::error::{FsError, FsResult};
use crate::layout::{MAX_EXTENSION, MAX_FILENAME};

/// Result of parsing a path: which of `dir`/`fname`/`fext` were present,
/// and `tokens` recording how many (0–3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPath {
    pub dir: Option<String>,
    pub fname: Option<String>,
    pub fext: Option<String>,
    pub tokens: u8,
}

impl ParsedPath {
    /// Parses `path`, which must be an absolute (`/`-prefixed) string.
    /// Fails with `NameTooLong` if any populated field exceeds its limit.
    pub fn parse(path: &str) -> FsResult<Self> {
        let parsed = Self::scan(path);

        if let Some(dir) = &parsed.dir {
            if dir.len() > MAX_FILENAME {
                return Err(FsError::NameTooLong);
            }
        }
        if let Some(fname) = &parsed.fname {
            if fname.len() > MAX_FILENAME {
                return Err(FsError::NameTooLong);
            }
        }
        if let Some(fext) = &parsed.fext {
            if fext.len() > MAX_EXTENSION {
                return Err(FsError::NameTooLong);
            }
        }

        Ok(parsed)
    }

    fn scan(path: &str) -> Self {
        let Some(rest) = path.strip_prefix('/') else {
            return Self::default();
        };

        let dir_end = rest.find('/').unwrap_or(rest.len());
        if dir_end == 0 {
            return Self::default();
        }
        let dir = rest[..dir_end].to_string();

        if dir_end >= rest.len() {
            return Self {
                dir: Some(dir),
                tokens: 1,
                ..Self::default()
            };
        }
        let after_dir_slash = &rest[dir_end + 1..];
        if after_dir_slash.is_empty() {
            return Self {
                dir: Some(dir),
                tokens: 1,
                ..Self::default()
            };
        }

        let fname_end = after_dir_slash.find('.').unwrap_or(after_dir_slash.len());
        if fname_end == 0 {
            return Self {
                dir: Some(dir),
                tokens: 1,
                ..Self::default()
            };
        }
        let fname = after_dir_slash[..fname_end].to_string();

        if fname_end >= after_dir_slash.len() {
            return Self {
                dir: Some(dir),
                fname: Some(fname),
                tokens: 2,
                ..Self::default()
            };
        }
        let after_dot = &after_dir_slash[fname_end + 1..];
        if after_dot.is_empty() {
            return Self {
                dir: Some(dir),
                fname: Some(fname),
                tokens: 2,
                ..Self::default()
            };
        }

        Self {
            dir: Some(dir),
            fname: Some(fname),
            fext: Some(after_dot.to_string()),
            tokens: 3,
        }
    }

    /// A three-token path names a file (`/DIR/NAME.EXT`, extension may
    /// still be empty if `tokens == 2` — callers needing "names a file"
    /// should treat `tokens >= 2` as that; `mknod`/`read`/`write` require
    /// the full three tokens.
    pub fn is_complete_file(&self) -> bool {
        self.tokens == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_has_zero_tokens() {
        assert_eq!(ParsedPath::parse("/").unwrap().tokens, 0);
    }

    #[test]
    fn dir_only_path_has_one_token() {
        let p = ParsedPath::parse("/alpha").unwrap();
        assert_eq!(p.tokens, 1);
        assert_eq!(p.dir.as_deref(), Some("alpha"));
        assert!(p.fname.is_none());
    }

    #[test]
    fn dir_with_trailing_slash_has_one_token() {
        let p = ParsedPath::parse("/alpha/").unwrap();
        assert_eq!(p.tokens, 1);
    }

    #[test]
    fn name_without_extension_has_two_tokens() {
        let p = ParsedPath::parse("/alpha/noext").unwrap();
        assert_eq!(p.tokens, 2);
        assert_eq!(p.fname.as_deref(), Some("noext"));
        assert!(p.fext.is_none());
    }

    #[test]
    fn name_with_trailing_dot_has_two_tokens() {
        let p = ParsedPath::parse("/alpha/name.").unwrap();
        assert_eq!(p.tokens, 2);
        assert_eq!(p.fname.as_deref(), Some("name"));
    }

    #[test]
    fn full_file_path_has_three_tokens() {
        let p = ParsedPath::parse("/alpha/hi.txt").unwrap();
        assert_eq!(p.tokens, 3);
        assert_eq!(p.dir.as_deref(), Some("alpha"));
        assert_eq!(p.fname.as_deref(), Some("hi"));
        assert_eq!(p.fext.as_deref(), Some("txt"));
    }

    #[test]
    fn extension_with_embedded_dot_exceeds_limit() {
        assert!(matches!(
            ParsedPath::parse("/alpha/hi.tar.gz"),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn names_at_the_limit_are_accepted() {
        let p = ParsedPath::parse("/12345678/abcdefgh.xyz").unwrap();
        assert_eq!(p.tokens, 3);
    }

    #[test]
    fn dir_over_limit_is_rejected() {
        assert!(matches!(
            ParsedPath::parse("/123456789"),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn fname_over_limit_is_rejected() {
        assert!(matches!(
            ParsedPath::parse("/alpha/123456789.txt"),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn fext_over_limit_is_rejected() {
        assert!(matches!(
            ParsedPath::parse("/alpha/hi.toolong"),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn double_leading_slash_has_zero_tokens() {
        assert_eq!(ParsedPath::parse("//alpha").unwrap().tokens, 0);
    }
}
