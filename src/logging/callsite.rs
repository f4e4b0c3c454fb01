//! Call-site identity for rate-limited logging.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::Location;

/// Source location of a logging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    /// The location of the caller, propagated through every
    /// `#[track_caller]` frame above this one.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

/// Fixed-width key identifying a call site. Only ever used as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn wrapper() -> CallSite {
        CallSite::caller()
    }

    #[test]
    fn test_same_site_same_fingerprint() {
        let sites: Vec<_> = (0..3).map(|_| wrapper()).collect();
        assert_eq!(sites[0], sites[1]);
        assert_eq!(sites[0].fingerprint(), sites[2].fingerprint());
    }

    #[test]
    fn test_distinct_sites_distinct_fingerprints() {
        let a = wrapper();
        let b = wrapper();
        assert_ne!(a.line, b.line);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_same_line_distinct_columns() {
        let (a, b) = (wrapper(), wrapper());
        assert_eq!(a.line, b.line);
        assert_ne!(a.column, b.column);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_track_caller_reports_wrapper_caller() {
        let site = wrapper();
        assert!(site.file.ends_with("callsite.rs"));
    }
}
