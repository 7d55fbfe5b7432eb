//! Module version numbers and version range expressions.
//!
//! Versions are plain three-component numbers (`major.minor.patch`) with a
//! total order. Range expressions are whitespace-separated comparison tokens
//! combined with AND semantics, e.g. `">=1.2.0 <2.0.0"`.

use std::fmt;
use std::str::FromStr;

use crate::error::{PanelError, Result};

/// A three-component version number with lexicographic tuple ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// Create a version from explicit components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version from a dot-separated numeric string of 1-3 components.
    ///
    /// Missing trailing components default to 0. Pre-release and build
    /// metadata suffixes (`-rc.1`, `+sha`) are stripped before parsing and
    /// not otherwise interpreted.
    ///
    /// # Errors
    /// `PanelError::Version` if the input is empty, has more than three
    /// components, or contains a non-numeric component.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = strip_metadata(value.trim());
        if trimmed.is_empty() {
            return Err(PanelError::Version(format!(
                "Invalid version '{}': empty after normalization",
                value
            )));
        }

        let parts: Vec<&str> = trimmed.split('.').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(PanelError::Version(format!(
                "Invalid version '{}': expected 1-3 numeric components",
                value
            )));
        }

        let mut components = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part.parse::<u64>().map_err(|_| {
                PanelError::Version(format!(
                    "Invalid version '{}': non-numeric component '{}'",
                    value, part
                ))
            })?;
        }

        Ok(Self::new(components[0], components[1], components[2]))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Cut the string at the first `-` or `+`, dropping pre-release/build suffixes.
fn strip_metadata(value: &str) -> &str {
    let end = value
        .find(|c| c == '-' || c == '+')
        .unwrap_or(value.len());
    value[..end].trim()
}

/// A comparison operator within a range expression token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeOp {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

/// One compiled predicate of a range expression.
#[derive(Debug, Clone, Copy)]
struct RangePredicate {
    op: RangeOp,
    version: SemVer,
}

impl RangePredicate {
    fn matches(&self, version: SemVer) -> bool {
        match self.op {
            RangeOp::Eq => version == self.version,
            RangeOp::Ge => version >= self.version,
            RangeOp::Gt => version > self.version,
            RangeOp::Le => version <= self.version,
            RangeOp::Lt => version < self.version,
        }
    }
}

/// A compiled version range: an ordered conjunction of predicates.
///
/// Supported token forms, separated by whitespace:
/// - `1.2.3` (equality)
/// - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
///
/// A version satisfies the range iff every predicate holds.
#[derive(Debug, Clone)]
pub struct VersionRange {
    predicates: Vec<RangePredicate>,
}

impl VersionRange {
    /// Compile a range expression.
    ///
    /// # Errors
    /// `PanelError::Version` naming the offending token for unknown operators
    /// or unparseable version literals, or if the expression contains no
    /// valid tokens at all.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(PanelError::Version("empty range expression".to_string()));
        }

        let mut predicates = Vec::new();
        for token in expression.split_whitespace() {
            let (op, literal) = if let Some(rest) = token.strip_prefix(">=") {
                (RangeOp::Ge, rest)
            } else if let Some(rest) = token.strip_prefix("<=") {
                (RangeOp::Le, rest)
            } else if let Some(rest) = token.strip_prefix('>') {
                (RangeOp::Gt, rest)
            } else if let Some(rest) = token.strip_prefix('<') {
                (RangeOp::Lt, rest)
            } else {
                (RangeOp::Eq, token)
            };

            let version = SemVer::parse(literal).map_err(|_| {
                PanelError::Version(format!("Unsupported range token '{}'", token))
            })?;

            predicates.push(RangePredicate { op, version });
        }

        if predicates.is_empty() {
            return Err(PanelError::Version(format!(
                "Range expression '{}' has no valid conditions",
                expression
            )));
        }

        Ok(Self { predicates })
    }

    /// Whether a version satisfies every predicate of this range.
    pub fn contains(&self, version: SemVer) -> bool {
        self.predicates.iter().all(|p| p.matches(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let v = SemVer::parse("1.2.3").unwrap();
        assert_eq!(v, SemVer::new(1, 2, 3));
    }

    #[test]
    fn test_parse_partial_versions_default_to_zero() {
        assert_eq!(SemVer::parse("2").unwrap(), SemVer::new(2, 0, 0));
        assert_eq!(SemVer::parse("2.5").unwrap(), SemVer::new(2, 5, 0));
    }

    #[test]
    fn test_parse_strips_prerelease_and_build_metadata() {
        assert_eq!(SemVer::parse("1.2.3-rc.1").unwrap(), SemVer::new(1, 2, 3));
        assert_eq!(SemVer::parse("1.2.3+abc123").unwrap(), SemVer::new(1, 2, 3));
        assert_eq!(
            SemVer::parse("1.2.3-rc.1+abc123").unwrap(),
            SemVer::new(1, 2, 3)
        );
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        assert!(SemVer::parse("").is_err());
        assert!(SemVer::parse("   ").is_err());
        assert!(SemVer::parse("a.b.c").is_err());
        assert!(SemVer::parse("1.2.3.4").is_err());
        assert!(SemVer::parse("1.x").is_err());
    }

    #[test]
    fn test_display_fully_expanded() {
        assert_eq!(SemVer::parse("3").unwrap().to_string(), "3.0.0");
        assert_eq!(SemVer::parse("3.1").unwrap().to_string(), "3.1.0");
        assert_eq!(SemVer::parse("3.1.4").unwrap().to_string(), "3.1.4");
    }

    #[test]
    fn test_roundtrip_through_display() {
        for s in ["0.0.0", "1.0.0", "10.20.30", "999.0.1"] {
            let v = SemVer::parse(s).unwrap();
            assert_eq!(v.to_string(), s);
            assert_eq!(SemVer::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_ordering_is_lexicographic_tuple() {
        assert!(SemVer::new(1, 0, 0) < SemVer::new(2, 0, 0));
        assert!(SemVer::new(1, 2, 0) < SemVer::new(1, 10, 0));
        assert!(SemVer::new(1, 2, 3) < SemVer::new(1, 2, 4));
        assert!(SemVer::new(2, 0, 0) > SemVer::new(1, 99, 99));
        assert_eq!(SemVer::new(1, 2, 3), SemVer::new(1, 2, 3));
    }

    #[test]
    fn test_from_str_trait() {
        let v: SemVer = "4.5.6".parse().unwrap();
        assert_eq!(v, SemVer::new(4, 5, 6));
    }

    #[test]
    fn test_range_equality_token() {
        let range = VersionRange::parse("1.2.3").unwrap();
        assert!(range.contains(SemVer::new(1, 2, 3)));
        assert!(!range.contains(SemVer::new(1, 2, 4)));
    }

    #[test]
    fn test_range_operators_agree_with_tuple_comparison() {
        let pivot = SemVer::new(1, 5, 0);
        let candidates = [
            SemVer::new(1, 4, 9),
            SemVer::new(1, 5, 0),
            SemVer::new(1, 5, 1),
            SemVer::new(2, 0, 0),
        ];

        let ge = VersionRange::parse(">=1.5.0").unwrap();
        let gt = VersionRange::parse(">1.5.0").unwrap();
        let le = VersionRange::parse("<=1.5.0").unwrap();
        let lt = VersionRange::parse("<1.5.0").unwrap();

        for v in candidates {
            assert_eq!(ge.contains(v), v >= pivot);
            assert_eq!(gt.contains(v), v > pivot);
            assert_eq!(le.contains(v), v <= pivot);
            assert_eq!(lt.contains(v), v < pivot);
        }
    }

    #[test]
    fn test_range_conjunction_semantics() {
        let range = VersionRange::parse(">=1.2.0 <2.0.0").unwrap();
        assert!(range.contains(SemVer::new(1, 2, 0)));
        assert!(range.contains(SemVer::new(1, 9, 9)));
        assert!(!range.contains(SemVer::new(1, 1, 9)));
        assert!(!range.contains(SemVer::new(2, 0, 0)));
    }

    #[test]
    fn test_range_rejects_empty_expression() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse("   ").is_err());
    }

    #[test]
    fn test_range_rejects_unknown_operator_with_token_detail() {
        let err = VersionRange::parse("~1.2.3").unwrap_err();
        assert!(err.to_string().contains("~1.2.3"));
    }

    #[test]
    fn test_range_rejects_unparseable_literal_with_token_detail() {
        let err = VersionRange::parse(">=abc").unwrap_err();
        assert!(err.to_string().contains(">=abc"));
    }
}
