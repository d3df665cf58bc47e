//! Tool version parsing and comparison.

use std::fmt;
use std::str::FromStr;

use crate::error::SmartError;

/// A `<major>[.<minor>[.<patch>]]` version. Missing components count as zero.
///
/// Ordering is numeric per component, so `7.0 > 6.10 > 6.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ToolVersion {
    type Err = SmartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparsable = || SmartError::VersionUnparsable(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(unparsable());
        }

        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unparsable());
            }
            *slot = part.parse().map_err(|_| unparsable())?;
        }

        Ok(Self::new(components[0], components[1], components[2]))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Whether `found` is at least `minimum`.
///
/// Fails if either side is unparsable.
pub fn version_at_least(found: &str, minimum: &str) -> Result<bool, SmartError> {
    let found: ToolVersion = found.parse()?;
    let minimum: ToolVersion = minimum.parse()?;
    Ok(found >= minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("7".parse::<ToolVersion>().unwrap(), ToolVersion::new(7, 0, 0));
        assert_eq!("6.6".parse::<ToolVersion>().unwrap(), ToolVersion::new(6, 6, 0));
        assert_eq!("7.3.1".parse::<ToolVersion>().unwrap(), ToolVersion::new(7, 3, 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "7.", ".7", "7.x", "v7.0", "7.0.0.1", "not-a-number", "7-2"] {
            assert!(
                matches!(bad.parse::<ToolVersion>(), Err(SmartError::VersionUnparsable(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(version_at_least("7.0", "6.10").unwrap());
        assert!(version_at_least("6.10", "6.9").unwrap());
        assert!(!version_at_least("6.9", "6.10").unwrap());
        assert!(version_at_least("6.6", "6.6").unwrap());
        assert!(version_at_least("6.6", "6.6.0").unwrap());
        assert!(!version_at_least("6.5", "6.6").unwrap());
    }

    #[test]
    fn test_unparsable_side_fails() {
        assert!(version_at_least("abc", "6.6").is_err());
        assert!(version_at_least("7.0", "").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ToolVersion::new(6, 6, 0).to_string(), "6.6");
        assert_eq!(ToolVersion::new(7, 3, 1).to_string(), "7.3.1");
    }
}
