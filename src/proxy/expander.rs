//! Range expander for IPv4 address range notations

/// Expander turning range notations into IPv4 literal sequences
///
/// Supported notations:
/// - `A.B.C.D/24` (the literal D octet is ignored)
/// - `A.B.C.start-end` (inclusive last-octet run)
pub struct RangeExpander;

impl RangeExpander {
    /// Expand a range spec into IPv4 literals
    ///
    /// Total: anything that does not match the grammar yields an empty
    /// sequence so callers can silently skip it.
    pub fn expand(spec: &str) -> Vec<String> {
        let spec = spec.trim();

        if let Some(prefix) = spec.strip_suffix("/24") {
            return Self::expand_slash24(prefix);
        }

        Self::expand_octet_range(spec)
    }

    /// True when the input looks like a range spec rather than a single
    /// endpoint notation
    pub fn is_range(spec: &str) -> bool {
        let spec = spec.trim();
        spec.ends_with("/24") || Self::split_octet_range(spec).is_some()
    }

    fn expand_slash24(prefix: &str) -> Vec<String> {
        let octets: Vec<&str> = prefix.split('.').collect();
        if octets.len() != 4 {
            return Vec::new();
        }
        for octet in &octets[..3] {
            if octet.parse::<u8>().is_err() {
                return Vec::new();
            }
        }

        let base = format!("{}.{}.{}", octets[0], octets[1], octets[2]);
        (0..=255u16).map(|i| format!("{}.{}", base, i)).collect()
    }

    fn expand_octet_range(spec: &str) -> Vec<String> {
        let Some((base, start, end)) = Self::split_octet_range(spec) else {
            return Vec::new();
        };
        if start > end {
            return Vec::new();
        }

        (start..=end).map(|i| format!("{}.{}", base, i)).collect()
    }

    /// Split `A.B.C.start-end` into its base and bounds
    fn split_octet_range(spec: &str) -> Option<(String, u8, u8)> {
        let (head, tail) = spec.rsplit_once('.')?;
        let (start, end) = tail.split_once('-')?;

        let octets: Vec<&str> = head.split('.').collect();
        if octets.len() != 3 {
            return None;
        }
        for octet in &octets {
            octet.parse::<u8>().ok()?;
        }

        let start: u8 = start.parse().ok()?;
        let end: u8 = end.parse().ok()?;
        Some((head.to_string(), start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_slash24() {
        let ips = RangeExpander::expand("203.0.113.5/24");
        assert_eq!(ips.len(), 256);
        assert_eq!(ips[0], "203.0.113.0");
        assert_eq!(ips[255], "203.0.113.255");
    }

    #[test]
    fn test_expand_slash24_ignores_last_octet() {
        assert_eq!(
            RangeExpander::expand("203.0.113.5/24"),
            RangeExpander::expand("203.0.113.200/24")
        );
    }

    #[test]
    fn test_expand_octet_range() {
        let ips = RangeExpander::expand("203.0.113.10-20");
        assert_eq!(ips.len(), 11);
        assert_eq!(ips[0], "203.0.113.10");
        assert_eq!(ips[10], "203.0.113.20");
    }

    #[test]
    fn test_expand_octet_range_single() {
        let ips = RangeExpander::expand("203.0.113.7-7");
        assert_eq!(ips, vec!["203.0.113.7".to_string()]);
    }

    #[test]
    fn test_expand_octet_range_reversed_is_empty() {
        assert!(RangeExpander::expand("203.0.113.50-10").is_empty());
    }

    #[test]
    fn test_expand_octet_range_out_of_bounds_is_empty() {
        assert!(RangeExpander::expand("203.0.113.10-300").is_empty());
    }

    #[test]
    fn test_expand_invalid_input_is_empty() {
        assert!(RangeExpander::expand("not-a-range").is_empty());
        assert!(RangeExpander::expand("203.0.113.5").is_empty());
        assert!(RangeExpander::expand("203.0.113/24").is_empty());
        assert!(RangeExpander::expand("999.0.113.5/24").is_empty());
    }

    #[test]
    fn test_is_range() {
        assert!(RangeExpander::is_range("203.0.113.5/24"));
        assert!(RangeExpander::is_range("203.0.113.10-20"));
        assert!(!RangeExpander::is_range("203.0.113.5"));
        assert!(!RangeExpander::is_range("example.com"));
        assert!(!RangeExpander::is_range("203.0.113.5:8080"));
    }
}
