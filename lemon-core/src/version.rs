use std::cmp::Ordering;
use std::fmt;

/// A version string compared segment-by-segment as integers, tolerant of a
/// leading `v`/`V` and of non-numeric suffixes within a segment (§4.2).
///
/// `1.2.3` ≥ `1.2`, `v1.10` > `v1.9`, `32.0.203.311-foo` is comparable.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.strip_prefix(['v', 'V']).unwrap_or(s);
        let segments = trimmed
            .split('.')
            .map(|segment| {
                let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .collect();
        Self {
            raw: s.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn patch_satisfies_minor_requirement() {
        assert!(Version::parse("1.2.3") >= Version::parse("1.2"));
    }

    #[test]
    fn numeric_compare_not_lexicographic() {
        assert!(Version::parse("v1.10") > Version::parse("v1.9"));
    }

    #[test]
    fn suffix_is_truncated_at_first_non_digit() {
        let a = Version::parse("32.0.203.311-foo");
        let b = Version::parse("32.0.203.311");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_trailing_segments_are_zero() {
        assert_eq!(Version::parse("1.2"), Version::parse("1.2.0"));
    }

    #[test]
    fn reflexive_for_all_inputs() {
        for s in ["1.2.3", "v0.9.7-rc1", "2024.01", ""] {
            assert!(Version::parse(s) >= Version::parse(s));
        }
    }
}
