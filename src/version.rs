// src/version.rs

//! Package version ordering
//!
//! Implements the comparison pacman uses for `[epoch:]version[-release]`
//! strings. Epochs are compared first (a missing epoch is `0`), then the
//! upstream version, then the release if and only if both sides carry one.
//! Each part is compared segment by segment with the classic `rpmvercmp`
//! rules: alphanumeric runs are split on separators, numeric runs beat
//! alphabetic runs, leading zeros are ignored.

use std::cmp::Ordering;

/// Parsed `[epoch:]version[-release]` triple
#[derive(Debug, PartialEq, Eq)]
struct Evr<'a> {
    epoch: &'a str,
    version: &'a str,
    release: Option<&'a str>,
}

impl<'a> Evr<'a> {
    fn parse(s: &'a str) -> Self {
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();

        let (epoch, rest) = if s.as_bytes().get(digits) == Some(&b':') {
            let epoch = &s[..digits];
            (if epoch.is_empty() { "0" } else { epoch }, &s[digits + 1..])
        } else {
            ("0", s)
        };

        match rest.rfind('-') {
            Some(pos) => Evr {
                epoch,
                version: &rest[..pos],
                release: Some(&rest[pos + 1..]),
            },
            None => Evr {
                epoch,
                version: rest,
                release: None,
            },
        }
    }
}

/// Compare two full package versions
///
/// Returns `Greater` when `a` is newer than `b`.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let left = Evr::parse(a);
    let right = Evr::parse(b);

    segment_cmp(left.epoch, right.epoch)
        .then_with(|| segment_cmp(left.version, right.version))
        .then_with(|| match (left.release, right.release) {
            (Some(l), Some(r)) => segment_cmp(l, r),
            _ => Ordering::Equal,
        })
}

/// Segment-wise comparison of a single version component
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut one, mut two) = (0usize, 0usize);
    let (mut prev_one, mut prev_two) = (0usize, 0usize);

    while one < a.len() && two < b.len() {
        while one < a.len() && !a[one].is_ascii_alphanumeric() {
            one += 1;
        }
        while two < b.len() && !b[two].is_ascii_alphanumeric() {
            two += 1;
        }

        if one >= a.len() || two >= b.len() {
            break;
        }

        // Differing separator runs decide on their own
        let (sep_one, sep_two) = (one - prev_one, two - prev_two);
        if sep_one != sep_two {
            return sep_one.cmp(&sep_two);
        }

        let numeric = a[one].is_ascii_digit();
        let in_segment: fn(&u8) -> bool = if numeric {
            u8::is_ascii_digit
        } else {
            u8::is_ascii_alphabetic
        };

        let mut end_one = one;
        while end_one < a.len() && in_segment(&a[end_one]) {
            end_one += 1;
        }
        let mut end_two = two;
        while end_two < b.len() && in_segment(&b[end_two]) {
            end_two += 1;
        }

        // Segment types differ: numeric is newer than alpha
        if end_two == two {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &a[one..end_one];
        let mut seg_two = &b[two..end_two];

        if numeric {
            seg_one = trim_leading_zeros(seg_one);
            seg_two = trim_leading_zeros(seg_two);

            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            other => return other,
        }

        one = end_one;
        two = end_two;
        prev_one = end_one;
        prev_two = end_two;
    }

    let one_done = one >= a.len();
    let two_done = two >= b.len();

    if one_done && two_done {
        return Ordering::Equal;
    }

    // A trailing alpha segment (e.g. "1.0rc1") is older than nothing at all;
    // any other remainder is newer.
    let two_alpha = !two_done && b[two].is_ascii_alphabetic();
    let one_alpha = !one_done && a[one].is_ascii_alphabetic();
    if (one_done && !two_alpha) || one_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn trim_leading_zeros(segment: &[u8]) -> &[u8] {
    let zeros = segment.iter().take_while(|&&c| c == b'0').count();
    &segment[zeros..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use Ordering::{Equal, Greater, Less};

    fn check(a: &str, b: &str, expected: Ordering) {
        assert_eq!(vercmp(a, b), expected, "vercmp({a}, {b})");
        assert_eq!(vercmp(b, a), expected.reverse(), "vercmp({b}, {a})");
    }

    #[test]
    fn test_evr_parsing() {
        assert_eq!(
            Evr::parse("2:1.4.2-3"),
            Evr {
                epoch: "2",
                version: "1.4.2",
                release: Some("3")
            }
        );
        assert_eq!(
            Evr::parse("1.0"),
            Evr {
                epoch: "0",
                version: "1.0",
                release: None
            }
        );
        assert_eq!(Evr::parse(":1.0-1").epoch, "0");
        // Only the last dash separates the release
        assert_eq!(Evr::parse("1.0-beta-2").version, "1.0-beta");
    }

    #[test]
    fn test_simple_versions() {
        check("1.5.0", "1.5.0", Equal);
        check("1.5.1", "1.5.0", Greater);
        check("1.5.1", "1.5", Greater);
        check("2.0", "1.9.9", Greater);
        check("1.10", "1.9", Greater);
    }

    #[test]
    fn test_leading_zeros_ignored() {
        check("1.001", "1.1", Equal);
        check("1.010", "1.9", Greater);
    }

    #[test]
    fn test_release_only_compared_when_both_present() {
        check("1.5.0-1", "1.5.0-2", Less);
        check("1.5.0-1", "1.5.0", Equal);
        check("1.5.0-10", "1.5.0-9", Greater);
    }

    #[test]
    fn test_epoch_dominates() {
        check("1:1.0", "2.0", Greater);
        check("0:1.0", "1.0", Equal);
        check("1:1.0-1", "1:1.0-2", Less);
        check("2:0.1", "1:9.9", Greater);
    }

    #[test]
    fn test_alpha_segments() {
        check("1.0rc1", "1.0", Less);
        check("1.0a", "1.0", Less);
        check("1.0a", "1.0b", Less);
        check("1.0.1", "1.0.a", Greater);
        check("1.0.0", "1.0.a", Greater);
    }

    #[test]
    fn test_separator_runs() {
        check("1.0", "1.0.1", Less);
        check("1.0alpha", "1.0.0", Less);
        check("1..0", "1.0", Greater);
    }
}
