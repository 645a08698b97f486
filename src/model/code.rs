use std::cmp::Ordering;

/// Separator between code segments (`2.1.3`)
pub const SEPARATOR: char = '.';

/// One segment of a dotted WBS code
#[derive(Debug, Clone, Copy)]
pub enum Segment<'a> {
    /// All-ASCII-digit segment, compared by numeric value
    Num(&'a str),
    /// Anything else, compared as an opaque token
    Token(&'a str),
}

impl<'a> Segment<'a> {
    pub fn parse(raw: &'a str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Segment::Num(raw)
        } else {
            Segment::Token(raw)
        }
    }
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => cmp_digits(a, b),
            // Numeric segments always sort before tokens at the same position
            (Segment::Num(_), Segment::Token(_)) => Ordering::Less,
            (Segment::Token(_), Segment::Num(_)) => Ordering::Greater,
            (Segment::Token(a), Segment::Token(b)) => a.cmp(b),
        }
    }
}

impl PartialEq for Segment<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment<'_> {}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two digit strings numerically without parsing, so segments of
/// any length work and `"007" == "7"`.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Iterate over the parsed segments of a code
pub fn segments(code: &str) -> impl Iterator<Item = Segment<'_>> {
    code.split(SEPARATOR).map(Segment::parse)
}

/// Total order over dotted WBS codes.
///
/// Segments are compared position by position. A code that runs out of
/// segments first sorts before the longer one, so `2.1` lands immediately
/// before `2.1.1`. Digit segments compare numerically (`2.10 > 2.2`); a digit
/// segment sorts before a non-digit token at the same position.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Whether `child` extends `parent` by whole segments (`2.1` is a prefix of `2.1.3`).
pub fn is_segment_prefix(parent: &str, child: &str) -> bool {
    let mut rest = segments(child);
    for p in segments(parent) {
        match rest.next() {
            Some(c) if c == p => {}
            _ => return false,
        }
    }
    rest.next().is_some()
}

/// Number of segments in a code
pub fn depth(code: &str) -> usize {
    code.split(SEPARATOR).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use Ordering::*;

    #[test]
    fn numeric_not_lexical() {
        assert_eq!(compare_codes("2.10", "2.2"), Greater);
        assert_eq!(compare_codes("10", "9"), Greater);
        assert_eq!(compare_codes("1.2.3", "1.2.3"), Equal);
    }

    #[test]
    fn parent_before_child() {
        for (parent, child) in [("2", "2.1"), ("2.1", "2.1.3"), ("A", "A.1"), ("3.x", "3.x.0")] {
            assert_eq!(compare_codes(parent, child), Less, "{parent} vs {child}");
            assert_eq!(compare_codes(child, parent), Greater);
        }
    }

    #[test]
    fn parent_sorts_immediately_before_descendants() {
        let mut codes = vec!["3", "2.1.3", "2.10", "2", "2.1", "1", "2.2", "2.1.10"];
        codes.sort_by(|a, b| compare_codes(a, b));
        assert_eq!(
            codes,
            vec!["1", "2", "2.1", "2.1.3", "2.1.10", "2.2", "2.10", "3"]
        );
    }

    #[test]
    fn mixed_segments_numbers_first() {
        assert_eq!(compare_codes("2.9", "2.a"), Less);
        assert_eq!(compare_codes("2.a", "2.100"), Greater);
        assert_eq!(compare_codes("2.a", "2.b"), Less);
        assert_eq!(compare_codes("1a", "1"), Greater);
    }

    #[test]
    fn leading_zeros_and_huge_numbers() {
        assert_eq!(compare_codes("2.007", "2.7"), Equal);
        assert_eq!(
            compare_codes("99999999999999999999999", "100000000000000000000000"),
            Less
        );
    }

    #[test]
    fn degenerate_codes_do_not_panic() {
        assert_eq!(compare_codes("", ""), Equal);
        assert_eq!(compare_codes("", "1"), Greater);
        assert_eq!(compare_codes("2..1", "2.1"), Greater);
        assert_eq!(compare_codes("2.", "2"), Greater);
    }

    #[test]
    fn strict_weak_order_over_sample() {
        let codes = [
            "1", "1.1", "1.2", "1.10", "1.a", "1.a.1", "2", "2.007", "2.7", "a", "b.1", "", "10",
        ];
        for a in codes {
            for b in codes {
                assert_eq!(compare_codes(a, b), compare_codes(b, a).reverse());
                for c in codes {
                    if compare_codes(a, b) == Less && compare_codes(b, c) == Less {
                        assert_eq!(compare_codes(a, c), Less, "{a} < {b} < {c}");
                    }
                    if compare_codes(a, b) == Equal && compare_codes(b, c) == Equal {
                        assert_eq!(compare_codes(a, c), Equal);
                    }
                }
            }
        }
    }

    #[test]
    fn segment_prefix() {
        assert!(is_segment_prefix("2", "2.1"));
        assert!(is_segment_prefix("2.1", "2.1.3"));
        assert!(!is_segment_prefix("2.1", "2.1"));
        assert!(!is_segment_prefix("2.1", "2.10"));
        assert!(!is_segment_prefix("2.1.3", "2.1"));
        assert_eq!(depth("2.1.3"), 3);
    }
}
