//! STOCK Act amount band parsing
//!
//! Disclosures report trade value as a statutory range rather than an exact
//! figure. Parsing never fails: anything unrecognizable degrades to
//! `(None, None)` and the trade is kept.

/// Canonical band table, in lookup order
///
/// Partial fragments (`"$1,001 -"`) appear in some feeds where the upper
/// bound was cut off.
pub const AMOUNT_BANDS: &[(&str, (i64, i64))] = &[
    ("$1,001 - $15,000", (1_001, 15_000)),
    ("$1,001 -", (1_001, 15_000)),
    ("$15,001 - $50,000", (15_001, 50_000)),
    ("$15,001 -", (15_001, 50_000)),
    ("$50,001 - $100,000", (50_001, 100_000)),
    ("$50,001 -", (50_001, 100_000)),
    ("$100,001 - $250,000", (100_001, 250_000)),
    ("$100,001 -", (100_001, 250_000)),
    ("$250,001 - $500,000", (250_001, 500_000)),
    ("$250,001 -", (250_001, 500_000)),
    ("$500,001 - $1,000,000", (500_001, 1_000_000)),
    ("$500,001 -", (500_001, 1_000_000)),
    ("$1,000,001 - $5,000,000", (1_000_001, 5_000_000)),
    ("$1,000,001 -", (1_000_001, 5_000_000)),
    ("$5,000,001 - $25,000,000", (5_000_001, 25_000_000)),
    ("$5,000,001 -", (5_000_001, 25_000_000)),
    ("$25,000,001 - $50,000,000", (25_000_001, 50_000_000)),
    ("$50,000,001 and Over", (50_000_001, 100_000_000)),
    ("Over $50,000,000", (50_000_001, 100_000_000)),
];

/// Parse a disclosure amount string into `(low, high)`
///
/// First match wins:
/// 1. exact band text
/// 2. input contains a band key, or a band key contains the input
/// 3. numeric groups: two or more -> `(first, second)`, one -> `(v, v)`
/// 4. `(None, None)`
pub fn parse_amount(input: &str) -> (Option<i64>, Option<i64>) {
    let text = input.trim();
    if text.is_empty() {
        return (None, None);
    }

    if let Some((_, (low, high))) = AMOUNT_BANDS.iter().find(|(key, _)| *key == text) {
        return (Some(*low), Some(*high));
    }

    if let Some((_, (low, high))) = AMOUNT_BANDS
        .iter()
        .find(|(key, _)| text.contains(key) || key.contains(text))
    {
        return (Some(*low), Some(*high));
    }

    let groups = numeric_groups(text);
    match groups.as_slice() {
        [] => (None, None),
        [only] => match only.parse::<i64>() {
            Ok(value) => (Some(value), Some(value)),
            Err(_) => (None, None),
        },
        [first, second, ..] => match (first.parse::<i64>(), second.parse::<i64>()) {
            (Ok(low), Ok(high)) => (Some(low), Some(high)),
            _ => (None, None),
        },
    }
}

/// Runs of digits with thousands separators removed (`"$1,001"` -> `"1001"`)
fn numeric_groups(text: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        match c {
            '0'..='9' => current.push(c),
            // Separator only counts inside a group
            ',' => {}
            _ => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_band_parses_to_its_range() {
        for (text, (low, high)) in AMOUNT_BANDS {
            assert_eq!(parse_amount(text), (Some(*low), Some(*high)), "band {}", text);
        }
    }

    #[test]
    fn test_known_examples() {
        assert_eq!(parse_amount("$1,001 - $15,000"), (Some(1001), Some(15000)));
        assert_eq!(parse_amount("Over $50,000,000"), (Some(50_000_001), Some(100_000_000)));
        assert_eq!(parse_amount("12345"), (Some(12345), Some(12345)));
        assert_eq!(parse_amount(""), (None, None));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_amount("  $15,001 - $50,000 \n"), (Some(15001), Some(50000)));
        assert_eq!(parse_amount("   "), (None, None));
    }

    #[test]
    fn test_substring_match() {
        // Input contains a key
        assert_eq!(
            parse_amount("Amount: $250,001 - $500,000 (spouse)"),
            (Some(250_001), Some(500_000))
        );
        // Key contains the input
        assert_eq!(parse_amount("$100,001 - $250"), (Some(100_001), Some(250_000)));
    }

    #[test]
    fn test_numeric_extraction() {
        assert_eq!(parse_amount("between 2,000 and 9,999 USD"), (Some(2000), Some(9999)));
        assert_eq!(parse_amount("USD 75000"), (Some(75000), Some(75000)));
        assert_eq!(parse_amount("$3,500-$7,250"), (Some(3500), Some(7250)));
    }

    #[test]
    fn test_garbage_degrades_to_none() {
        assert_eq!(parse_amount("not disclosed"), (None, None));
        assert_eq!(parse_amount("N/A"), (None, None));
        assert_eq!(parse_amount(", ,"), (None, None));
    }

    #[test]
    fn test_overflow_degrades_to_none() {
        assert_eq!(parse_amount("99999999999999999999999"), (None, None));
    }
}
