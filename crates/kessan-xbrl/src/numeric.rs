//! Parsing of numeric fact text into yen.
//!
//! EDINET instance documents mostly carry plain integers, but filings vary:
//! comma-grouped digits, Japanese negative marks, accountants' parentheses,
//! unit-word suffixes and inline `scale` attributes all appear in the wild.

/// Parses a fact's text into a signed yen amount.
///
/// `scale` is the fact's `scale` attribute when present, a decimal power of
/// ten applied to the printed value. Returns `None` when the text is not a
/// number, which callers treat as an absent fact.
pub fn parse_yen(raw: &str, scale: Option<&str>) -> Option<i64> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut multiplier: i128 = scale
        .and_then(|s| s.trim().parse::<u32>().ok())
        .and_then(|p| 10i128.checked_pow(p))
        .unwrap_or(1);

    // Unit-word suffixes, largest first so 百万円 is not split as 万円.
    for (suffix, unit) in [("百万円", 1_000_000i128), ("千円", 1_000), ("円", 1)] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.trim_end();
            multiplier *= unit;
            break;
        }
    }

    // A leading negative mark or a full parenthesis wrap flips the sign.
    let negative = text.starts_with('△')
        || text.starts_with('▲')
        || text.starts_with('-')
        || text.starts_with('−')
        || (text.starts_with('(') && text.ends_with(')'));

    let text = text
        .trim_start_matches(['△', '▲', '-', '−', '+', '('])
        .trim_end_matches(')')
        .trim();

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    let int_digits: String = int_part.chars().filter(|c| *c != ',' && *c != '，').collect();
    let frac_digits = frac_part.trim();

    // Nothing but separators or sign marks is an absent fact, not zero.
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }
    if !int_digits.chars().all(|c| c.is_ascii_digit())
        || !frac_digits.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let int_value: i128 = if int_digits.is_empty() {
        0
    } else {
        int_digits.parse().ok()?
    };

    // Fold the fraction into the multiplier so "1.5" at scale 3 is exact.
    let mut value = int_value.checked_mul(multiplier)?;
    let mut frac_multiplier = multiplier;
    for c in frac_digits.chars() {
        frac_multiplier /= 10;
        if frac_multiplier == 0 {
            break;
        }
        let digit = i128::from(c.to_digit(10)?);
        value = value.checked_add(digit.checked_mul(frac_multiplier)?)?;
    }

    if negative {
        value = -value;
    }
    i64::try_from(value).ok()
}
