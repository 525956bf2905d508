use std::collections::BTreeSet;

/// Resolve a page specification like "1-3,7,9-12" against a document with
/// `total_pages` pages.
///
/// Returns zero-based page indices, ascending and without duplicates. Tokens
/// that don't parse, ranges that run backwards, and pages outside
/// `1..=total_pages` are dropped rather than rejected, so a spec made only of
/// such tokens yields an empty list. Callers decide whether that is an error.
pub fn select_pages(spec: &str, total_pages: usize) -> Vec<usize> {
    let mut pages = BTreeSet::new();

    for token in spec.split(',').map(str::trim) {
        if token.contains('-') {
            let mut bounds = token.split('-').map(parse_page_number);
            let (Some(Some(start)), Some(Some(end))) = (bounds.next(), bounds.next()) else {
                continue;
            };

            // Iteration starts at `start` but only pages >= 1 count, and the
            // end is clamped to the last page.
            let first = start.max(1);
            let last = end.min(total_pages as i64);
            if first <= last {
                pages.extend((first..=last).map(|p| (p - 1) as usize));
            }
        } else if let Some(page) = parse_page_number(token) {
            if page >= 1 && page <= total_pages as i64 {
                pages.insert((page - 1) as usize);
            }
        }
    }

    pages.into_iter().collect()
}

fn parse_page_number(s: &str) -> Option<i64> {
    leading_int(s)
}

/// Read the integer at the start of `s`, ignoring whatever follows it:
/// `"3abc"` is 3 and `"2.5"` is 2. Surrounding whitespace and a single sign
/// are allowed. Returns `None` when no digit leads the text. Values past the
/// range of `i64` saturate.
pub fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for d in digits.bytes().take_while(u8::is_ascii_digit) {
        seen = true;
        let digit = i64::from(d - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    seen.then_some(value)
}
