//! Helpers shared by the plain-text tool reports.

pub const DESCRIPTION_LIMIT: usize = 200;

/// `1234567` -> `"1,234,567"`.
pub fn thousands(n: u64) -> String {
    group_digits(&n.to_string())
}

/// Fixed-point rendering with grouped integer digits: `12345.678, 2` -> `"12,345.68"`.
pub fn thousands_f64(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Cuts `s` to `max` characters, appending `...` only when something was cut.
pub fn abbreviate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

pub fn rule(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Percentage with two decimals: `0.04567` -> `"4.57%"`.
pub fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}
