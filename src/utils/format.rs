//! Currency formatting for the latest-volume display

/// Insert `,` every three digits of the integer part of an already
/// formatted decimal string (`"-1234567.89"` -> `"-1,234,567.89"`).
pub fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format a USD amount en-US style with exactly two decimal places,
/// without the currency symbol
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return amount.to_string();
    }
    let formatted = format!("{:.2}", amount);
    // "-0.00" reads as a negative volume
    let formatted = if formatted == "-0.00" { "0.00".to_string() } else { formatted };
    group_thousands(&formatted)
}
