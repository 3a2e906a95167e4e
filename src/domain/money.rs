use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// For EUR/USD, 1 unit = 100 cents, so a 50.00 contribution = 5000 cents.
pub type Cents = i64;

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// Negative amounts are rejected: no negative money enters the system
/// (debtor positions arise from arithmetic, never from input). More than
/// two fractional digits is an error rather than a silent truncation,
/// since sub-cent contributions cannot be stored.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseCentsError::Negative);
    }

    let (units_str, decimal_str) = match input.split_once('.') {
        None => (input, ""),
        Some((units, decimal)) => {
            if decimal.contains('.') {
                return Err(ParseCentsError::InvalidFormat);
            }
            (units, decimal)
        }
    };

    let units: i64 = if units_str.is_empty() && !decimal_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        // A single digit like "5" means 50 cents
        1 => {
            decimal_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        2 => decimal_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
        _ => return Err(ParseCentsError::TooPrecise),
    };

    Ok(units * 100 + decimal_cents)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Negative,
    TooPrecise,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Negative => write!(f, "amount cannot be negative"),
            ParseCentsError::TooPrecise => {
                write!(f, "amounts support at most two decimal digits")
            }
        }
    }
}

impl std::error::Error for ParseCentsError {}
