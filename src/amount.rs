use crate::error::{Result, StatementError};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Largest absolute difference between an entered amount and its computed
/// value that still counts as a match. The comparison is strict: a difference
/// of exactly 0.01 fails.
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Number of fraction digits shown for every amount.
pub const DISPLAY_SCALE: u32 = 2;

/// Largest magnitude an amount may have, 10^18. Any sum of parsed amounts
/// stays far inside the range of `Decimal`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Parses an amount as entered or recognized from a report image.
///
/// Grouping separators (`,`, `，`) and whitespace are stripped. A leading
/// `-` or accounting-style parentheses mark a negative amount. Empty or
/// otherwise malformed text resolves to zero, and so does any amount whose
/// magnitude exceeds [`MAX_AMOUNT`].
pub fn parse_amount(text: &str) -> Decimal {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '，') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let (negative, digits) = match cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    if !is_plain_decimal(digits) || (negative && digits.starts_with(['-', '+'])) {
        return Decimal::ZERO;
    }

    match Decimal::from_str(digits) {
        Ok(value) if value.abs() > MAX_AMOUNT => Decimal::ZERO,
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) => Decimal::ZERO,
    }
}

// Decimal::from_str is more lenient than we want (underscores, bare signs
// inside parentheses), so gate on a strict shape first.
fn is_plain_decimal(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut parts = body.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    let int_ok = int_part.chars().all(|c| c.is_ascii_digit());
    let frac_ok = frac_part.map_or(true, |f| f.chars().all(|c| c.is_ascii_digit()));
    let has_digits = !int_part.is_empty() || frac_part.is_some_and(|f| !f.is_empty());

    int_ok && frac_ok && has_digits
}

/// Rounds to the display scale, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(DISPLAY_SCALE);
    rounded
}

/// Formats an amount with grouped thousands and exactly two fraction digits,
/// e.g. `1234567.5` becomes `1,234,567.50`.
pub fn format_amount(value: Decimal) -> String {
    let rounded = round_amount(value);
    let plain = rounded.abs().to_string();
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{}{}.{}", sign, grouped, frac_part)
}

/// True when `diff` lies strictly inside the tolerance band.
pub fn within_tolerance(diff: Decimal) -> bool {
    diff.abs() < TOLERANCE
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Parses a report period such as `202504` into the last day of that month.
pub fn parse_report_period(period: &str) -> Result<NaiveDate> {
    let invalid = || StatementError::InvalidPeriod(period.to_string());

    if period.len() != 6 || !period.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = period[..4].parse().map_err(|_| invalid())?;
    let month: u32 = period[4..].parse().map_err(|_| invalid())?;

    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    last_day_of_month(year, month).ok_or_else(invalid)
}

pub fn format_report_period(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_grouped_amounts() {
        assert_eq!(parse_amount("1,234,567.00"), dec("1234567.00"));
        assert_eq!(parse_amount("1，234.5"), dec("1234.5"));
        assert_eq!(parse_amount(" 300 "), dec("300"));
        assert_eq!(parse_amount("-50.25"), dec("-50.25"));
        assert_eq!(parse_amount("(1,000.00)"), dec("-1000.00"));
        assert_eq!(parse_amount(".5"), dec("0.5"));
    }

    #[test]
    fn test_malformed_amounts_are_zero() {
        for text in [
            "", "   ", "abc", "12a", "--5", "1.2.3", "-", ".", "()", "1e5", "1_000", "(-5)",
        ] {
            assert_eq!(parse_amount(text), Decimal::ZERO, "input {:?}", text);
        }
    }

    #[test]
    fn test_out_of_range_amounts_are_zero() {
        assert_eq!(MAX_AMOUNT, dec("1000000000000000000"));
        assert_eq!(parse_amount("1,000,000,000,000,000,000.00"), MAX_AMOUNT);
        assert_eq!(parse_amount("(1,000,000,000,000,000,000)"), -MAX_AMOUNT);

        let decimal_max = "79,228,162,514,264,337,593,543,950,335";
        assert_eq!(parse_amount(decimal_max), Decimal::ZERO);
        assert_eq!(parse_amount(&format!("({})", decimal_max)), Decimal::ZERO);
        assert_eq!(parse_amount("1,000,000,000,000,000,000.01"), Decimal::ZERO);
        // beyond what Decimal can hold at all
        assert_eq!(parse_amount("792281625142643375935439503350"), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("1234567.5")), "1,234,567.50");
        assert_eq!(format_amount(dec("250")), "250.00");
        assert_eq!(format_amount(dec("-1000")), "-1,000.00");
        assert_eq!(format_amount(dec("0.005")), "0.01");
        assert_eq!(format_amount(dec("-0.004")), "0.00");
        assert_eq!(format_amount(dec("999.999")), "1,000.00");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let value = dec("98765.4321");
        assert_eq!(parse_amount(&format_amount(value)), dec("98765.43"));
    }

    #[test]
    fn test_tolerance_boundary() {
        assert_eq!(TOLERANCE, dec("0.01"));
        assert!(within_tolerance(dec("0.009")));
        assert!(within_tolerance(dec("-0.009")));
        assert!(!within_tolerance(dec("0.01")));
        assert!(!within_tolerance(dec("0.011")));
    }

    #[test]
    fn test_report_period() {
        let date = parse_report_period("202502").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(format_report_period(date), "202502");

        assert!(parse_report_period("2025-02").is_err());
        assert!(parse_report_period("202513").is_err());
        assert!(parse_report_period("").is_err());
    }
}
