use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Normalize a phone number to digits with the 55 country code
/// (Brazilian format: 5511999999999).
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 11 {
        return format!("55{}", digits);
    }

    digits
}

/// CPF validation including check digits.
pub fn validate_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 11 {
        return false;
    }

    // All-equal sequences pass the checksum but are not valid documents
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, &d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rem = (sum * 10) % 11;
        if rem >= 10 {
            0
        } else {
            rem
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// Strict `DD/MM/YYYY` parsing; anything else is rejected.
pub fn parse_br_date(text: &str) -> Option<NaiveDate> {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATE_RE.get_or_init(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").unwrap());

    let caps = re.captures(text.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn format_br_date(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", date.day(), date.month(), date.year())
}

/// BRL currency formatting (R$ 1.234,56).
pub fn format_currency(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let whole = cents / 100;
    let frac = (cents % 100).abs();

    let whole_str = whole.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in whole_str.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    let sign = if whole < 0 { "-" } else { "" };
    format!("R$ {}{},{:02}", sign, grouped, frac)
}

/// Unique idempotency key, optionally prefixed (e.g. "pay_l2xk1_3fa8b2c1d9e0").
pub fn generate_idempotency_key(prefix: &str) -> String {
    let timestamp = format!("{:x}", chrono::Utc::now().timestamp_millis());
    let uuid: String = Uuid::new_v4().simple().to_string()[..12].to_string();
    if prefix.is_empty() {
        format!("{}_{}", timestamp, uuid)
    } else {
        format!("{}_{}_{}", prefix, timestamp, uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_national_number_to_country_format() {
        assert_eq!(normalize_phone("11999999999"), "5511999999999");
        assert_eq!(normalize_phone("5511999999999"), "5511999999999");
        assert_eq!(normalize_phone("(11) 99999-9999"), "5511999999999");
    }

    #[test]
    fn validates_cpf_check_digits() {
        assert!(validate_cpf("52998224725"));
        assert!(validate_cpf("529.982.247-25"));
        assert!(!validate_cpf("52998224724"));
        assert!(!validate_cpf("11111111111"));
        assert!(!validate_cpf("123"));
    }

    #[test]
    fn parses_strict_br_dates() {
        assert_eq!(
            parse_br_date("15/01/2026"),
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
        assert_eq!(parse_br_date("31/02/2026"), None);
        assert_eq!(parse_br_date("2026-01-15"), None);
        assert_eq!(parse_br_date("1/1/2026"), None);
    }

    #[test]
    fn formats_currency_in_brl() {
        assert_eq!(format_currency(200.0), "R$ 200,00");
        assert_eq!(format_currency(1234.5), "R$ 1.234,50");
    }
}
