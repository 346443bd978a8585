//! Field-level validation for the forms and JSON bodies.
//!
//! Every incoming form is first deserialised as raw strings, then checked here. Errors are keyed by
//! field name so the HTML forms can show them next to the right input and the JSON API can return
//! them as a map.

use email_address::EmailAddress;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, str::FromStr};
use time::{Date, PrimitiveDateTime, macros::format_description};

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        //first problem wins, the user fixes one thing at a time
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every message on one line, for places with no form to put them next to.
    pub fn summary(&self) -> String {
        self.0.values().map(String::as_str).collect::<Vec<_>>().join("; ")
    }

    /// Trimmed, non-empty text.
    pub fn required(&mut self, field: &'static str, label: &str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, format!("{label} is required"));
        }
        value.to_string()
    }

    pub fn optional(value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> Option<EmailAddress> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, "Email is required");
            return None;
        }
        match EmailAddress::from_str(value) {
            Ok(email) => Some(email),
            Err(e) => {
                self.add(field, format!("Invalid email address: {e}"));
                None
            }
        }
    }

    pub fn integer_in_range<T>(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
        range: std::ops::RangeInclusive<T>,
    ) -> Option<T>
    where
        T: FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, format!("{label} is required"));
            return None;
        }
        match value.parse::<T>() {
            Ok(n) if range.contains(&n) => Some(n),
            Ok(_) => {
                self.add(
                    field,
                    format!(
                        "{label} must be between {} and {}",
                        range.start(),
                        range.end()
                    ),
                );
                None
            }
            Err(_) => {
                self.add(field, format!("{label} must be a whole number"));
                None
            }
        }
    }

    pub fn score(&mut self, field: &'static str, label: &str, value: &str, max: f64) -> Option<f64> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, format!("{label} is required"));
            return None;
        }
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() && (0.0..=max).contains(&n) => Some(n),
            Ok(_) => {
                self.add(field, format!("{label} must be between 0 and {max}"));
                None
            }
            Err(_) => {
                self.add(field, format!("{label} must be a number"));
                None
            }
        }
    }

    /// Parses an amount like `12`, `12.5` or `12.50` into cents.
    pub fn amount_cents(&mut self, field: &'static str, value: &str) -> Option<i64> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, "Amount is required");
            return None;
        }
        if let Some(cents) = parse_cents(value) {
            Some(cents)
        } else {
            self.add(field, "Amount must be a positive amount with at most two decimals");
            None
        }
    }

    pub fn date(&mut self, field: &'static str, label: &str, value: &str) -> Option<Date> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, format!("{label} is required"));
            return None;
        }
        match Date::parse(value, format_description!("[year]-[month]-[day]")) {
            Ok(date) => Some(date),
            Err(_) => {
                self.add(field, format!("{label} must be a date (YYYY-MM-DD)"));
                None
            }
        }
    }

    /// Accepts what an `<input type="datetime-local">` sends, with or without seconds.
    pub fn datetime(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
    ) -> Option<PrimitiveDateTime> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, format!("{label} is required"));
            return None;
        }
        let without_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]");
        let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        match PrimitiveDateTime::parse(value, without_seconds)
            .or_else(|_| PrimitiveDateTime::parse(value, with_seconds))
        {
            Ok(dt) => Some(dt),
            Err(_) => {
                self.add(field, format!("{label} must be a date and time"));
                None
            }
        }
    }

    pub fn choice<T: FromStr>(&mut self, field: &'static str, label: &str, value: &str) -> Option<T> {
        match value.trim().parse() {
            Ok(x) => Some(x),
            Err(_) => {
                self.add(field, format!("Unknown {label} {value:?}"));
                None
            }
        }
    }
}

/// Lets the same raw form struct take `"3"` from an urlencoded body and `3` from a JSON one.
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Int(n) => n.to_string(),
        StringOrNumber::Float(n) => n.to_string(),
        StringOrNumber::Bool(b) => b.to_string(),
    })
}

fn parse_cents(value: &str) -> Option<i64> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_reports() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.required("name", "Name", "  Amina "), "Amina");
        assert!(errors.is_empty());

        errors.required("name", "Name", "   ");
        assert_eq!(errors.get("name"), Some("Name is required"));
    }

    #[test]
    fn first_error_per_field_is_kept() {
        let mut errors = FieldErrors::default();
        errors.add("year", "first");
        errors.add("year", "second");
        assert_eq!(errors.get("year"), Some("first"));
    }

    #[test]
    fn emails_are_checked() {
        let mut errors = FieldErrors::default();
        assert!(errors.email("email", "yusuf@school.example").is_some());
        assert!(errors.email("email", "not an email").is_none());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn ranges_are_enforced() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.integer_in_range("year", "Year", "3", 1..=12), Some(3));
        assert_eq!(errors.integer_in_range("year", "Year", "13", 1..=12), None);
        assert_eq!(
            errors.get("year"),
            Some("Year must be between 1 and 12")
        );

        let mut errors = FieldErrors::default();
        assert_eq!(errors.integer_in_range::<i32>("year", "Year", "three", 1..=12), None);
        assert_eq!(errors.get("year"), Some("Year must be a whole number"));
    }

    #[test]
    fn scores_must_fit_under_max() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.score("score", "Score", "87.5", 100.0), Some(87.5));
        assert_eq!(errors.score("score", "Score", "101", 100.0), None);
        assert_eq!(errors.score("other", "Score", "-1", 100.0), None);
        assert_eq!(errors.score("nan", "Score", "NaN", 100.0), None);
    }

    #[test]
    fn amounts_become_cents() {
        assert_eq!(parse_cents("12"), Some(1200));
        assert_eq!(parse_cents("12.5"), Some(1250));
        assert_eq!(parse_cents("12.05"), Some(1205));
        assert_eq!(parse_cents("0.99"), Some(99));
        assert_eq!(parse_cents("12.345"), None);
        assert_eq!(parse_cents("-3"), None);
        assert_eq!(parse_cents(".5"), None);
        assert_eq!(parse_cents("1e3"), None);
    }

    #[test]
    fn dates_and_datetimes_parse() {
        let mut errors = FieldErrors::default();
        let date = errors.date("date", "Date", "2024-09-02").expect("valid date");
        assert_eq!(date.to_string(), "2024-09-02");

        let dt = errors
            .datetime("starts_at", "Start", "2024-09-02T08:30")
            .expect("valid datetime");
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.minute(), 30);
        assert!(errors.is_empty());

        assert!(errors.date("date", "Date", "02/09/2024").is_none());
        assert!(errors.get("date").is_some());
    }

    #[test]
    fn lenient_strings_take_numbers() {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(deserialize_with = "lenient_string")]
            year: String,
            #[serde(deserialize_with = "lenient_string")]
            score: String,
        }

        let raw: Raw = serde_json::from_str(r#"{"year": 3, "score": 87.5}"#).expect("numbers");
        assert_eq!(raw.year, "3");
        assert_eq!(raw.score, "87.5");

        let raw: Raw = serde_json::from_str(r#"{"year": "4", "score": "90"}"#).expect("strings");
        assert_eq!(raw.year, "4");
        assert_eq!(raw.score, "90");
    }

    #[test]
    fn summary_lists_every_field() {
        let mut errors = FieldErrors::default();
        errors.add("score", "Score must be between 0 and 100");
        errors.add("assessment_type", "Unknown assessment type \"quiz\"");
        assert_eq!(
            errors.summary(),
            "Unknown assessment type \"quiz\"; Score must be between 0 and 100"
        );
    }
}
