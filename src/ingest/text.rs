// src/ingest/text.rs
//! Regex helpers shared by the listing parsers.

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_phone() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(\+?1?[\s\-]?\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{4})").unwrap())
}

pub(crate) fn re_time() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}:\d{2}\s*[APap][Mm]|\d{1,2}\s*[APap][Mm])").unwrap())
}

fn re_address() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d+\s+[A-Za-z0-9\s\.]{3,30}(?:St|Dr|Rd|Ave|Blvd|Ln|Way|Ct|Pl)[\.]*,?\s+[A-Za-z\s]+,\s*[A-Z]{2}\s+\d{5})",
        )
        .unwrap()
    })
}

/// First phone-number-looking run in `text`.
pub fn parse_phone(text: &str) -> Option<String> {
    re_phone()
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}

/// First clock time ("7:30pm", "8 PM") in `text`.
pub fn parse_time(text: &str) -> Option<String> {
    re_time().find(text).map(|m| m.as_str().trim().to_string())
}

/// Street address ending in "City, ST 12345".
pub fn parse_address(text: &str) -> Option<String> {
    re_address()
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}

/// Three-digit area code, with a leading country `1` stripped from 11-digit numbers.
pub fn area_code(phone: &str) -> Option<String> {
    let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() >= 3 {
        Some(digits[..3].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_is_trimmed() {
        assert_eq!(
            parse_phone("Call (850) 555-1234 for info").as_deref(),
            Some("(850) 555-1234")
        );
        assert_eq!(parse_phone("no digits here"), None);
    }

    #[test]
    fn time_variants() {
        assert_eq!(parse_time("Sign up 7:30pm sharp").as_deref(), Some("7:30pm"));
        assert_eq!(parse_time("Doors 8 PM").as_deref(), Some("8 PM"));
        assert_eq!(parse_time("all night"), None);
    }

    #[test]
    fn address_needs_street_city_state_zip() {
        let txt = "Blue Tavern 123 Main St, Tallahassee, FL 32301 (850) 555-1234";
        assert_eq!(
            parse_address(txt).as_deref(),
            Some("123 Main St, Tallahassee, FL 32301")
        );
        assert_eq!(parse_address("Main St, Tallahassee"), None);
    }

    #[test]
    fn area_code_handles_country_prefix() {
        assert_eq!(area_code("+1 (229) 555-0100").as_deref(), Some("229"));
        assert_eq!(area_code("850-555-1234").as_deref(), Some("850"));
        assert_eq!(area_code("55"), None);
    }
}
