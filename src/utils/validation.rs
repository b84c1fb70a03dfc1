use regex::Regex;

/// Indian mobile number: ten digits starting with 6-9.
pub fn validate_mobile(mobile: &str) -> bool {
    Regex::new(r"^[6-9]\d{9}$")
        .map(|re| re.is_match(mobile))
        .unwrap_or(false)
}
