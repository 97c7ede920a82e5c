//! Bot token sanity checks (shape only; the Bot API is the real authority).

use std::sync::OnceLock;

use regex::Regex;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{6,10}:[0-9A-Za-z_-]{35}$").expect("valid regex"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenReport {
    /// Length in characters of the raw value, including any whitespace.
    pub length: usize,
    pub has_surrounding_whitespace: bool,
    pub format_ok: bool,
}

pub fn inspect(raw: &str) -> TokenReport {
    let trimmed = raw.trim();
    TokenReport {
        length: raw.chars().count(),
        has_surrounding_whitespace: trimmed.len() != raw.len(),
        format_ok: token_re().is_match(trimmed),
    }
}

pub fn is_well_formed(raw: &str) -> bool {
    inspect(raw).format_ok
}

/// Keep the numeric bot id, hide the secret part.
pub fn mask(token: &str) -> String {
    let token = token.trim();
    match token.split_once(':') {
        Some((id, secret)) => format!("{id}:{}", "*".repeat(secret.chars().count())),
        None => "*".repeat(token.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "123456789:AAbbCCddEEffGGhhIIjjKKllMMnnOOpp_-Q";

    #[test]
    fn accepts_well_formed_token() {
        let r = inspect(GOOD);
        assert!(r.format_ok);
        assert!(!r.has_surrounding_whitespace);
        assert_eq!(r.length, GOOD.len());
    }

    #[test]
    fn flags_whitespace_but_still_checks_trimmed_shape() {
        let raw = format!("{GOOD}\r\n");
        let r = inspect(&raw);
        assert!(r.has_surrounding_whitespace);
        assert!(r.format_ok);
        assert_eq!(r.length, GOOD.len() + 2);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(!is_well_formed("12345:AAbbCCddEEffGGhhIIjjKKllMMnnOOpp_-Q"));
        assert!(!is_well_formed("123456789:short"));
        assert!(!is_well_formed("123456789AAbbCCddEEffGGhhIIjjKKllMMnnOOpp_-Q"));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn mask_hides_secret() {
        let m = mask(GOOD);
        assert!(m.starts_with("123456789:"));
        assert!(!m.contains("AAbb"));
        assert_eq!(m.len(), GOOD.len());
    }
}
