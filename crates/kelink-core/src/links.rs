//! Link detection for incoming group messages.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://").expect("valid regex"))
}

fn url_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://\S+").expect("valid regex"))
}

/// True if the text mentions an http(s) scheme anywhere. This is the trigger for
/// moderation, so it is deliberately looser than [`extract_url`].
pub fn contains_link(text: &str) -> bool {
    scheme_re().is_match(text)
}

/// Strip sentence punctuation off the end of a URL token. A closing bracket is
/// only stripped when the token has no matching opening bracket, so
/// `…/Rust_(programming_language)` keeps its `)`.
fn trim_trailing(candidate: &str) -> &str {
    let mut s = candidate;
    while let Some(last) = s.chars().last() {
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '>' => true,
            ')' | ']' | '}' => {
                let open = match last {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                s.matches(last).count() > s.matches(open).count()
            }
            _ => false,
        };
        if !strip {
            break;
        }
        s = &s[..s.len() - last.len_utf8()];
    }
    s
}

/// First absolute http(s) URL in the text, with trailing punctuation removed.
pub fn extract_url(text: &str) -> Option<Url> {
    url_token_re().find_iter(text).find_map(|m| {
        let candidate = trim_trailing(m.as_str());
        let url = Url::parse(candidate).ok()?;
        let host_ok = url.host_str().is_some_and(|h| !h.is_empty());
        (matches!(url.scheme(), "http" | "https") && host_ok).then_some(url)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_links_case_insensitively() {
        assert!(contains_link("look at HTTPS://Example.com"));
        assert!(contains_link("http://a.b"));
        assert!(!contains_link("no links, just www.example.com"));
        assert!(!contains_link("ftp://files.example.com"));
    }

    #[test]
    fn extracts_first_url_and_strips_punctuation() {
        let url = extract_url("read this (https://example.com/post?id=7).").unwrap();
        assert_eq!(url.as_str(), "https://example.com/post?id=7");

        let url = extract_url("two: http://one.example, https://two.example").unwrap();
        assert_eq!(url.host_str(), Some("one.example"));
    }

    #[test]
    fn keeps_balanced_brackets() {
        let wiki = "https://en.wikipedia.org/wiki/Rust_(programming_language)";
        assert_eq!(extract_url(wiki).unwrap().as_str(), wiki);

        let url = extract_url(&format!("(see {wiki}).")).unwrap();
        assert_eq!(url.as_str(), wiki);
    }

    #[test]
    fn skips_unparseable_candidates() {
        assert!(extract_url("https://").is_none());
        assert!(extract_url("broken https:// then https://ok.example/x").is_some());
        assert_eq!(
            extract_url("broken https:// then https://ok.example/x")
                .unwrap()
                .as_str(),
            "https://ok.example/x"
        );
    }
}
