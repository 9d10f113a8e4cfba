//! Detection of "I want to go somewhere else" in free-text chat.
//!
//! Best effort: a closed set of phrasings, each capturing the new place. A
//! phrasing that is not listed simply goes unnoticed.

use std::sync::LazyLock;

use regex::Regex;

/// Phrasings that name the destination outright.
const EXPLICIT_PATTERNS: &[&str] = &[
    r"(?i)\b(?:change|switch|update)\s+(?:the\s+|my\s+|our\s+)?destination\s+(?:to|for)\s+(?P<dest>.+)",
    r"(?i)\bnew\s+destination\s*(?:is|:)\s*(?P<dest>.+)",
];

/// Looser phrasings. Once a plan exists these read like edits to it
/// ("let's visit the gallery instead"), so they only count before review.
const CASUAL_PATTERNS: &[&str] = &[
    r"(?i)^\s*(?:actually|instead|wait)[,!.]?\s+(?:i\s+want\s+to\s+|let'?s\s+|we\s+should\s+)?(?:go|travel|head|fly)\s+to\s+(?P<dest>.+)",
    r"(?i)\b(?:i|we)(?:\s+want|'d\s+like|\s+would\s+like|'d\s+rather|\s+would\s+rather|\s+prefer)(?:\s+to)?\s+(?:go|travel|visit)\s+(?:to\s+)?(?P<dest>.+?)\s+instead\b",
    r"(?i)\b(?:let'?s|can\s+we)\s+(?:go\s+to|visit|do|try)\s+(?P<dest>.+?)\s+instead\b",
    r"(?i)\bhow\s+about\s+(?P<dest>.+?)\s+instead\b",
    r"(?i)\binstead\s+of\s+[^,]+,\s*(?:let'?s\s+)?(?:go\s+to|visit)\s+(?P<dest>.+)",
    r"(?i)\b(?:change|switch)\s+(?:it\s+)?to\s+(?P<dest>.+?)\s+instead\b",
];

static EXPLICIT: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(EXPLICIT_PATTERNS));
static CASUAL: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(CASUAL_PATTERNS));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = p, error = %e, "invalid destination pattern");
                None
            }
        })
        .collect()
}

const STOPWORDS: &[&str] = &[
    "that",
    "this",
    "it",
    "there",
    "here",
    "else",
    "somewhere",
    "somewhere else",
    "anywhere",
    "elsewhere",
    "something",
    "something else",
    "another place",
    "another destination",
    "a different place",
    "different",
    "another",
];

const TRAILING_FILLERS: &[&str] = &["instead", "please", "now", "then"];

/// The new destination named in `message`, if it asks for a change.
pub fn detect(message: &str) -> Option<String> {
    detect_explicit(message).or_else(|| first_match(&CASUAL, message))
}

/// Like [`detect`], but only for requests that say "destination" outright.
pub fn detect_explicit(message: &str) -> Option<String> {
    first_match(&EXPLICIT, message)
}

fn first_match(matchers: &[Regex], message: &str) -> Option<String> {
    matchers.iter().find_map(|re| {
        let captured = re.captures(message)?.name("dest")?.as_str();
        clean(captured)
    })
}

fn clean(raw: &str) -> Option<String> {
    let cut = raw
        .find(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | '\n'))
        .map_or(raw, |idx| &raw[..idx]);
    let mut dest = cut.trim().trim_matches(|c| c == '"' || c == '\'').trim();

    loop {
        let lowered = dest.to_ascii_lowercase();
        let Some(filler) = TRAILING_FILLERS
            .iter()
            .find(|f| lowered.ends_with(*f) && lowered.len() > f.len())
        else {
            break;
        };
        let head = &dest[..dest.len() - filler.len()];
        if !head.ends_with(char::is_whitespace) {
            break;
        }
        dest = head.trim_end();
    }

    let len = dest.chars().count();
    if !(2..=99).contains(&len) {
        return None;
    }
    let lowered = dest.to_lowercase();
    if STOPWORDS.contains(&lowered.as_str()) {
        return None;
    }
    Some(dest.to_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(EXPLICIT.len(), EXPLICIT_PATTERNS.len());
        assert_eq!(CASUAL.len(), CASUAL_PATTERNS.len());
    }

    #[test]
    fn explicit_detection_ignores_plan_edits() {
        for message in [
            "On day 2, let's visit the Borghese Gallery instead",
            "How about the Pantheon instead?",
            "Actually, I want to go to the market",
        ] {
            assert_eq!(detect_explicit(message), None, "{message}");
        }
        assert_eq!(
            detect_explicit("Please change the destination to Florence").as_deref(),
            Some("Florence")
        );
        assert_eq!(detect_explicit("new destination is Naples").as_deref(), Some("Naples"));
    }

    #[test]
    fn recognises_common_phrasings() {
        let cases = [
            ("Actually, I want to go to Paris", "Paris"),
            ("Can you change the destination to Kyoto?", "Kyoto"),
            ("switch destination to New York please", "New York"),
            ("I'd rather visit Lisbon instead.", "Lisbon"),
            ("We want to go to Mexico City instead", "Mexico City"),
            ("let's do Barcelona instead", "Barcelona"),
            ("How about Vienna instead?", "Vienna"),
            ("Instead of Rome, let's go to Florence", "Florence"),
            ("new destination: Reykjavik", "Reykjavik"),
            ("change it to Oslo instead", "Oslo"),
        ];
        for (message, expected) in cases {
            assert_eq!(detect(message).as_deref(), Some(expected), "{message}");
        }
    }

    #[test]
    fn ordinary_chat_is_ignored() {
        for message in [
            "We love museums and long walks",
            "I want to go to a cooking class on day 2",
            "Three travelers, moderate pace",
        ] {
            assert_eq!(detect(message), None, "{message}");
        }
    }

    #[test]
    fn implausible_destinations_are_rejected() {
        assert_eq!(detect("how about somewhere else instead"), None);
        assert_eq!(detect("let's do that instead"), None);
        assert_eq!(detect("new destination: X"), None);
        let long = format!("new destination: {}", "a".repeat(120));
        assert_eq!(detect(&long), None);
    }
}
