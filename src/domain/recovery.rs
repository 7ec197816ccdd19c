//! Response normalizer. Turns loosely formatted service output into typed values.
//!
//! Strategies run in a fixed priority order and the first one that yields a value that
//! deserializes wins. Strategies only drop surrounding prose, code fences and whitespace;
//! they never rewrite the JSON itself.

use crate::domain::ParseOutcome;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use tracing::debug;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("valid fenced-block regex")
});

/// One way of locating a JSON document inside raw text.
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidate JSON text, or `None` when the strategy does not apply.
    fn extract<'a>(&self, raw: &'a str) -> Option<Cow<'a, str>>;
}

/// The whole response, trimmed.
pub struct Strict;

impl RecoveryStrategy for Strict {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn extract<'a>(&self, raw: &'a str) -> Option<Cow<'a, str>> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(Cow::Borrowed(trimmed))
    }
}

/// Contents of the first markdown code fence (```json ... ``` or ``` ... ```).
pub struct FencedBlock;

impl RecoveryStrategy for FencedBlock {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract<'a>(&self, raw: &'a str) -> Option<Cow<'a, str>> {
        FENCED_BLOCK
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(Cow::Borrowed)
    }
}

/// Everything from the first `{` to the last `}`.
pub struct OuterBraces;

impl RecoveryStrategy for OuterBraces {
    fn name(&self) -> &'static str {
        "outer_braces"
    }

    fn extract<'a>(&self, raw: &'a str) -> Option<Cow<'a, str>> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        (start < end).then(|| Cow::Borrowed(&raw[start..=end]))
    }
}

/// The largest balanced `{...}` fragment, ignoring braces inside JSON strings.
pub struct LargestObject;

impl LargestObject {
    fn balanced_objects(raw: &str) -> Vec<&str> {
        let bytes = raw.as_bytes();
        let mut found = Vec::new();
        let mut start = 0;
        while let Some(offset) = raw[start..].find('{') {
            let open = start + offset;
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            let mut close = None;
            for (i, &b) in bytes.iter().enumerate().skip(open) {
                if in_string {
                    match b {
                        _ if escaped => escaped = false,
                        b'\\' => escaped = true,
                        b'"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            match close {
                Some(end) => {
                    found.push(&raw[open..=end]);
                    start = end + 1;
                }
                None => start = open + 1,
            }
        }
        found
    }
}

impl RecoveryStrategy for LargestObject {
    fn name(&self) -> &'static str {
        "largest_object"
    }

    fn extract<'a>(&self, raw: &'a str) -> Option<Cow<'a, str>> {
        Self::balanced_objects(raw)
            .into_iter()
            .max_by_key(|s| s.len())
            .map(Cow::Borrowed)
    }
}

/// Strategies in priority order.
pub fn default_strategies() -> Vec<Box<dyn RecoveryStrategy>> {
    vec![
        Box::new(Strict),
        Box::new(FencedBlock),
        Box::new(OuterBraces),
        Box::new(LargestObject),
    ]
}

/// Ordered strategy list. First strategy whose candidate deserializes into `T` wins.
pub struct ResponseNormalizer {
    strategies: Vec<Box<dyn RecoveryStrategy>>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl ResponseNormalizer {
    pub fn new(strategies: Vec<Box<dyn RecoveryStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse `raw` into `T`, returning `Unparseable(raw)` when every strategy fails.
    pub fn normalize<T: DeserializeOwned>(&self, raw: &str) -> ParseOutcome<T> {
        for strategy in &self.strategies {
            let Some(candidate) = strategy.extract(raw) else {
                continue;
            };
            match serde_json::from_str::<T>(&candidate) {
                Ok(value) => {
                    debug!(strategy = strategy.name(), "response parsed");
                    return ParseOutcome::Parsed(value);
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "strategy did not yield valid JSON");
                }
            }
        }
        ParseOutcome::Unparseable(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        summary: String,
        items: Vec<String>,
    }

    const CLEAN: &str = r#"{"summary": "test", "items": ["a", "b"]}"#;

    fn parsed(raw: &str) -> Payload {
        match ResponseNormalizer::default().normalize::<Payload>(raw) {
            ParseOutcome::Parsed(p) => p,
            ParseOutcome::Unparseable(r) => panic!("expected parse, got unparseable: {}", r),
        }
    }

    #[test]
    fn test_strategy_order_is_fixed() {
        assert_eq!(
            ResponseNormalizer::default().strategy_names(),
            vec!["strict", "fenced_block", "outer_braces", "largest_object"]
        );
    }

    #[test]
    fn test_strict_clean() {
        assert_eq!(Strict.extract(CLEAN).unwrap(), CLEAN);
        assert_eq!(Strict.extract("   "), None);
    }

    #[test]
    fn test_fenced_block_markdown() {
        let input = format!("```json\n{}\n```", CLEAN);
        assert_eq!(FencedBlock.extract(&input).unwrap(), CLEAN);
    }

    #[test]
    fn test_fenced_block_no_lang() {
        let input = format!("Result:\n```\n{}\n```\nDone.", CLEAN);
        assert_eq!(FencedBlock.extract(&input).unwrap(), CLEAN);
    }

    #[test]
    fn test_outer_braces_with_text() {
        let input = format!("Here is the analysis:\n{}\nHope this helps!", CLEAN);
        assert_eq!(OuterBraces.extract(&input).unwrap(), CLEAN);
        assert_eq!(OuterBraces.extract("no json here"), None);
    }

    #[test]
    fn test_largest_object_skips_stray_braces() {
        let input = format!("Note {{draft}} then {} and {{x}}", CLEAN);
        assert_eq!(LargestObject.extract(&input).unwrap(), CLEAN);
    }

    #[test]
    fn test_largest_object_ignores_braces_in_strings() {
        let input = r#"prefix {"summary": "a } b", "items": []} suffix"#;
        assert_eq!(
            LargestObject.extract(input).unwrap(),
            r#"{"summary": "a } b", "items": []}"#
        );
    }

    #[test]
    fn test_prose_wrapped_equals_clean() {
        let clean = parsed(CLEAN);
        assert_eq!(parsed(&format!("Sure! Here you go:\n{}\nLet me know.", CLEAN)), clean);
        assert_eq!(parsed(&format!("```json\n{}\n```", CLEAN)), clean);
        // Outer braces would span both objects; only the balanced scan recovers this one.
        assert_eq!(parsed(&format!("{{oops}} {} trailing", CLEAN)), clean);
    }

    #[test]
    fn test_unparseable_keeps_raw_text() {
        let raw = "I could not analyze these reviews.";
        match ResponseNormalizer::default().normalize::<Payload>(raw) {
            ParseOutcome::Unparseable(r) => assert_eq!(r, raw),
            ParseOutcome::Parsed(_) => panic!("should not parse"),
        }
    }

    #[test]
    fn test_custom_strategy_list() {
        let strict_only = ResponseNormalizer::new(vec![Box::new(Strict)]);
        let wrapped = format!("text {}", CLEAN);
        assert!(!strict_only.normalize::<Payload>(&wrapped).is_parsed());
    }
}
