//! Tolerant extraction of a verdict object from free-form reviewer output.
//!
//! Reviewers are asked for a bare JSON object but routinely wrap it in prose
//! or code fences. The first balanced `{...}` span wins. Brace counting does
//! not understand string literals, so a `}` inside a quoted value ends the
//! span early and surfaces as an invalid-JSON parse failure.

use super::Verdict;
use crate::errors::ParseError;
use serde::{Deserialize, Deserializer};

/// Fields decoded from a reviewer response, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReview {
    pub verdict: Verdict,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct RawReview {
    #[serde(default, deserialize_with = "null_as_default")]
    verdict: String,
    #[serde(default, deserialize_with = "null_as_default")]
    confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    suggestions: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Return the first balanced `{...}` span of `text`.
///
/// ```
/// use mergegate::auditor::extract_json;
///
/// let text = r#"Here is my review: {"verdict": "PASS", "confidence": 0.95} Done."#;
/// assert_eq!(extract_json(text), Some(r#"{"verdict": "PASS", "confidence": 0.95}"#));
/// assert_eq!(extract_json("no object here"), None);
/// ```
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Clamp a reported confidence into `[0, 1]`. NaN counts as 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Decode a reviewer response into a normalized review.
///
/// An unrecognized verdict token becomes `NeedsHuman` with an
/// `Unknown verdict: <token>` issue after the reviewer's own issues.
pub fn parse_response(response: &str) -> Result<ParsedReview, ParseError> {
    let json = extract_json(response).ok_or(ParseError::NoJson)?;
    let raw: RawReview =
        serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let mut issues = raw.issues;
    let verdict = match Verdict::from_token(&raw.verdict) {
        Some(verdict) => verdict,
        None => {
            issues.push(format!("Unknown verdict: {}", raw.verdict));
            Verdict::NeedsHuman
        }
    };

    Ok(ParsedReview {
        verdict,
        confidence: clamp_confidence(raw.confidence),
        issues,
        suggestions: raw.suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // extract_json tests
    // =========================================

    #[test]
    fn test_extract_json_surrounded_by_prose() {
        let text = r#"Here is my review: {"verdict": "PASS", "confidence": 0.95, "issues": [], "suggestions": ["add docs"]} Done."#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"verdict": "PASS", "confidence": 0.95, "issues": [], "suggestions": ["add docs"]}"#)
        );
    }

    #[test]
    fn test_extract_json_nested_objects() {
        let text = r#"x {"a": {"b": {}}, "c": 1} y {"d": 2}"#;
        assert_eq!(extract_json(text), Some(r#"{"a": {"b": {}}, "c": 1}"#));
    }

    #[test]
    fn test_extract_json_inside_code_fence() {
        let text = "```json\n{\"verdict\": \"FAIL\"}\n```";
        assert_eq!(extract_json(text), Some("{\"verdict\": \"FAIL\"}"));
    }

    #[test]
    fn test_extract_json_none_without_brace() {
        assert_eq!(extract_json("LGTM, ship it"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_extract_json_none_when_unbalanced() {
        assert_eq!(extract_json(r#"{"verdict": "PASS""#), None);
    }

    #[test]
    fn test_extract_json_handles_multibyte_text() {
        let text = "résumé → {\"verdict\": \"PASS\"} ✓";
        assert_eq!(extract_json(text), Some("{\"verdict\": \"PASS\"}"));
    }

    #[test]
    fn test_extract_json_reextraction_is_idempotent() {
        let text = "Looks fine.\n{\"verdict\":\"PASS\",\"confidence\":0.92,\"issues\":[],\"suggestions\":[\"add tests\"]}\nDone.";
        let object = r#"{"verdict":"PASS","confidence":0.92,"issues":[],"suggestions":["add tests"]}"#;

        let first = extract_json(text).unwrap();
        assert_eq!(first, object);
        assert_eq!(extract_json(first), Some(first));

        let review = parse_response(text).unwrap();
        assert_eq!(review.verdict, Verdict::Pass);
        assert_eq!(review.confidence, 0.92);
        assert_eq!(review.suggestions, vec!["add tests".to_string()]);

        assert_eq!(parse_response("I cannot determine"), Err(ParseError::NoJson));
    }

    #[test]
    fn test_extract_json_brace_in_string_ends_early() {
        let text = r#"{"issues": ["missing }"], "verdict": "PASS"}"#;
        assert_eq!(extract_json(text), Some(r#"{"issues": ["missing }"#));
        assert!(matches!(
            parse_response(text),
            Err(ParseError::InvalidJson(_))
        ));
    }

    // =========================================
    // clamp_confidence tests
    // =========================================

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(-0.3), 0.0);
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(0.5), 0.5);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        for c in [-100.0, -1.0, 0.0, 0.25, 1.0, 2.0, f64::INFINITY, f64::NEG_INFINITY] {
            let clamped = clamp_confidence(c);
            assert!((0.0..=1.0).contains(&clamped), "{c} -> {clamped}");
        }
    }

    // =========================================
    // parse_response tests
    // =========================================

    #[test]
    fn test_parse_full_response() {
        let parsed = parse_response(
            r#"Here is my review: {"verdict": "PASS", "confidence": 0.95, "issues": [], "suggestions": ["add docs"]} Done."#,
        )
        .unwrap();
        assert_eq!(parsed.verdict, Verdict::Pass);
        assert_eq!(parsed.confidence, 0.95);
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.suggestions, vec!["add docs"]);
    }

    #[test]
    fn test_parse_verdict_case_insensitive() {
        for (token, expected) in [
            ("pass", Verdict::Pass),
            ("Pass", Verdict::Pass),
            ("fail", Verdict::Fail),
            ("FAIL", Verdict::Fail),
            ("needs_human", Verdict::NeedsHuman),
            ("Needs_Human", Verdict::NeedsHuman),
        ] {
            let parsed =
                parse_response(&format!(r#"{{"verdict": "{token}", "confidence": 0.8}}"#)).unwrap();
            assert_eq!(parsed.verdict, expected, "token {token}");
            assert!(parsed.issues.is_empty());
        }
    }

    #[test]
    fn test_parse_unknown_verdict_appends_issue() {
        let parsed = parse_response(
            r#"{"verdict": "MAYBE", "confidence": 0.6, "issues": ["flaky test"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.verdict, Verdict::NeedsHuman);
        assert_eq!(parsed.issues, vec!["flaky test", "Unknown verdict: MAYBE"]);
        assert_eq!(parsed.confidence, 0.6);
    }

    #[test]
    fn test_parse_missing_fields_default() {
        let parsed = parse_response(r#"{"verdict": "FAIL"}"#).unwrap();
        assert_eq!(parsed.verdict, Verdict::Fail);
        assert_eq!(parsed.confidence, 0.0);
        assert!(parsed.issues.is_empty());
        assert!(parsed.suggestions.is_empty());
    }

    #[test]
    fn test_parse_null_fields_default() {
        let parsed =
            parse_response(r#"{"verdict": "PASS", "confidence": null, "issues": null}"#).unwrap();
        assert_eq!(parsed.confidence, 0.0);
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_parse_missing_verdict_is_unknown() {
        let parsed = parse_response(r#"{"confidence": 0.9}"#).unwrap();
        assert_eq!(parsed.verdict, Verdict::NeedsHuman);
        assert_eq!(parsed.issues, vec!["Unknown verdict: "]);
    }

    #[test]
    fn test_parse_clamps_confidence() {
        let high = parse_response(r#"{"verdict": "PASS", "confidence": 1.7}"#).unwrap();
        assert_eq!(high.confidence, 1.0);
        let low = parse_response(r#"{"verdict": "PASS", "confidence": -0.3}"#).unwrap();
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn test_parse_no_json() {
        assert_eq!(
            parse_response("I could not review this."),
            Err(ParseError::NoJson)
        );
    }

    #[test]
    fn test_parse_wrong_types_is_invalid_json() {
        let err = parse_response(r#"{"verdict": "PASS", "issues": "none"}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }
}
