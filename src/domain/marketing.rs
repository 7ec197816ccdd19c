//! Marketing claim extraction from the structured product-detail document.
//!
//! The document comes from an upstream OCR/structuring stage and is loosely shaped: both
//! the nested layout (`benefits_and_effects.primary_functions`, ...) and the flat layout
//! (`benefits_claims`, `key_ingredients`, ...) are accepted. Unknown keys are ignored.

use crate::domain::aggregation::normalize_point;
use crate::domain::recovery::ResponseNormalizer;
use crate::domain::{ClaimCategory, DomainError, MarketingClaim, ParseOutcome};
use serde_json::Value;
use std::collections::HashSet;

/// (json path, category) pairs read in this order.
const CLAIM_PATHS: &[(&[&str], ClaimCategory)] = &[
    (&["product_summary"], ClaimCategory::General),
    (&["benefits_claims"], ClaimCategory::Efficacy),
    (&["benefits_and_effects", "primary_functions"], ClaimCategory::Efficacy),
    (&["benefits_and_effects", "detailed_benefits"], ClaimCategory::Efficacy),
    (&["benefits_and_effects", "clinical_data"], ClaimCategory::Efficacy),
    (&["key_ingredients"], ClaimCategory::Ingredient),
    (&["detailed_ingredients", "main_ingredients"], ClaimCategory::Ingredient),
    (&["detailed_ingredients", "functional_ingredients"], ClaimCategory::Ingredient),
    (&["usage_instructions"], ClaimCategory::Usage),
    (&["usage_instructions", "detailed_method"], ClaimCategory::Usage),
    (&["usage_instructions", "recommended_for"], ClaimCategory::Usage),
    (&["safety_and_precautions", "safety_claims"], ClaimCategory::Safety),
    (&["safety_claims"], ClaimCategory::Safety),
    (&["certifications_and_approvals"], ClaimCategory::Certification),
    (&["certifications"], ClaimCategory::Certification),
];

/// Claim-like values that carry no information.
const PLACEHOLDERS: &[&str] = &["", "none", "n/a", "na", "null", "-", "unknown", "not specified"];

fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |node, key| node.get(*key))
}

/// Flattens strings, arrays and objects into claim sentences.
///
/// Objects render as `"key: value"` per leaf so e.g. `{"kfda": "functional cosmetic"}`
/// becomes `"kfda: functional cosmetic"`. Nested objects already covered by a more
/// specific path are still included here; duplicates are dropped later.
fn collect_texts(value: &Value, prefix: Option<&str>, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if PLACEHOLDERS.contains(&s.to_lowercase().as_str()) {
                return;
            }
            match prefix {
                Some(p) => out.push(format!("{}: {}", p.replace('_', " "), s)),
                None => out.push(s.to_string()),
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_texts(item, prefix, out);
            }
        }
        Value::Object(map) => {
            for (key, v) in map {
                collect_texts(v, Some(key.as_str()), out);
            }
        }
        Value::Bool(true) => {
            if let Some(p) = prefix {
                out.push(p.replace('_', " "));
            }
        }
        _ => {}
    }
}

fn has_child_paths(path: &[&str]) -> bool {
    CLAIM_PATHS
        .iter()
        .any(|(p, _)| p.len() > path.len() && p.starts_with(path))
}

fn is_child_path(path: &[&str], key: &str) -> bool {
    CLAIM_PATHS
        .iter()
        .any(|(p, _)| p.len() == path.len() + 1 && p.starts_with(path) && p[path.len()] == key)
}

/// Extract claims from an already parsed document. Claim ids are assigned 1.. in
/// extraction order; claims with the same normalized text are kept once.
pub fn extract_claims(product_id: i64, doc: &Value) -> Vec<MarketingClaim> {
    let mut seen = HashSet::new();
    let mut claims = Vec::new();

    for (path, category) in CLAIM_PATHS {
        let Some(node) = lookup(doc, path) else {
            continue;
        };
        let mut texts = Vec::new();
        match node {
            // Keys with a more specific path of their own are read by that path; the
            // remaining siblings belong to this one.
            Value::Object(map) if has_child_paths(path) => {
                for (key, v) in map {
                    if !is_child_path(path, key) {
                        collect_texts(v, Some(key.as_str()), &mut texts);
                    }
                }
            }
            _ => collect_texts(node, None, &mut texts),
        }
        for text in texts {
            if seen.insert(normalize_point(&text)) {
                claims.push(MarketingClaim {
                    id: claims.len() as i64 + 1,
                    product_id,
                    category: *category,
                    text,
                });
            }
        }
    }
    claims
}

/// Parse a stored product-detail document (plain JSON, fenced or prose-wrapped) and
/// extract its claims.
pub fn extract_claims_from_text(product_id: i64, raw: &str) -> Result<Vec<MarketingClaim>, DomainError> {
    match ResponseNormalizer::default().normalize::<Value>(raw) {
        ParseOutcome::Parsed(doc) if doc.is_object() => Ok(extract_claims(product_id, &doc)),
        ParseOutcome::Parsed(_) => Err(DomainError::InvalidInput(format!(
            "product {} detail document is not a JSON object",
            product_id
        ))),
        ParseOutcome::Unparseable(_) => Err(DomainError::InvalidInput(format!(
            "product {} detail document is not valid JSON",
            product_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_layout() {
        let doc = json!({
            "product_summary": "Gentle daily moisturizer",
            "benefits_claims": ["Suitable for all skin types", "Hydrates for 24 hours"],
            "key_ingredients": ["Hyaluronic acid"],
            "usage_instructions": "Apply morning and evening"
        });
        let claims = extract_claims(3, &doc);
        let texts: Vec<&str> = claims.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Gentle daily moisturizer",
                "Suitable for all skin types",
                "Hydrates for 24 hours",
                "Hyaluronic acid",
                "Apply morning and evening"
            ]
        );
        assert_eq!(claims[1].category, ClaimCategory::Efficacy);
        assert_eq!(claims[3].category, ClaimCategory::Ingredient);
        assert_eq!(claims[4].category, ClaimCategory::Usage);
        assert!(claims.iter().all(|c| c.product_id == 3));
        assert_eq!(claims.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_nested_layout() {
        let doc = json!({
            "benefits_and_effects": {
                "primary_functions": ["Whitening", "Wrinkle care"],
                "clinical_data": "Moisture up 35% after 4 weeks"
            },
            "detailed_ingredients": {"main_ingredients": ["Niacinamide"]},
            "usage_instructions": {"detailed_method": "Pat gently", "frequency": "daily"},
            "certifications_and_approvals": {"vegan": true, "kfda": "functional cosmetic", "other": "none"}
        });
        let claims = extract_claims(1, &doc);
        let by_text = |t: &str| claims.iter().find(|c| c.text == t).map(|c| c.category);

        assert_eq!(by_text("Whitening"), Some(ClaimCategory::Efficacy));
        assert_eq!(by_text("Moisture up 35% after 4 weeks"), Some(ClaimCategory::Efficacy));
        assert_eq!(by_text("Niacinamide"), Some(ClaimCategory::Ingredient));
        assert_eq!(by_text("Pat gently"), Some(ClaimCategory::Usage));
        assert_eq!(by_text("vegan"), Some(ClaimCategory::Certification));
        assert_eq!(by_text("kfda: functional cosmetic"), Some(ClaimCategory::Certification));
        assert!(claims.iter().all(|c| !c.text.contains("none")));
        // Siblings without a path of their own are read under the parent's category.
        assert_eq!(by_text("frequency: daily"), Some(ClaimCategory::Usage));
        assert_eq!(claims.iter().filter(|c| c.text.contains("Pat gently")).count(), 1);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let doc = json!({
            "benefits_claims": ["Soothing", "soothing."],
            "benefits_and_effects": {"detailed_benefits": ["Soothing"]}
        });
        assert_eq!(extract_claims(1, &doc).len(), 1);
    }

    #[test]
    fn test_fenced_document() {
        let raw = "```json\n{\"benefits_claims\": [\"Non-irritating\"]}\n```";
        let claims = extract_claims_from_text(9, raw).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].text, "Non-irritating");
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            extract_claims_from_text(9, "no structure here"),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(extract_claims_from_text(9, "[1, 2]").is_err());
    }
}
