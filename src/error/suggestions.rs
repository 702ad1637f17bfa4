//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with hints that
//! name the offending path, pattern, or skill.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
///
/// Falls back to [`ErrorCode::suggestion`] when the context lacks the
/// fields a richer hint needs.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::SkillNotFound => suggest_skill_not_found(context),
        ErrorCode::SkillAlreadyExists => suggest_already_exists(context),
        ErrorCode::FilterPatternInvalid => suggest_filter_pattern(context),
        ErrorCode::FlatNameCollision => suggest_flat_name_collision(context),
        ErrorCode::ConfigMissingRequired => suggest_config_missing_required(context),
        _ => code.suggestion().to_string(),
    }
}

fn suggest_skill_not_found(context: Option<&Value>) -> String {
    let name = context
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str);
    let available: Vec<&str> = context
        .and_then(|c| c.get("available"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    match name {
        Some(name) => {
            let similar = suggest_similar_names(name, &available, 3);
            if similar.is_empty() {
                format!(
                    "No skill named '{name}'. Available: {}",
                    if available.is_empty() {
                        "(none)".to_string()
                    } else {
                        available.join(", ")
                    }
                )
            } else {
                format!("No skill named '{name}'. Did you mean: {}?", similar.join(", "))
            }
        }
        None => ErrorCode::SkillNotFound.suggestion().to_string(),
    }
}

fn suggest_already_exists(context: Option<&Value>) -> String {
    let path = context
        .and_then(|c| c.get("path"))
        .and_then(Value::as_str);

    match path {
        Some(path) => format!(
            "{path} is already installed. Use --force to overwrite it, or --update to reinstall from its recorded source"
        ),
        None => ErrorCode::SkillAlreadyExists.suggestion().to_string(),
    }
}

fn suggest_filter_pattern(context: Option<&Value>) -> String {
    let pattern = context
        .and_then(|c| c.get("pattern"))
        .and_then(Value::as_str);

    match pattern {
        Some(pattern) => format!(
            "Pattern '{pattern}' is not a valid glob. Supported syntax: *, ?, [abc], [!abc]. No target was modified"
        ),
        None => ErrorCode::FilterPatternInvalid.suggestion().to_string(),
    }
}

fn suggest_flat_name_collision(context: Option<&Value>) -> String {
    let paths: Vec<&str> = context
        .and_then(|c| c.get("paths"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if paths.len() < 2 {
        return ErrorCode::FlatNameCollision.suggestion().to_string();
    }
    format!(
        "Skills {} flatten to the same target entry. Rename one of them in the source tree",
        paths.join(" and ")
    )
}

fn suggest_config_missing_required(context: Option<&Value>) -> String {
    let key = context
        .and_then(|c| c.get("config_key"))
        .and_then(Value::as_str);

    match key {
        Some(key) => format!("Required config '{key}' is missing. Add it to config.toml"),
        None => ErrorCode::ConfigMissingRequired.suggestion().to_string(),
    }
}

/// Suggest names similar to a misspelled one.
pub fn suggest_similar_names(query: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let mut scored: Vec<_> = available
        .iter()
        .map(|s| (s, similarity_score(&query_lower, &s.to_lowercase())))
        .filter(|(_, score)| *score > 0.3)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(s, _)| (*s).to_string())
        .collect()
}

/// Jaccard similarity over character trigrams.
#[allow(clippy::cast_precision_loss)]
fn similarity_score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_trigrams: std::collections::HashSet<_> = trigrams(a).collect();
    let b_trigrams: std::collections::HashSet<_> = trigrams(b).collect();

    if a_trigrams.is_empty() || b_trigrams.is_empty() {
        // short strings have no trigrams
        if a.starts_with(b) || b.starts_with(a) {
            return 0.8;
        }
        if a.contains(b) || b.contains(a) {
            return 0.5;
        }
        return 0.0;
    }

    let intersection = a_trigrams.intersection(&b_trigrams).count();
    let union = a_trigrams.union(&b_trigrams).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn trigrams(s: &str) -> impl Iterator<Item = &str> {
    (0..s.len().saturating_sub(2)).filter_map(move |i| s.get(i..i + 3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suggest_skill_not_found_with_close_match() {
        let context = json!({ "name": "pdf-tool", "available": ["pdf-tools", "docx"] });
        let suggestion = suggest_for_error(ErrorCode::SkillNotFound, Some(&context));
        assert!(suggestion.contains("Did you mean"));
        assert!(suggestion.contains("pdf-tools"));
    }

    #[test]
    fn test_suggest_skill_not_found_lists_available() {
        let context = json!({ "name": "zzz", "available": ["alpha", "beta"] });
        let suggestion = suggest_for_error(ErrorCode::SkillNotFound, Some(&context));
        assert!(suggestion.contains("alpha, beta"));
    }

    #[test]
    fn test_suggest_without_context_falls_back() {
        let suggestion = suggest_for_error(ErrorCode::SkillNotFound, None);
        assert_eq!(suggestion, ErrorCode::SkillNotFound.suggestion());
    }

    #[test]
    fn test_suggest_filter_pattern_names_pattern() {
        let context = json!({ "pattern": "[abc" });
        let suggestion = suggest_for_error(ErrorCode::FilterPatternInvalid, Some(&context));
        assert!(suggestion.contains("[abc"));
        assert!(suggestion.contains("No target was modified"));
    }

    #[test]
    fn test_suggest_flat_name_collision() {
        let context = json!({ "flat_name": "a__b", "paths": ["a/b", "a__b"] });
        let suggestion = suggest_for_error(ErrorCode::FlatNameCollision, Some(&context));
        assert!(suggestion.contains("a/b and a__b"));
    }

    #[test]
    fn test_similarity_score() {
        assert!(similarity_score("pdf-tool", "pdf-tools") > 0.3);
        assert!(similarity_score("abc", "xyz") < 0.1);
        assert!(similarity_score("test", "test") > 0.9);
    }

    #[test]
    fn test_trigrams() {
        let tris: Vec<_> = trigrams("hello").collect();
        assert_eq!(tris, vec!["hel", "ell", "llo"]);
    }
}
