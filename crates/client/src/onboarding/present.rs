//! How server interpretations and profiles are shown in the transcript.

use jobtrack_protocol::CreatedProfile;
use serde_json::Value;

/// Interpretations under this confidence are flagged and usually followed
/// by a followup question.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Values whose display is longer than this are echoed back in full.
pub const COMPLEX_VALUE_LEN: usize = 30;

const SUMMARY_HIDDEN_KEYS: [&str; 3] = ["user_id", "field", "_id"];

/// Transcript text for an `interpretation_result`, or `None` when the
/// interpretation is confident and simple enough to stay silent.
pub fn interpretation_message(
    variable: &str,
    value: &Value,
    confidence: Option<f64>,
    reasoning: Option<&str>,
) -> Option<String> {
    let reasoning = reasoning.filter(|r| !r.is_empty());

    if confidence.is_some_and(|c| c < LOW_CONFIDENCE_THRESHOLD) {
        let mut message = format!(
            "I understood that as: \"{}\" (low confidence)",
            display_value(value)
        );
        if let Some(reasoning) = reasoning {
            message.push_str(&format!("\nReasoning: {reasoning}"));
        }
        return Some(message);
    }

    if is_complex(value) {
        return Some(format!("Understood: {value}"));
    }

    reasoning.map(|reasoning| {
        let shown = match (variable, numeric_value(value)) {
            ("min_salary", Some(amount)) => format_currency(amount),
            _ => display_value(value),
        };
        format!("I understood your answer as: {shown}\nReasoning: {reasoning}")
    })
}

/// "Preferences saved:" summary for a created profile, skipping identity keys.
pub fn preferences_summary(profile: &CreatedProfile) -> Option<String> {
    let preferences = profile.preferences.as_ref()?;
    let lines: Vec<String> = preferences
        .iter()
        .filter(|(key, _)| !SUMMARY_HIDDEN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| format!("{key}: {}", display_value(value)))
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!("Preferences saved:\n{}", lines.join("\n")))
}

/// Plain rendering: strings unquoted, whole numbers without a fraction,
/// structured values as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn is_complex(value: &Value) -> bool {
    match value {
        Value::Object(_) | Value::Array(_) | Value::Null => true,
        other => display_value(other).chars().count() > COMPLEX_VALUE_LEN,
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// US-dollar amount rounded to whole dollars, e.g. `$90,000`.
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confident_short_value_without_reasoning_is_silent() {
        assert_eq!(
            interpretation_message("min_salary", &json!(90000), Some(0.9), None),
            None
        );
    }

    #[test]
    fn low_confidence_is_annotated() {
        let message =
            interpretation_message("remote", &json!("maybe"), Some(0.4), None).unwrap();
        assert_eq!(message, "I understood that as: \"maybe\" (low confidence)");
    }

    #[test]
    fn low_confidence_includes_reasoning() {
        let message = interpretation_message(
            "remote",
            &json!("hybrid"),
            Some(0.5),
            Some("mentions office twice a week"),
        )
        .unwrap();
        assert!(message.contains("(low confidence)"));
        assert!(message.ends_with("\nReasoning: mentions office twice a week"));
    }

    #[test]
    fn structured_and_long_values_are_echoed() {
        let object = interpretation_message("locations", &json!({"city": "Berlin"}), None, None);
        assert_eq!(object.as_deref(), Some(r#"Understood: {"city":"Berlin"}"#));

        let long = "remote-first companies in northern europe only";
        let message = interpretation_message("company_type", &json!(long), Some(0.95), None);
        assert_eq!(message, Some(format!("Understood: \"{long}\"")));
    }

    #[test]
    fn confident_reasoning_formats_salary_as_currency() {
        let message = interpretation_message(
            "min_salary",
            &json!(90000),
            Some(0.9),
            Some("stated 90k"),
        )
        .unwrap();
        assert_eq!(
            message,
            "I understood your answer as: $90,000\nReasoning: stated 90k"
        );
    }

    #[test]
    fn currency_grouping() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.4), "$999");
        assert_eq!(format_currency(1234567.0), "$1,234,567");
        assert_eq!(format_currency(-1500.0), "-$1,500");
    }

    #[test]
    fn whole_floats_display_without_fraction() {
        assert_eq!(display_value(&json!(85000.0)), "85000");
        assert_eq!(display_value(&json!(0.75)), "0.75");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn summary_skips_identity_keys() {
        let profile: CreatedProfile = serde_json::from_value(json!({
            "user_id": "u-1",
            "preferences": {
                "user_id": "u-1",
                "field": "Software Engineering",
                "min_salary": 90000,
                "remote": "yes"
            }
        }))
        .unwrap();

        assert_eq!(
            preferences_summary(&profile).unwrap(),
            "Preferences saved:\nmin_salary: 90000\nremote: yes"
        );
    }

    #[test]
    fn summary_absent_without_visible_preferences() {
        let profile: CreatedProfile =
            serde_json::from_value(json!({"preferences": {"_id": "x"}})).unwrap();
        assert_eq!(preferences_summary(&profile), None);
    }
}
