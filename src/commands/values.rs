//! Lenient parsing of values typed on the command line.

use confkv::store::ConfigValue;

/// Longest input still considered for numeric parsing.
const MAX_NUMBER_LEN: usize = 32;

/// 2^53; every integer up to this magnitude is exact in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parses a command-line value.
///
/// In order: empty input is `""`; `null`/`true`/`false` (any case); a
/// number; JSON objects, arrays, and quoted strings (single quotes are
/// accepted too); otherwise the trimmed text as a string.
pub fn parse_value_input(raw: &str) -> ConfigValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ConfigValue::String(String::new());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "null" => return ConfigValue::Null,
        "true" => return ConfigValue::Bool(true),
        "false" => return ConfigValue::Bool(false),
        _ => {},
    }

    if trimmed.len() <= MAX_NUMBER_LEN
        && let Some(number) = parse_number(trimmed)
    {
        return number;
    }

    if let Some(value) = parse_json_like(trimmed) {
        return value;
    }

    ConfigValue::String(trimmed.to_string())
}

fn parse_number(text: &str) -> Option<ConfigValue> {
    if let Ok(number) = serde_json::from_str::<serde_json::Number>(text) {
        // "1e3" and "2.0" parse as floats but name whole numbers.
        if number.is_f64()
            && let Some(value) = number.as_f64()
        {
            return whole_or_float(value);
        }
        return Some(ConfigValue::Number(number));
    }
    // Forms JSON rejects but a shell user would expect: "+1", ".5", "5.", "007".
    let numeric = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-' | b'e' | b'E'));
    if !numeric || !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: f64 = text.parse().ok()?;
    whole_or_float(value)
}

/// Integral values within the exactly representable range become integers.
fn whole_or_float(value: f64) -> Option<ConfigValue> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        return Some(ConfigValue::from(value as i64));
    }
    ConfigValue::from_f64(value)
}

fn parse_json_like(text: &str) -> Option<ConfigValue> {
    let first = text.chars().next()?;
    let last = text.chars().next_back()?;
    let single_quoted = text.len() >= 2 && first == '\'' && last == '\'';
    let likely_json = matches!(first, '{' | '[')
        || (text.len() >= 2 && first == '"' && last == '"')
        || single_quoted;
    if !likely_json {
        return None;
    }

    let normalized = if single_quoted {
        format!("\"{}\"", text[1..text.len() - 1].replace('"', "\\\""))
    } else {
        text.to_string()
    };
    serde_json::from_str::<serde_json::Value>(&normalized)
        .ok()
        .map(ConfigValue::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(raw: &str) -> serde_json::Value {
        serde_json::Value::from(parse_value_input(raw))
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(parsed("NULL"), json!(null));
        assert_eq!(parsed(" True "), json!(true));
        assert_eq!(parsed("false"), json!(false));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parsed("42"), json!(42));
        assert_eq!(parsed("-1.5"), json!(-1.5));
        assert_eq!(parsed("1e3"), json!(1000));
        assert_eq!(parsed("+7"), json!(7));
        assert_eq!(parsed(".5"), json!(0.5));
        assert_eq!(parsed("007"), json!(7));
    }

    #[test]
    fn test_whole_floats_are_stored_as_integers() {
        assert_eq!(parsed("1e3"), json!(1000));
        assert_eq!(parsed("2.0"), json!(2));
        assert_eq!(parsed("-4E2"), json!(-400));
        assert_eq!(parsed("1.5e1"), json!(15));
        assert_eq!(parsed("2.5e-1"), json!(0.25));
        assert_eq!(parsed("1e20"), json!(1e20));
    }

    #[test]
    fn test_long_digit_strings_stay_strings() {
        let digits = "1".repeat(MAX_NUMBER_LEN + 1);
        assert_eq!(parsed(&digits), json!(digits));
    }

    #[test]
    fn test_non_numbers_stay_strings() {
        assert_eq!(parsed("inf"), json!("inf"));
        assert_eq!(parsed("NaN"), json!("NaN"));
        assert_eq!(parsed("1.2.3"), json!("1.2.3"));
        assert_eq!(parsed("e"), json!("e"));
    }

    #[test]
    fn test_json_documents() {
        assert_eq!(parsed(r#"{"beta": true}"#), json!({"beta": true}));
        assert_eq!(parsed("[1, \"a\"]"), json!([1, "a"]));
        assert_eq!(parsed(r#""quoted""#), json!("quoted"));
    }

    #[test]
    fn test_single_quoted_strings() {
        assert_eq!(parsed("'hello world'"), json!("hello world"));
        assert_eq!(parsed(r#"'say "hi"'"#), json!("say \"hi\""));
    }

    #[test]
    fn test_broken_json_falls_back_to_text() {
        assert_eq!(parsed("{not json"), json!("{not json"));
        assert_eq!(parsed("plain text"), json!("plain text"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parsed(""), json!(""));
        assert_eq!(parsed("   \n"), json!(""));
    }
}
