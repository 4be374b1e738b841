use fajobs::core::command::OptionValue;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid format: '{0}'. Expected KEY=VALUE.")]
    MissingSeparator(String),

    #[error("Key cannot be empty in '{0}'.")]
    EmptyKey(String),
}

/// Splits `KEY=VALUE` at the first `=`; the value may be empty.
pub fn parse_key_value(input: &str) -> Result<(String, String), ParseError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::MissingSeparator(input.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(input.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Interprets a textual option value: booleans, then integers, then floats, then text.
pub fn parse_option_value(raw: &str) -> OptionValue {
    match raw {
        "true" => OptionValue::Flag(true),
        "false" => OptionValue::Flag(false),
        _ => raw
            .parse::<i64>()
            .map(OptionValue::Int)
            .or_else(|_| raw.parse::<f64>().map(OptionValue::Float))
            .unwrap_or_else(|_| OptionValue::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_split_at_the_first_equals_sign() {
        assert_eq!(
            parse_key_value("host=node1:4").unwrap(),
            ("host".to_string(), "node1:4".to_string())
        );
        assert_eq!(
            parse_key_value(" expr = a=b ").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("jobname=").unwrap(),
            ("jobname".to_string(), String::new())
        );
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert_eq!(
            parse_key_value("novalue"),
            Err(ParseError::MissingSeparator("novalue".into()))
        );
        assert_eq!(
            parse_key_value("=4"),
            Err(ParseError::EmptyKey("=4".into()))
        );
    }

    #[test]
    fn option_values_get_the_narrowest_type() {
        assert_eq!(parse_option_value("true"), OptionValue::Flag(true));
        assert_eq!(parse_option_value("false"), OptionValue::Flag(false));
        assert_eq!(parse_option_value("12"), OptionValue::Int(12));
        assert_eq!(parse_option_value("-3"), OptionValue::Int(-3));
        assert_eq!(parse_option_value("0.5"), OptionValue::Float(0.5));
        assert_eq!(
            parse_option_value("localhost:4"),
            OptionValue::Text("localhost:4".into())
        );
    }
}
