//! Pipeline DSL parser and parameter validation
//!
//! The tail of the request path encodes the pipeline:
//!
//! ```text
//! pipeline := action ( "/" action )*
//! action   := name [ ":" key "=" value ( "," key "=" value )* ]
//! ```
//!
//! Example: `rotate:a=45/resize:w=405,h=32/output:f=jpg,q=45`
//!
//! Values are percent-decoded. Every parameter passes through a uniform
//! validator; any violation rejects the whole request before the first
//! operator runs.

use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// Operator parameters, keyed by short names
pub type Params = HashMap<String, String>;

/// One operator invocation within the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub params: Params,
}

const MAX_KEY_LEN: usize = 50;
const MAX_VALUE_LEN: usize = 100;

/// Parses the pipeline tail into an ordered action list.
pub fn parse_pipeline(tail: &str) -> Result<Vec<Action>> {
    let mut actions = Vec::new();

    for segment in tail.split('/') {
        if segment.is_empty() {
            continue;
        }

        let (name, params_str) = match segment.split_once(':') {
            Some((name, rest)) => (name, rest),
            None => (segment, ""),
        };

        let mut params = Params::new();
        if !params_str.is_empty() {
            for pair in params_str.split(',') {
                let (key, raw_value) = match pair.split_once('=') {
                    Some((key, value)) => (key, value),
                    None => (pair, ""),
                };

                if key.is_empty() {
                    continue;
                }

                let value = percent_decode_str(raw_value)
                    .decode_utf8()
                    .map_err(|_| {
                        Error::BadRequest(format!("invalid URL encoding in value for '{}'", key))
                    })?
                    .into_owned();

                validate_param(key, &value)?;
                params.insert(key.to_string(), value);
            }
        }

        if !name.is_empty() {
            actions.push(Action {
                name: name.to_string(),
                params,
            });
        }
    }

    Ok(actions)
}

/// Uniform parameter validator. The bounds are normative; failing any of
/// them rejects the request.
fn validate_param(key: &str, value: &str) -> Result<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(Error::BadRequest(format!(
            "parameter name exceeds {} characters",
            MAX_KEY_LEN
        )));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(Error::BadRequest(format!(
            "value of parameter '{}' exceeds {} characters",
            key, MAX_VALUE_LEN
        )));
    }

    match key {
        "w" | "h" => validate_int_range(key, value, 1, 20_000),
        "x" | "y" => validate_int_range(key, value, 0, 20_000),
        "q" => validate_int_range(key, value, 1, 100),
        "a" => {
            let angle: f64 = value.parse().map_err(|_| {
                Error::BadRequest(format!("parameter 'a' must be a number, got '{}'", value))
            })?;
            if !(-360.0..=360.0).contains(&angle) {
                return Err(Error::BadRequest(format!(
                    "parameter 'a' must be between -360 and 360, got '{}'",
                    value
                )));
            }
            Ok(())
        }
        "f" => match value {
            "jpg" | "jpeg" | "png" | "webp" | "gif" => Ok(()),
            other => Err(Error::BadRequest(format!(
                "invalid or unsupported format '{}'",
                other
            ))),
        },
        "lossless" | "progressive" | "exact" => match value {
            "true" | "false" | "1" | "0" => Ok(()),
            other => Err(Error::BadRequest(format!(
                "parameter '{}' must be a boolean, got '{}'",
                key, other
            ))),
        },
        // r/g/b/a_color double as color components when numeric (r also
        // names crop rectangles and resampling filters)
        "r" | "g" | "b" | "a_color"
            if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) =>
        {
            validate_int_range(key, value, 0, 255)
        }
        "a_color" => Err(Error::BadRequest(format!(
            "parameter 'a_color' must be an integer between 0 and 255, got '{}'",
            value
        ))),
        _ => Ok(()),
    }
}

fn validate_int_range(key: &str, value: &str, min: i64, max: i64) -> Result<()> {
    let parsed: i64 = value.parse().map_err(|_| {
        Error::BadRequest(format!("parameter '{}' must be an integer, got '{}'", key, value))
    })?;
    if parsed < min || parsed > max {
        return Err(Error::BadRequest(format!(
            "parameter '{}' must be between {} and {}, got '{}'",
            key, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_actions_in_order() {
        let actions = parse_pipeline("rotate:a=45/resize:w=405,h=32/output:f=jpg,q=45").unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].name, "rotate");
        assert_eq!(actions[0].params["a"], "45");
        assert_eq!(actions[1].name, "resize");
        assert_eq!(actions[1].params["w"], "405");
        assert_eq!(actions[1].params["h"], "32");
        assert_eq!(actions[2].name, "output");
        assert_eq!(actions[2].params["f"], "jpg");
        assert_eq!(actions[2].params["q"], "45");
    }

    #[test]
    fn test_parse_action_without_params() {
        let actions = parse_pipeline("fliph").unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "fliph");
        assert!(actions[0].params.is_empty());
    }

    #[test]
    fn test_empty_tail_is_empty_pipeline() {
        assert!(parse_pipeline("").unwrap().is_empty());
        assert!(parse_pipeline("/").unwrap().is_empty());
    }

    #[test]
    fn test_values_are_url_decoded() {
        let actions = parse_pipeline("rotate:a=45,p=5%7C35").unwrap();
        assert_eq!(actions[0].params["p"], "5|35");
    }

    #[test]
    fn test_quality_bounds() {
        assert!(parse_pipeline("output:f=jpg,q=1").is_ok());
        assert!(parse_pipeline("output:f=jpg,q=100").is_ok());
        assert!(parse_pipeline("output:f=jpg,q=0").is_err());
        assert!(parse_pipeline("output:f=jpg,q=101").is_err());
    }

    #[test]
    fn test_dimension_bounds() {
        assert!(parse_pipeline("resize:w=1").is_ok());
        assert!(parse_pipeline("resize:w=20000").is_ok());
        assert!(parse_pipeline("resize:w=0").is_err());
        assert!(parse_pipeline("resize:w=20001").is_err());
        assert!(parse_pipeline("crop:x=0,y=0,w=5,h=5").is_ok());
        assert!(parse_pipeline("crop:x=-1,y=0,w=5,h=5").is_err());
    }

    #[test]
    fn test_angle_bounds() {
        assert!(parse_pipeline("rotate:a=-360").is_ok());
        assert!(parse_pipeline("rotate:a=360").is_ok());
        assert!(parse_pipeline("rotate:a=12.5").is_ok());
        assert!(parse_pipeline("rotate:a=361").is_err());
        assert!(parse_pipeline("rotate:a=forty").is_err());
    }

    #[test]
    fn test_format_enum() {
        for f in ["jpg", "jpeg", "png", "webp", "gif"] {
            assert!(parse_pipeline(&format!("output:f={}", f)).is_ok());
        }
        assert!(parse_pipeline("output:f=xyz").is_err());
    }

    #[test]
    fn test_bool_params() {
        assert!(parse_pipeline("output:f=webp,lossless=true").is_ok());
        assert!(parse_pipeline("output:f=webp,lossless=0").is_ok());
        assert!(parse_pipeline("output:f=webp,lossless=maybe").is_err());
    }

    #[test]
    fn test_key_length_limit() {
        let long_key = "k".repeat(51);
        assert!(parse_pipeline(&format!("op:{}=1", long_key)).is_err());
        let ok_key = "k".repeat(50);
        assert!(parse_pipeline(&format!("op:{}=1", ok_key)).is_ok());
    }

    #[test]
    fn test_value_length_limit() {
        let long_value = "v".repeat(101);
        assert!(parse_pipeline(&format!("op:data={}", long_value)).is_err());
        let ok_value = "v".repeat(100);
        assert!(parse_pipeline(&format!("op:data={}", ok_value)).is_ok());
    }

    #[test]
    fn test_numeric_color_component_range() {
        assert!(parse_pipeline("op:r=255").is_ok());
        assert!(parse_pipeline("op:r=256").is_err());
        // Non-numeric r values name resampling filters or crop rectangles
        assert!(parse_pipeline("resize:w=10,r=lanczos").is_ok());
        assert!(parse_pipeline("crop:r=0%7C0%7C50%7C50").is_ok());
    }

    #[test]
    fn test_alpha_color_component_range() {
        assert!(parse_pipeline("op:a_color=0").is_ok());
        assert!(parse_pipeline("op:a_color=255").is_ok());
        assert!(parse_pipeline("op:a_color=256").is_err());
        // Unlike r, a_color has no non-numeric uses
        assert!(parse_pipeline("op:a_color=-1").is_err());
        assert!(parse_pipeline("op:a_color=opaque").is_err());
    }

    #[test]
    fn test_malformed_percent_encoding_rejected() {
        assert!(parse_pipeline("op:k=%ff%fe").is_err());
    }
}
