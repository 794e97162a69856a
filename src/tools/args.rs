//! Argument validation for tool calls.
//!
//! Every accessor fails with `InvalidInput` before any network call is made.

use crate::error::{LecternError, Result};
use serde_json::{Map, Value};

/// Validated view over a tool's JSON arguments.
#[derive(Debug)]
pub struct Args<'a> {
    tool: &'a str,
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    /// Accepts an object or `null` (no arguments).
    pub fn new(tool: &'a str, value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                tool,
                fields: Some(map),
            }),
            Value::Null => Ok(Self { tool, fields: None }),
            other => Err(LecternError::InvalidInput(format!(
                "{}: arguments must be an object, got {}",
                tool, other
            ))),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields
            .and_then(|map| map.get(key))
            .filter(|v| !v.is_null())
    }

    fn invalid(&self, message: String) -> LecternError {
        LecternError::InvalidInput(format!("{}: {}", self.tool, message))
    }

    fn missing(&self, key: &str) -> LecternError {
        self.invalid(format!("missing required argument '{}'", key))
    }

    /// `course_identifier`: a course code or numeric ID, as string or integer.
    pub fn course(&self) -> Result<String> {
        const KEY: &str = "course_identifier";
        match self.get(KEY) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::Number(n)) if n.is_u64() => Ok(n.to_string()),
            Some(other) => Err(self.invalid(format!(
                "'{}' must be a course code or numeric ID, got {}",
                KEY, other
            ))),
            None => Err(self.missing(KEY)),
        }
    }

    /// A Canvas ID given as a non-negative integer or a numeric string.
    pub fn id(&self, key: &str) -> Result<u64> {
        let value = self.get(key).ok_or_else(|| self.missing(key))?;
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(format!("'{}' must be a numeric ID, got {}", key, value)))
    }

    /// Small positive integer such as an attempt number.
    pub fn count(&self, key: &str) -> Result<u32> {
        let id = self.id(key)?;
        u32::try_from(id)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid(format!("'{}' must be a positive integer", key)))
    }

    /// Required non-empty string.
    pub fn string(&self, key: &str) -> Result<&'a str> {
        match self.opt_string(key)? {
            Some(s) => Ok(s),
            None => Err(self.missing(key)),
        }
    }

    /// Optional string; empty strings count as absent.
    pub fn opt_string(&self, key: &str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(format!("'{}' must be a string, got {}", key, other))),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            Some(other) => Err(self.invalid(format!("'{}' must be a boolean, got {}", key, other))),
        }
    }

    /// Optional string restricted to `allowed`, defaulting to the first entry.
    pub fn choice(&self, key: &str, allowed: &[&'a str]) -> Result<&'a str> {
        match self.opt_string(key)? {
            None => Ok(allowed[0]),
            Some(value) => allowed
                .iter()
                .find(|a| **a == value)
                .copied()
                .ok_or_else(|| {
                    self.invalid(format!(
                        "'{}' must be one of {}, got '{}'",
                        key,
                        allowed.join(", "),
                        value
                    ))
                }),
        }
    }

    /// Raw JSON value of a required argument.
    pub fn raw(&self, key: &str) -> Result<&'a Value> {
        self.get(key).ok_or_else(|| self.missing(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invalid<T: std::fmt::Debug>(result: Result<T>) -> String {
        match result {
            Err(LecternError::InvalidInput(message)) => message,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_course_identifier_forms() {
        let value = json!({"course_identifier": "CS_101"});
        assert_eq!(Args::new("t", &value).unwrap().course().unwrap(), "CS_101");

        let value = json!({"course_identifier": 101});
        assert_eq!(Args::new("t", &value).unwrap().course().unwrap(), "101");

        let value = json!({"course_identifier": -1});
        invalid(Args::new("t", &value).unwrap().course());

        let value = json!({});
        let message = invalid(Args::new("list_pages", &value).unwrap().course());
        assert!(message.contains("list_pages"));
        assert!(message.contains("course_identifier"));
    }

    #[test]
    fn test_ids_accept_numeric_strings() {
        let value = json!({"quiz_id": "55", "topic_id": 7, "bad": "x7"});
        let args = Args::new("t", &value).unwrap();
        assert_eq!(args.id("quiz_id").unwrap(), 55);
        assert_eq!(args.id("topic_id").unwrap(), 7);
        invalid(args.id("bad"));
        invalid(args.id("absent"));
    }

    #[test]
    fn test_count_rejects_zero() {
        let value = json!({"attempt": 0, "ok": 2});
        let args = Args::new("t", &value).unwrap();
        invalid(args.count("attempt"));
        assert_eq!(args.count("ok").unwrap(), 2);
    }

    #[test]
    fn test_strings_and_flags() {
        let value = json!({"message": "hi", "blank": " ", "n": 3, "full": "true", "order": "desc"});
        let args = Args::new("t", &value).unwrap();
        assert_eq!(args.string("message").unwrap(), "hi");
        invalid(args.string("blank"));
        invalid(args.opt_string("n"));
        assert!(args.flag("full", false).unwrap());
        assert!(args.flag("absent", true).unwrap());
        invalid(args.flag("n", false));
        assert_eq!(args.choice("order", &["asc", "desc"]).unwrap(), "desc");
        assert_eq!(args.choice("sort", &["name", "size"]).unwrap(), "name");
        invalid(args.choice("message", &["asc", "desc"]));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let message = invalid(Args::new("list_pages", &json!([1, 2])));
        assert!(message.starts_with("list_pages:"));

        let args = Args::new("list_pages", &Value::Null).unwrap();
        assert!(format!("{:?}", args).contains("list_pages"));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let value = json!({"search_term": null});
        let args = Args::new("t", &value).unwrap();
        assert_eq!(args.opt_string("search_term").unwrap(), None);
        invalid(args.raw("search_term"));
    }
}
