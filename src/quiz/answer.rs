//! Answer payloads for quiz questions.

use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An answer, shaped by question kind.
///
/// Only the structure is checked here; whether the shape fits the question
/// is for Canvas to decide. Serializes to exactly the JSON Canvas expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Multiple choice or true/false: the chosen answer ID.
    Choice(u64),
    /// Numerical questions.
    Numeric(f64),
    /// Essay, short answer, single fill-in-the-blank.
    Text(String),
    /// Multiple answers: every chosen answer ID.
    Choices(Vec<u64>),
    /// Matching: left-side answer paired with a right-side match.
    Matching(Vec<MatchPair>),
    /// Multiple blanks or dropdowns, keyed by blank ID.
    Blanks(BTreeMap<String, BlankValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub answer_id: u64,
    pub match_id: u64,
}

/// A dropdown selection (answer ID) or typed blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlankValue {
    Id(u64),
    Text(String),
}

impl AnswerValue {
    /// Validate the structural shape of a raw JSON answer.
    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|_| {
            LecternError::InvalidInput(format!(
                "unsupported answer shape {}: expected an answer ID, a number, text, a list of answer IDs, a list of {{answer_id, match_id}} pairs, or an object of blank answers",
                value
            ))
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnswerValue::Choice(_) => "choice",
            AnswerValue::Numeric(_) => "numeric",
            AnswerValue::Text(_) => "text",
            AnswerValue::Choices(_) => "choices",
            AnswerValue::Matching(_) => "matching",
            AnswerValue::Blanks(_) => "blanks",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shapes_are_recognised() {
        assert_eq!(AnswerValue::from_json(&json!(1234)).unwrap(), AnswerValue::Choice(1234));
        assert_eq!(AnswerValue::from_json(&json!(3.14)).unwrap(), AnswerValue::Numeric(3.14));
        assert_eq!(AnswerValue::from_json(&json!(-2)).unwrap(), AnswerValue::Numeric(-2.0));
        assert_eq!(
            AnswerValue::from_json(&json!("ownership")).unwrap(),
            AnswerValue::Text("ownership".to_string())
        );
        assert_eq!(
            AnswerValue::from_json(&json!([1234, 5678])).unwrap(),
            AnswerValue::Choices(vec![1234, 5678])
        );
        assert_eq!(
            AnswerValue::from_json(&json!([{"answer_id": 1, "match_id": 2}])).unwrap(),
            AnswerValue::Matching(vec![MatchPair { answer_id: 1, match_id: 2 }])
        );

        let blanks = AnswerValue::from_json(&json!({"blank1": "borrow", "dropdown1": 1234})).unwrap();
        match blanks {
            AnswerValue::Blanks(map) => {
                assert_eq!(map["blank1"], BlankValue::Text("borrow".to_string()));
                assert_eq!(map["dropdown1"], BlankValue::Id(1234));
            }
            other => panic!("expected blanks, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_shapes_are_rejected_locally() {
        for raw in [json!(null), json!(true), json!([[1]]), json!({"blank": [1]})] {
            assert!(
                matches!(AnswerValue::from_json(&raw), Err(LecternError::InvalidInput(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_serializes_to_raw_canvas_shape() {
        let value = AnswerValue::Matching(vec![MatchPair { answer_id: 1, match_id: 2 }]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!([{"answer_id": 1, "match_id": 2}]));
        assert_eq!(serde_json::to_value(AnswerValue::Choice(9)).unwrap(), json!(9));
        assert_eq!(value.kind(), "matching");
    }
}
