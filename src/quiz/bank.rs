use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;

use crate::quiz::{Question, QuestionKind};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("question #{position} is invalid: {reason}")]
    Validation { position: usize, reason: String },

    #[error("question index {index} is out of range (bank has {len} questions)")]
    OutOfRange { index: usize, len: usize },

    #[error("failed to read question definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One entry of the definition file, before validation.
#[derive(Debug, serde::Deserialize)]
struct RawQuestion {
    #[serde(rename = "type")]
    kind: String,
    question: String,
    options: Vec<String>,
    answer_index: RawAnswerIndex,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawAnswerIndex {
    One(i64),
    Many(Vec<i64>),
}

impl RawAnswerIndex {
    fn into_vec(self) -> Vec<i64> {
        match self {
            RawAnswerIndex::One(index) => vec![index],
            RawAnswerIndex::Many(indices) => indices,
        }
    }
}

/// The ordered, immutable list of quiz questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file))
    }

    pub fn load(reader: impl Read) -> Result<Self, BankError> {
        let raw: Vec<RawQuestion> = serde_json::from_reader(reader)?;
        if raw.is_empty() {
            return Err(BankError::Validation {
                position: 0,
                reason: "the question list is empty".to_string(),
            });
        }

        let questions = raw
            .into_iter()
            .enumerate()
            .map(|(position, raw)| validate(position, raw))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Loaded {} questions", questions.len());
        Ok(Self { questions })
    }

    pub fn get(&self, index: usize) -> Result<&Question, BankError> {
        self.questions.get(index).ok_or(BankError::OutOfRange {
            index,
            len: self.questions.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Score of a participant who answered everything correctly.
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(Question::max_points).sum()
    }
}

fn validate(position: usize, raw: RawQuestion) -> Result<Question, BankError> {
    let invalid = |reason: String| BankError::Validation { position, reason };

    let kind = match raw.kind.as_str() {
        "single" => QuestionKind::Single,
        "multi" => QuestionKind::Multi,
        other => return Err(invalid(format!("unknown question type {other:?}"))),
    };

    if raw.options.is_empty() {
        return Err(invalid("option list is empty".to_string()));
    }

    let indices = raw.answer_index.into_vec();
    if kind == QuestionKind::Single && indices.len() != 1 {
        return Err(invalid(format!(
            "single choice question needs exactly one answer index, got {}",
            indices.len()
        )));
    }

    let mut correct = BTreeSet::new();
    for index in indices {
        match usize::try_from(index) {
            Ok(index) if index < raw.options.len() => {
                correct.insert(index);
            }
            _ => {
                return Err(invalid(format!(
                    "answer index {index} is out of range for {} options",
                    raw.options.len()
                )))
            }
        }
    }

    if correct.is_empty() {
        return Err(invalid("no correct answer given".to_string()));
    }

    Ok(Question {
        position,
        kind,
        text: raw.question,
        options: raw.options,
        correct,
    })
}
