pub mod bank;
pub mod leaderboard;
pub mod results;
pub mod scoring;
pub mod session;

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Single,
    Multi,
}

/// A validated quiz question. Only [`bank::QuestionBank`] builds these, so the
/// correct set is always non-empty, in bounds, and has exactly one element
/// for [`QuestionKind::Single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub position: usize,
    pub kind: QuestionKind,
    pub text: String,
    pub options: Vec<String>,
    pub correct: BTreeSet<usize>,
}

impl Question {
    pub fn is_multi(&self) -> bool {
        self.kind == QuestionKind::Multi
    }

    /// Highest number of points this question can award.
    pub fn max_points(&self) -> u32 {
        self.correct.len() as u32
    }
}

/// What a participant submitted for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Single(usize),
    Multi(BTreeSet<usize>),
}
