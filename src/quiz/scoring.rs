use thiserror::Error;

use crate::quiz::{Answer, Question, QuestionKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("option {option} does not exist (question has {options} options)")]
    InvalidSelection { option: usize, options: usize },

    #[error("answer kind does not match a {0:?} question")]
    WrongQuestionType(QuestionKind),
}

/// Points earned by `answer` on `question`.
///
/// Single choice earns 1 for the correct option. Multi choice earns one point
/// per selected option that is also correct; incorrect extra selections are
/// neither rewarded nor penalised, so the result never exceeds the size of
/// the correct set.
pub fn score(question: &Question, answer: &Answer) -> Result<u32, ScoreError> {
    let check = |option: usize| {
        if option < question.options.len() {
            Ok(())
        } else {
            Err(ScoreError::InvalidSelection {
                option,
                options: question.options.len(),
            })
        }
    };

    match (question.kind, answer) {
        (QuestionKind::Single, Answer::Single(option)) => {
            check(*option)?;
            Ok(u32::from(question.correct.contains(option)))
        }
        (QuestionKind::Multi, Answer::Multi(selected)) => {
            selected.iter().try_for_each(|option| check(*option))?;
            Ok(selected.intersection(&question.correct).count() as u32)
        }
        (kind, _) => Err(ScoreError::WrongQuestionType(kind)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn question(kind: QuestionKind, options: usize, correct: &[usize]) -> Question {
        Question {
            position: 0,
            kind,
            text: "Q".to_string(),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            correct: correct.iter().copied().collect(),
        }
    }

    fn multi(selected: &[usize]) -> Answer {
        Answer::Multi(selected.iter().copied().collect::<BTreeSet<_>>())
    }

    #[test]
    fn single_scores_one_only_for_the_correct_option() {
        let q = question(QuestionKind::Single, 3, &[1]);
        assert_eq!(score(&q, &Answer::Single(1)), Ok(1));
        assert_eq!(score(&q, &Answer::Single(0)), Ok(0));
        assert_eq!(score(&q, &Answer::Single(2)), Ok(0));
    }

    #[test]
    fn multi_counts_correct_selections() {
        let q = question(QuestionKind::Multi, 4, &[0, 2]);
        assert_eq!(score(&q, &multi(&[0])), Ok(1));
        assert_eq!(score(&q, &multi(&[0, 2])), Ok(2));
        assert_eq!(score(&q, &multi(&[1, 3])), Ok(0));
    }

    #[test]
    fn extra_incorrect_selections_neither_add_nor_subtract() {
        let q = question(QuestionKind::Multi, 4, &[0, 2]);
        assert_eq!(score(&q, &multi(&[0, 1, 2, 3])), Ok(2));
        assert_eq!(score(&q, &multi(&[0, 1])), Ok(1));
    }

    #[test]
    fn empty_multi_selection_scores_zero() {
        let q = question(QuestionKind::Multi, 3, &[1]);
        assert_eq!(score(&q, &multi(&[])), Ok(0));
    }

    #[test]
    fn out_of_range_option_is_invalid() {
        let single = question(QuestionKind::Single, 2, &[0]);
        assert_eq!(
            score(&single, &Answer::Single(2)),
            Err(ScoreError::InvalidSelection {
                option: 2,
                options: 2
            })
        );

        let multi_q = question(QuestionKind::Multi, 2, &[0]);
        assert!(matches!(
            score(&multi_q, &multi(&[0, 5])),
            Err(ScoreError::InvalidSelection { option: 5, .. })
        ));
    }

    #[test]
    fn answer_kind_must_match_question_kind() {
        let single = question(QuestionKind::Single, 2, &[0]);
        assert_eq!(
            score(&single, &multi(&[0])),
            Err(ScoreError::WrongQuestionType(QuestionKind::Single))
        );
        let multi_q = question(QuestionKind::Multi, 2, &[0]);
        assert_eq!(
            score(&multi_q, &Answer::Single(0)),
            Err(ScoreError::WrongQuestionType(QuestionKind::Multi))
        );
    }
}
