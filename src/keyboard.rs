use std::collections::BTreeSet;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::quiz::Question;

pub const START_QUIZ: &str = "start_quiz";
const SELECTED_MARK: &str = "✅ ";
const DONE_TEXT: &str = "➡️ Done";

/// Payload of an inline button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    StartQuiz,
    Single { question: usize, option: usize },
    Toggle { question: usize, option: usize },
    Done { question: usize },
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if data == START_QUIZ {
            return Some(CallbackAction::StartQuiz);
        }

        let mut parts = data.split(':');
        let action = match (parts.next()?, parts.next(), parts.next()) {
            ("s", Some(question), Some(option)) => CallbackAction::Single {
                question: question.parse().ok()?,
                option: option.parse().ok()?,
            },
            ("m", Some(question), Some(option)) => CallbackAction::Toggle {
                question: question.parse().ok()?,
                option: option.parse().ok()?,
            },
            ("m_done", Some(question), None) => CallbackAction::Done {
                question: question.parse().ok()?,
            },
            _ => return None,
        };

        if parts.next().is_some() {
            return None;
        }
        Some(action)
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::StartQuiz => START_QUIZ.to_string(),
            CallbackAction::Single { question, option } => format!("s:{question}:{option}"),
            CallbackAction::Toggle { question, option } => format!("m:{question}:{option}"),
            CallbackAction::Done { question } => format!("m_done:{question}"),
        }
    }
}

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "▶️ Start quiz",
        START_QUIZ,
    )]])
}

/// One button per option; multi questions get check marks and a Done row.
pub fn question_keyboard(question: &Question, selected: &BTreeSet<usize>) -> InlineKeyboardMarkup {
    let index = question.position;
    let mut rows: Vec<Vec<InlineKeyboardButton>> = question
        .options
        .iter()
        .enumerate()
        .map(|(option, text)| {
            let button = if question.is_multi() {
                let mark = if selected.contains(&option) {
                    SELECTED_MARK
                } else {
                    ""
                };
                InlineKeyboardButton::callback(
                    format!("{mark}{text}"),
                    CallbackAction::Toggle {
                        question: index,
                        option,
                    }
                    .encode(),
                )
            } else {
                InlineKeyboardButton::callback(
                    text.clone(),
                    CallbackAction::Single {
                        question: index,
                        option,
                    }
                    .encode(),
                )
            };
            vec![button]
        })
        .collect();

    if question.is_multi() {
        rows.push(vec![InlineKeyboardButton::callback(
            DONE_TEXT,
            CallbackAction::Done { question: index }.encode(),
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn question_text(question: &Question, total: usize) -> String {
    let hint = if question.is_multi() {
        "\n\n(several answers may be correct)"
    } else {
        ""
    };
    format!(
        "Question {}/{}:\n{}{}",
        question.position + 1,
        total,
        question.text,
        hint
    )
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::quiz::QuestionKind;

    fn question(kind: QuestionKind) -> Question {
        Question {
            position: 4,
            kind,
            text: "Pick".to_string(),
            options: vec!["red".to_string(), "green".to_string()],
            correct: BTreeSet::from([0]),
        }
    }

    fn buttons(markup: &InlineKeyboardMarkup) -> Vec<(String, String)> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => {
                    (button.text.clone(), data.clone())
                }
                other => panic!("unexpected button kind {other:?}"),
            })
            .collect()
    }

    #[test]
    fn parses_original_callback_format() {
        assert_eq!(
            CallbackAction::parse("start_quiz"),
            Some(CallbackAction::StartQuiz)
        );
        assert_eq!(
            CallbackAction::parse("s:2:1"),
            Some(CallbackAction::Single {
                question: 2,
                option: 1
            })
        );
        assert_eq!(
            CallbackAction::parse("m:0:3"),
            Some(CallbackAction::Toggle {
                question: 0,
                option: 3
            })
        );
        assert_eq!(
            CallbackAction::parse("m_done:5"),
            Some(CallbackAction::Done { question: 5 })
        );
    }

    #[test]
    fn rejects_garbage() {
        for data in ["", "s", "s:1", "s:x:1", "m:1:-1", "m_done", "m_done:1:2", "s:1:2:3", "x:1:2"] {
            assert_eq!(CallbackAction::parse(data), None, "{data}");
        }
    }

    #[test]
    fn encode_matches_parse() {
        let action = CallbackAction::Toggle {
            question: 3,
            option: 1,
        };
        assert_eq!(action.encode(), "m:3:1");
        assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
    }

    #[test]
    fn single_keyboard_has_one_button_per_option() {
        let markup = question_keyboard(&question(QuestionKind::Single), &BTreeSet::new());
        assert_eq!(
            buttons(&markup),
            [
                ("red".to_string(), "s:4:0".to_string()),
                ("green".to_string(), "s:4:1".to_string()),
            ]
        );
    }

    #[test]
    fn multi_keyboard_marks_selection_and_adds_done() {
        let markup = question_keyboard(&question(QuestionKind::Multi), &BTreeSet::from([1]));
        assert_eq!(
            buttons(&markup),
            [
                ("red".to_string(), "m:4:0".to_string()),
                ("✅ green".to_string(), "m:4:1".to_string()),
                ("➡️ Done".to_string(), "m_done:4".to_string()),
            ]
        );
    }

    #[test]
    fn question_text_numbers_from_one() {
        assert_eq!(
            question_text(&question(QuestionKind::Single), 5),
            "Question 5/5:\nPick"
        );
    }
}
