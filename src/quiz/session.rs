use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::quiz::bank::QuestionBank;
use crate::quiz::results::{ResultEntry, ResultsStore, StoreError};
use crate::quiz::scoring::{self, ScoreError};
use crate::quiz::{Answer, Question, QuestionKind};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("question {index} does not exist")]
    OutOfRange { index: usize },

    #[error("option {option} does not exist")]
    InvalidSelection { option: usize },

    #[error("participant has no quiz in progress")]
    NoActiveSession,

    #[error("current question is a {0:?} question")]
    WrongQuestionType(QuestionKind),

    #[error("question {requested} is no longer active (current is {current:?})")]
    StaleQuestion {
        current: Option<usize>,
        requested: usize,
    },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl SessionError {
    /// Bad input from the participant, reported as an "invalid choice".
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SessionError::OutOfRange { .. } | SessionError::InvalidSelection { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Persistence(err) if err.is_retryable())
    }
}

impl From<ScoreError> for SessionError {
    fn from(err: ScoreError) -> Self {
        match err {
            ScoreError::InvalidSelection { option, .. } => {
                SessionError::InvalidSelection { option }
            }
            ScoreError::WrongQuestionType(kind) => SessionError::WrongQuestionType(kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    InProgress { index: usize },
    Finished,
}

/// What the chat adapter should show next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ask {
        index: usize,
        selected: BTreeSet<usize>,
    },
    Finished {
        score: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answered {
    pub points: u32,
    pub score: u32,
    pub next: Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Toggled(Step),
    Answered(Answered),
}

type Selections = HashMap<String, BTreeSet<usize>>;

/// Drives every participant through the question bank.
///
/// Every command runs under one lock guarding the in-progress multi
/// selections, which also serialises read-modify-write cycles on the results
/// store.
pub struct SessionManager {
    bank: Arc<QuestionBank>,
    store: Arc<ResultsStore>,
    selections: Mutex<Selections>,
}

impl SessionManager {
    pub fn new(bank: Arc<QuestionBank>, store: Arc<ResultsStore>) -> Self {
        Self {
            bank,
            store,
            selections: Mutex::new(HashMap::new()),
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn store(&self) -> &ResultsStore {
        &self.store
    }

    pub fn status(&self, id: &str) -> Status {
        match self.store.get(id) {
            None => Status::NotStarted,
            Some(entry) => self.status_of(&entry),
        }
    }

    /// Starts the quiz for an unknown participant. Known participants get
    /// their current step back unchanged.
    pub fn begin(&self, id: &str, name: &str) -> Result<Step, SessionError> {
        let selections = self.lock();

        if let Some(entry) = self.store.get(id) {
            log::debug!("Participant {id} resumed");
            return Ok(self.step_of(id, &entry, &selections));
        }

        let entry = ResultEntry::new(name);
        self.store.upsert(id, entry.clone())?;
        log::debug!("Participant {id} ({name}) started the quiz");
        Ok(self.step_of(id, &entry, &selections))
    }

    pub fn toggle_option(&self, id: &str, option: usize) -> Result<Step, SessionError> {
        let mut selections = self.lock();
        self.toggle_locked(&mut selections, id, None, option)
    }

    /// Like [`Self::toggle_option`], but only while `question` is current.
    pub fn toggle_option_at(
        &self,
        id: &str,
        question: usize,
        option: usize,
    ) -> Result<Step, SessionError> {
        let mut selections = self.lock();
        self.toggle_locked(&mut selections, id, Some(question), option)
    }

    /// Scores `answer` against the current question and advances. Score and
    /// pointer are written together; on a failed flush nothing changes.
    pub fn submit(&self, id: &str, answer: Answer) -> Result<Answered, SessionError> {
        let mut selections = self.lock();
        self.submit_locked(&mut selections, id, None, answer)
    }

    /// Like [`Self::submit`], but only while `question` is current.
    pub fn submit_at(
        &self,
        id: &str,
        question: usize,
        answer: Answer,
    ) -> Result<Answered, SessionError> {
        let mut selections = self.lock();
        self.submit_locked(&mut selections, id, Some(question), answer)
    }

    /// Toggles on a multi question, submits straight away on a single one.
    pub fn select(&self, id: &str, option: usize) -> Result<Selected, SessionError> {
        let mut selections = self.lock();
        let index = self.current_index(id, None)?;
        match self.question(index)?.kind {
            QuestionKind::Multi => self
                .toggle_locked(&mut selections, id, None, option)
                .map(Selected::Toggled),
            QuestionKind::Single => self
                .submit_locked(&mut selections, id, None, Answer::Single(option))
                .map(Selected::Answered),
        }
    }

    /// Submits whatever is currently toggled on the active multi question.
    /// An empty selection scores zero.
    pub fn submit_selected(&self, id: &str) -> Result<Answered, SessionError> {
        let mut selections = self.lock();
        self.submit_selected_locked(&mut selections, id, None)
    }

    /// Like [`Self::submit_selected`], but only while `question` is current.
    pub fn submit_selected_at(&self, id: &str, question: usize) -> Result<Answered, SessionError> {
        let mut selections = self.lock();
        self.submit_selected_locked(&mut selections, id, Some(question))
    }

    pub fn reset_self(&self, id: &str, name: &str) -> Result<Step, SessionError> {
        let mut selections = self.lock();
        let entry = match self.store.get(id) {
            Some(entry) => ResultEntry::new(entry.name),
            None => ResultEntry::new(name),
        };
        self.store.upsert(id, entry.clone())?;
        selections.remove(id);

        log::info!("Participant {id} reset their progress");
        Ok(self.step_of(id, &entry, &selections))
    }

    /// Index of the active question. With `expected` set, any other current
    /// question (or none) is [`SessionError::StaleQuestion`].
    fn current_index(&self, id: &str, expected: Option<usize>) -> Result<usize, SessionError> {
        let current = match self.status(id) {
            Status::InProgress { index } => Some(index),
            Status::NotStarted | Status::Finished => None,
        };
        match (current, expected) {
            (Some(index), None) => Ok(index),
            (Some(index), Some(requested)) if index == requested => Ok(index),
            (None, None) => Err(SessionError::NoActiveSession),
            (current, Some(requested)) => Err(SessionError::StaleQuestion { current, requested }),
        }
    }

    fn toggle_locked(
        &self,
        selections: &mut Selections,
        id: &str,
        expected: Option<usize>,
        option: usize,
    ) -> Result<Step, SessionError> {
        let index = self.current_index(id, expected)?;
        let question = self.question(index)?;

        if question.kind != QuestionKind::Multi {
            return Err(SessionError::WrongQuestionType(question.kind));
        }
        if option >= question.options.len() {
            return Err(SessionError::InvalidSelection { option });
        }

        let selected = selections.entry(id.to_string()).or_default();
        if !selected.remove(&option) {
            selected.insert(option);
        }
        Ok(Step::Ask {
            index,
            selected: selected.clone(),
        })
    }

    fn submit_selected_locked(
        &self,
        selections: &mut Selections,
        id: &str,
        expected: Option<usize>,
    ) -> Result<Answered, SessionError> {
        let selected = selections.get(id).cloned().unwrap_or_default();
        self.submit_locked(selections, id, expected, Answer::Multi(selected))
    }

    fn submit_locked(
        &self,
        selections: &mut Selections,
        id: &str,
        expected: Option<usize>,
        answer: Answer,
    ) -> Result<Answered, SessionError> {
        let index = self.current_index(id, expected)?;
        let entry = self.store.get(id).ok_or(SessionError::NoActiveSession)?;

        let question = self.question(index)?;
        let points = scoring::score(question, &answer)?;

        let updated = ResultEntry {
            score: entry.score + points,
            progress: entry.progress + 1,
            ..entry
        };
        self.store.upsert(id, updated.clone())?;
        selections.remove(id);

        log::debug!(
            "Participant {id} answered question {} for {points} points",
            question.position
        );
        if updated.progress >= self.bank.len() {
            log::info!("Participant {id} finished with {} points", updated.score);
        }

        Ok(Answered {
            points,
            score: updated.score,
            next: self.step_of(id, &updated, selections),
        })
    }

    fn question(&self, index: usize) -> Result<&Question, SessionError> {
        self.bank
            .get(index)
            .map_err(|_| SessionError::OutOfRange { index })
    }

    fn status_of(&self, entry: &ResultEntry) -> Status {
        if entry.progress >= self.bank.len() {
            Status::Finished
        } else {
            Status::InProgress {
                index: entry.progress,
            }
        }
    }

    fn step_of(&self, id: &str, entry: &ResultEntry, selections: &Selections) -> Step {
        match self.status_of(entry) {
            Status::InProgress { index } => Step::Ask {
                index,
                selected: selections.get(id).cloned().unwrap_or_default(),
            },
            Status::NotStarted | Status::Finished => Step::Finished { score: entry.score },
        }
    }

    fn lock(&self) -> MutexGuard<'_, Selections> {
        self.selections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
