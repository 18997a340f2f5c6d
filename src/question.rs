//! Question and answer types plus the question source contract
//!
//! Questions come in two kinds, multiple-choice and true/false, modelled
//! as a tagged variant with kind-specific payload: answer options exist
//! only for multiple-choice. The content generator itself is external and
//! opaque; this module defines its contract, the bounded-retry shape
//! checking applied to its output, and the pluggable policy that picks a
//! kind for each round.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Discriminates the two supported question kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionKind {
    /// Four answer options, one correct index
    MultipleChoice,
    /// A claim that is either true or false
    TrueFalse,
}

/// A generated question with its kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Question {
    /// A question with four options of which one is correct
    MultipleChoice {
        /// The question text shown to players
        text: String,
        /// The answer options, in display order
        options: Vec<String>,
        /// Index into `options` of the correct answer
        correct: usize,
    },
    /// A claim to be judged true or false
    TrueFalse {
        /// The claim shown to players
        text: String,
        /// Whether the claim is true
        correct: bool,
    },
}

impl Question {
    /// The question text
    pub fn text(&self) -> &str {
        match self {
            Self::MultipleChoice { text, .. } | Self::TrueFalse { text, .. } => text,
        }
    }

    /// The kind discriminator of this question
    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            Self::TrueFalse { .. } => QuestionKind::TrueFalse,
        }
    }

    /// Answer options, present only for multiple-choice questions
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::MultipleChoice { options, .. } => Some(options),
            Self::TrueFalse { .. } => None,
        }
    }

    /// The stored correct answer in submittable form
    pub fn correct_answer(&self) -> Answer {
        match self {
            Self::MultipleChoice { correct, .. } => Answer::Index(*correct),
            Self::TrueFalse { correct, .. } => Answer::Boolean(*correct),
        }
    }

    /// Checks a submitted answer against the stored one
    ///
    /// Multiple-choice compares option indices; true/false compares
    /// booleans. An answer of the wrong shape is simply incorrect.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (Self::MultipleChoice { correct, .. }, Answer::Index(submitted)) => {
                correct == submitted
            }
            (Self::TrueFalse { correct, .. }, Answer::Boolean(submitted)) => correct == submitted,
            _ => false,
        }
    }
}

/// An answer submitted as a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Answer {
    /// Option index, for multiple-choice rounds
    Index(usize),
    /// Truth judgement, for true/false rounds
    Boolean(bool),
}

/// Errors from question generation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The upstream generator failed to produce a response
    #[error("question generation failed upstream: {0}")]
    Upstream(String),
    /// The upstream response did not have the required shape
    #[error("malformed question from generator: {0}")]
    Malformed(String),
    /// The retry budget ran out without a well-formed question
    ///
    /// This is fatal to the round: the engine never fabricates a
    /// fallback question.
    #[error("question generation exhausted after {attempts} attempts")]
    Exhausted {
        /// How many attempts were made
        attempts: usize,
    },
}

/// Contract for the external question content generator
///
/// `previous_questions` carries the text of questions already asked in
/// the session so the generator can avoid repeats.
pub trait QuestionSource {
    /// Produces one question for the given category and kind
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when no question could be produced.
    fn generate(
        &mut self,
        category: &str,
        kind: QuestionKind,
        previous_questions: &[String],
    ) -> Result<Question, GenerationError>;
}

/// Validates the shape of a generated question
///
/// Multiple-choice questions must carry exactly the expected number of
/// options with the correct index in range, and the generated kind must
/// match the requested one.
fn validate_shape(question: &Question, requested: QuestionKind) -> Result<(), GenerationError> {
    if question.text().is_empty() {
        return Err(GenerationError::Malformed("empty question text".to_owned()));
    }
    if question.kind() != requested {
        return Err(GenerationError::Malformed(format!(
            "requested {requested:?} but generator produced {:?}",
            question.kind()
        )));
    }
    if let Question::MultipleChoice { options, correct, .. } = question {
        if options.len() != constants::question::MULTIPLE_CHOICE_OPTIONS {
            return Err(GenerationError::Malformed(format!(
                "expected {} options, got {}",
                constants::question::MULTIPLE_CHOICE_OPTIONS,
                options.len()
            )));
        }
        if *correct >= options.len() {
            return Err(GenerationError::Malformed(format!(
                "correct index {correct} out of range"
            )));
        }
    }
    Ok(())
}

/// A [`QuestionSource`] that retries a raw generator a bounded number of
/// times against malformed output
///
/// Each attempt is shape-checked before acceptance. When the budget runs
/// out the error is [`GenerationError::Exhausted`]; callers treat that as
/// fatal to the round.
#[derive(Debug)]
pub struct Retrying<S> {
    inner: S,
    retries: usize,
}

impl<S> Retrying<S> {
    /// Wraps a raw source with the default retry budget
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            retries: constants::question::GENERATION_RETRIES,
        }
    }

    /// Wraps a raw source with an explicit retry budget
    pub fn with_retries(inner: S, retries: usize) -> Self {
        Self { inner, retries }
    }
}

impl<S: QuestionSource> QuestionSource for Retrying<S> {
    fn generate(
        &mut self,
        category: &str,
        kind: QuestionKind,
        previous_questions: &[String],
    ) -> Result<Question, GenerationError> {
        for attempt in 1..=self.retries {
            match self
                .inner
                .generate(category, kind, previous_questions)
                .and_then(|question| {
                    validate_shape(&question, kind)?;
                    Ok(question)
                }) {
                Ok(question) => return Ok(question),
                Err(error) => {
                    tracing::warn!(%category, ?kind, attempt, %error, "question generation attempt failed");
                }
            }
        }
        Err(GenerationError::Exhausted {
            attempts: self.retries,
        })
    }
}

/// Pluggable choice of question kind per round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KindPolicy {
    /// Pick multiple-choice or true/false at random each round
    #[default]
    RandomMix,
    /// Always ask multiple-choice questions
    MultipleChoiceOnly,
    /// Always ask true/false questions
    TrueFalseOnly,
}

impl KindPolicy {
    /// Chooses the kind for the next round
    pub fn next_kind(self) -> QuestionKind {
        match self {
            Self::RandomMix => {
                if fastrand::bool() {
                    QuestionKind::MultipleChoice
                } else {
                    QuestionKind::TrueFalse
                }
            }
            Self::MultipleChoiceOnly => QuestionKind::MultipleChoice,
            Self::TrueFalseOnly => QuestionKind::TrueFalse,
        }
    }
}
