//! Strict parsing of generated quiz output.
//!
//! Generators often wrap JSON in markdown fences or add a sentence before
//! or after it. [`parse_quiz`] tolerates that: it strips fences, then
//! tries each `[` in order until one starts an array of quiz items that
//! passes [`validate_quiz`]. Anything that does not satisfy the quiz
//! contract is a
//! [`StudyError::MalformedGenerationOutput`]; a corrected quiz is never
//! guessed.

use serde_json::Deserializer;

use crate::error::StudyError;
use crate::models::QuizQuestion;
use crate::prompt::{QUIZ_OPTION_COUNT, QUIZ_QUESTION_COUNT};
use crate::text::strip_code_fences;

/// Parse and validate generator output as a quiz.
pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, StudyError> {
    let cleaned = strip_code_fences(raw);
    let mut first_error = None;
    for quiz in candidate_arrays(&cleaned) {
        match validate_quiz(&quiz) {
            Ok(()) => return Ok(quiz),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| {
        StudyError::MalformedGenerationOutput("no JSON array of quiz questions found".to_string())
    }))
}

/// Serialize a validated quiz as compact JSON for the API response.
pub fn quiz_to_json(quiz: &[QuizQuestion]) -> Result<String, StudyError> {
    serde_json::to_string(quiz).map_err(|e| StudyError::MalformedGenerationOutput(e.to_string()))
}

/// Every array of quiz items that starts at a `[` in `s`, in order.
fn candidate_arrays(s: &str) -> impl Iterator<Item = Vec<QuizQuestion>> + '_ {
    s.match_indices('[').filter_map(|(start, _)| {
        Deserializer::from_str(&s[start..])
            .into_iter::<Vec<QuizQuestion>>()
            .next()
            .and_then(Result::ok)
    })
}

/// Check the quiz contract: exactly [`QUIZ_QUESTION_COUNT`] questions,
/// each with [`QUIZ_OPTION_COUNT`] options and an answer copied verbatim
/// from the options.
pub fn validate_quiz(quiz: &[QuizQuestion]) -> Result<(), StudyError> {
    if quiz.len() != QUIZ_QUESTION_COUNT {
        return Err(StudyError::MalformedGenerationOutput(format!(
            "expected {} questions, got {}",
            QUIZ_QUESTION_COUNT,
            quiz.len()
        )));
    }
    for (i, q) in quiz.iter().enumerate() {
        let n = i + 1;
        if q.question.trim().is_empty() {
            return Err(StudyError::MalformedGenerationOutput(format!(
                "question {} has no text",
                n
            )));
        }
        if q.options.len() != QUIZ_OPTION_COUNT {
            return Err(StudyError::MalformedGenerationOutput(format!(
                "question {} has {} options, expected {}",
                n,
                q.options.len(),
                QUIZ_OPTION_COUNT
            )));
        }
        if !q.options.iter().any(|o| o == &q.answer) {
            return Err(StudyError::MalformedGenerationOutput(format!(
                "answer to question {} does not match any option",
                n
            )));
        }
    }
    Ok(())
}
