//! Prompt assembly for the study assistant.
//!
//! Builds the instruction text handed to the text-generation
//! collaborator. The embedded context is always bounded to the same
//! character budget the selector uses; the surrounding template is fixed.

use crate::select::{Strategy, CONTINUATION_MARKER};
use crate::text::truncate_chars;

/// Number of questions every generated quiz must contain.
pub const QUIZ_QUESTION_COUNT: usize = 5;
/// Number of options per quiz question.
pub const QUIZ_OPTION_COUNT: usize = 4;

const QA_PREAMBLE: &str = "You are an expert study assistant and educator. \
Give a thorough, well-structured answer that helps the student genuinely understand the material.";

const QA_MULTI_SECTION_NOTE: &str = "IMPORTANT: The content below contains several sections of a document. \
Search through ALL sections to find the specific page, experiment, session, or lab the student is asking about.";

const QA_GUIDELINES: &str = "How to answer:

1. Read every provided section carefully and extract all relevant information, code, and examples.
2. Explain in depth: start with the core idea, then break it down step by step, adding context where it helps.
3. For code, include the relevant snippet, explain what each significant part does, and describe the expected result.
4. Use concrete examples from the content; use analogies for difficult concepts.
5. Define technical terms when they first appear and keep the language clear.
6. Address every part of the question. If the material does not cover something, say: \"This specific information is not covered in the provided material.\"
7. If the answer spans sections separated by [...document continues...], combine them into one coherent answer.
8. Format as plain prose: natural paragraphs, hyphen (-) lists, \"Step 1:\" style sequences, and code shown plainly. Do not use markdown symbols such as *, #, or backticks.";

const QUIZ_PREAMBLE: &str = "You are an expert educational assessment designer. Generate exactly 5 high-quality multiple-choice questions based on the following content.";

const QUIZ_REQUIREMENTS: &str = "REQUIREMENTS:

1. Questions test genuine understanding (concepts, application, reasoning), not rote memorization, and are clear and unambiguous.
2. Mix difficulty: 2 easier, 2 medium, 1 challenging.
3. Coverage: questions 1-2 on core concepts, 3 on a practical application or example, 4 on a technical detail or process, 5 on advanced understanding.
4. Each question has exactly 4 plausible options of similar length, exactly one of which is correct. Do not use \"all of the above\" or \"none of the above\".
5. The \"answer\" field MUST be an exact, character-for-character copy of one of the 4 options.

Return ONLY a JSON array with this exact structure, with no markdown, commentary, or extra text:
[
  {
    \"question\": \"Clear, specific question text?\",
    \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],
    \"answer\": \"Exact copy of the correct option\"
  }
]";

/// Build the question-answering prompt.
///
/// `strategy` is the selection strategy that produced `context`; the
/// comprehensive strategy adds an instruction to search every section.
pub fn build_qa_prompt(
    context: &str,
    question: &str,
    strategy: Strategy,
    max_context_chars: usize,
) -> String {
    let context = truncate_chars(context, max_context_chars);
    let mut prompt = String::with_capacity(context.len() + 2_048);
    prompt.push_str(QA_PREAMBLE);
    prompt.push_str("\n\n");
    if strategy == Strategy::Comprehensive {
        prompt.push_str(QA_MULTI_SECTION_NOTE);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Content to analyze:\n");
    prompt.push_str(context);
    prompt.push_str("\n\nStudent's question: ");
    prompt.push_str(question.trim());
    prompt.push_str("\n\n");
    prompt.push_str(QA_GUIDELINES);
    prompt
}

/// Build the quiz-generation prompt.
///
/// `multi_chunk` is true when `context` joins several chunks.
pub fn build_quiz_prompt(context: &str, multi_chunk: bool, max_context_chars: usize) -> String {
    let context = truncate_chars(context, max_context_chars);
    let heading = if multi_chunk {
        "Content (shown in multiple sections):"
    } else {
        "Content:"
    };
    format!("{QUIZ_PREAMBLE}\n\n{heading}\n{context}\n\n{QUIZ_REQUIREMENTS}")
}

/// True when `context` was reassembled from several chunks.
pub fn is_multi_section(context: &str) -> bool {
    context.contains(CONTINUATION_MARKER)
}
