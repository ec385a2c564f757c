use anyhow::{Result, anyhow};
use game_types::{AnswerIndex, OPTIONS_PER_QUESTION};
use std::collections::VecDeque;

/// One multiple-choice question: a word and three candidate definitions,
/// exactly one of which is the word's real definition. Immutable once
/// issued; the correct index is never sent to clients before scoring.
#[derive(Debug, Clone)]
pub struct Question {
    pub word_to_guess: String,
    pub definitions: Vec<String>,
    pub correct: AnswerIndex,
}

impl Question {
    pub fn new(word_to_guess: String, definitions: Vec<String>, correct: AnswerIndex) -> Result<Self> {
        if definitions.len() != OPTIONS_PER_QUESTION {
            return Err(anyhow!(
                "expected {} definitions, got {}",
                OPTIONS_PER_QUESTION,
                definitions.len()
            ));
        }
        Ok(Self {
            word_to_guess,
            definitions,
            correct,
        })
    }

    pub fn is_correct(&self, answer: AnswerIndex) -> bool {
        answer == self.correct
    }
}

/// Where rounds get their questions from. The production implementation is
/// [`crate::WordBank`]; tests inject a scripted source.
pub trait QuestionSource: Send {
    fn next_question(&mut self) -> Result<Question>;
}

/// A question source that replays a fixed script, then errors when it runs
/// dry. Exposed so server tests can drive fully predictable rounds.
#[derive(Debug, Default)]
pub struct ScriptedQuestions {
    queue: VecDeque<Question>,
}

impl ScriptedQuestions {
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        Self {
            queue: questions.into_iter().collect(),
        }
    }

    /// A script of `count` copies of the same trivial question, correct
    /// answer always `1`.
    pub fn repeating(count: usize) -> Self {
        let correct = AnswerIndex::new(1).expect("1 is in range");
        let questions = (0..count).map(|n| {
            Question::new(
                format!("word{n}"),
                vec![
                    format!("definition of word{n}"),
                    "an unrelated meaning".to_string(),
                    "another decoy".to_string(),
                ],
                correct,
            )
            .expect("three definitions")
        });
        Self::new(questions)
    }
}

impl QuestionSource for ScriptedQuestions {
    fn next_question(&mut self) -> Result<Question> {
        self.queue
            .pop_front()
            .ok_or_else(|| anyhow!("scripted question source is exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_requires_exactly_three_definitions() {
        let correct = AnswerIndex::new(1).unwrap();
        assert!(Question::new("word".into(), vec!["a".into(), "b".into()], correct).is_err());
        assert!(
            Question::new(
                "word".into(),
                vec!["a".into(), "b".into(), "c".into()],
                correct
            )
            .is_ok()
        );
    }

    #[test]
    fn scripted_source_replays_in_order_then_runs_dry() {
        let mut source = ScriptedQuestions::repeating(2);
        assert_eq!(source.next_question().unwrap().word_to_guess, "word0");
        assert_eq!(source.next_question().unwrap().word_to_guess, "word1");
        assert!(source.next_question().is_err());
    }
}
