use anyhow::{Context, Result, anyhow};
use game_types::{AnswerIndex, OPTIONS_PER_QUESTION};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::question::{Question, QuestionSource};

/// One dictionary entry from the word cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub word: String,
    pub word_type: String,
    pub definition: String,
}

/// The production question source: a bank of scraped "word of the day"
/// entries grouped by word type. Each question picks a random type, three
/// distinct words of that type, and asks for the definition of one of them,
/// so the correct index lands at a different position every round.
#[derive(Debug)]
pub struct WordBank {
    by_type: HashMap<String, Vec<Word>>,
    rng: StdRng,
}

impl WordBank {
    pub fn new(words: Vec<Word>) -> Result<Self> {
        Self::with_rng(words, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(words: Vec<Word>, seed: u64) -> Result<Self> {
        Self::with_rng(words, StdRng::seed_from_u64(seed))
    }

    fn with_rng(words: Vec<Word>, rng: StdRng) -> Result<Self> {
        let mut by_type: HashMap<String, Vec<Word>> = HashMap::new();
        for word in words {
            by_type.entry(word.word_type.clone()).or_default().push(word);
        }
        // A type a question can actually be built from needs enough words
        // to fill every option slot
        by_type.retain(|_, words| words.len() >= OPTIONS_PER_QUESTION);

        if by_type.is_empty() {
            return Err(anyhow!(
                "word bank needs at least {} words of one type",
                OPTIONS_PER_QUESTION
            ));
        }

        Ok(Self { by_type, rng })
    }

    /// Parses the word cache format: one entry per line,
    /// `word<TAB>type<TAB>definition[<TAB>url]`. Blank lines and `#`
    /// comments are skipped; the url column is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut words = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let word = fields.next().unwrap_or_default().trim();
            let word_type = fields.next().unwrap_or_default().trim();
            let definition = fields.next().unwrap_or_default().trim();
            if word.is_empty() || word_type.is_empty() || definition.is_empty() {
                return Err(anyhow!("malformed word entry on line {}", line_no + 1));
            }
            words.push(Word {
                word: word.to_string(),
                word_type: word_type.to_string(),
                definition: definition.to_string(),
            });
        }
        Self::new(words).context("word cache did not contain a playable word set")
    }

    pub fn word_count(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }
}

impl QuestionSource for WordBank {
    fn next_question(&mut self) -> Result<Question> {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort(); // HashMap order is arbitrary; sort so only the rng decides
        let word_type = (*types
            .choose(&mut self.rng)
            .ok_or_else(|| anyhow!("word bank is empty"))?)
        .clone();

        let candidates = &self.by_type[&word_type];
        let options: Vec<Word> = candidates
            .choose_multiple(&mut self.rng, OPTIONS_PER_QUESTION)
            .cloned()
            .collect();

        let target = self.rng.gen_range(0..options.len());
        let correct =
            AnswerIndex::from_array_index(target).ok_or_else(|| anyhow!("target out of range"))?;

        Question::new(
            options[target].word.clone(),
            options.iter().map(|word| word.definition.clone()).collect(),
            correct,
        )
    }
}
