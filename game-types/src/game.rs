use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// The orchestrator's state-machine state for one session.
///
/// Valid order: `Lobby -> Countdown -> (Question -> Scoring)+ -> Summary`,
/// then back to `Lobby` on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GamePhase {
    Lobby,
    Countdown,
    Question,
    Scoring,
    Summary,
}

/// A validated 1-based answer index. The wire carries it as the string
/// `"1"`, `"2"` or `"3"`; everything behind the codec boundary uses this
/// type so 0-based and 1-based numbering never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnswerIndex(u8);

/// Number of candidate definitions per question.
pub const OPTIONS_PER_QUESTION: usize = 3;

impl AnswerIndex {
    pub fn new(index: u8) -> Option<Self> {
        (1..=OPTIONS_PER_QUESTION as u8)
            .contains(&index)
            .then_some(AnswerIndex(index))
    }

    /// Parses a player-typed index. Tolerates surrounding whitespace and
    /// leading zeros (`" 2"`, `"02"`), matching the original validator.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// The matching position in a `Definitions` array.
    pub fn as_array_index(&self) -> usize {
        usize::from(self.0) - 1
    }

    pub fn from_array_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }
}

impl fmt::Display for AnswerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AnswerIndex {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        AnswerIndex::parse(&raw).ok_or_else(|| format!("answer index out of range: {raw:?}"))
    }
}

impl From<AnswerIndex> for String {
    fn from(index: AnswerIndex) -> Self {
        index.0.to_string()
    }
}

/// Maps a score to a track cell: linear interpolation towards the target
/// score, clamped at the end of the track. Display math shared by both
/// sides of the protocol; the server never treats it as authoritative.
pub fn track_position(score: u32, target_score: u32, max_position: u32) -> u32 {
    if target_score == 0 {
        return max_position;
    }
    let position = u64::from(score) * u64::from(max_position) / u64::from(target_score);
    position.min(u64::from(max_position)) as u32
}
