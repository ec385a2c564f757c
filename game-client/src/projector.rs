use game_types::{AnswerIndex, ClientMessage, Icon, ServerMessage, track_position};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// What a track lane should draw for its rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIcon {
    /// The player's chosen icon.
    Rider(Icon),
    /// Distinct marker for a disconnected player. The chosen icon is kept
    /// underneath so it comes back if the player ever does.
    Riderless,
}

/// One visual lane, keyed by player index. Created the first time that
/// index appears in a `RoundSummary` and updated in place ever after.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub icon: Icon,
    pub score: u32,
    pub active: bool,
    pub position: u32,
}

impl Track {
    pub fn display_icon(&self) -> DisplayIcon {
        if self.active {
            DisplayIcon::Rider(self.icon)
        } else {
            DisplayIcon::Riderless
        }
    }
}

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub round: u32,
    pub word_to_guess: String,
    pub definitions: Vec<String>,
    pub chosen: Option<AnswerIndex>,
}

/// Answer feedback revealed by `PlayerResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub correct: bool,
    pub correct_answer: AnswerIndex,
}

/// The end-of-game banner.
#[derive(Debug, Clone, PartialEq)]
pub struct WinnerBanner {
    pub name: String,
    pub icon: Icon,
}

/// Reasons `Projector::register` refuses to produce an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    EmptyName,
    NoIconChosen,
}

/// The client-side mirror of a game session. Feed it the decoded server
/// event stream in arrival order; each `apply` is atomic and the state
/// after it is entirely a function of the events seen so far. Nothing in
/// here is authoritative: scores and the correct answer always come from
/// the server, the projector only derives what to draw.
#[derive(Debug)]
pub struct Projector {
    target_score: u32,
    max_position: u32,
    registered: bool,
    countdown_seconds: Option<u32>,
    question: Option<QuestionView>,
    feedback: Option<Feedback>,
    tracks: BTreeMap<usize, Track>,
    winner: Option<WinnerBanner>,
    notices: Vec<String>,
    submission_locked: bool,
}

/// Track length used until the server's target arrives with `Welcome`.
const DEFAULT_MAX_POSITION: u32 = 100;
const DEFAULT_TARGET_SCORE: u32 = 500;

impl Default for Projector {
    fn default() -> Self {
        Self::new()
    }
}

impl Projector {
    pub fn new() -> Self {
        Self {
            target_score: DEFAULT_TARGET_SCORE,
            max_position: DEFAULT_MAX_POSITION,
            registered: false,
            countdown_seconds: None,
            question: None,
            feedback: None,
            tracks: BTreeMap::new(),
            winner: None,
            notices: Vec::new(),
            submission_locked: false,
        }
    }

    /// Applies one server event to the mirror. Unknown tags never get here;
    /// the codec drops them before dispatch.
    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { target_score } => {
                self.registered = true;
                self.target_score = target_score;
            }
            ServerMessage::Error { message } => {
                // Non-fatal by definition; game state is untouched
                self.notices.push(message);
            }
            ServerMessage::AboutToStart { seconds } => {
                // Idempotent restart: a second AboutToStart rewinds the
                // countdown instead of stacking another one
                self.countdown_seconds = Some(seconds);
                self.winner = None;
            }
            ServerMessage::PresentQuestion {
                round,
                word_to_guess,
                definitions,
            } => {
                self.countdown_seconds = None;
                self.feedback = None;
                self.submission_locked = false;
                self.question = Some(QuestionView {
                    round,
                    word_to_guess,
                    definitions,
                    chosen: None,
                });
            }
            ServerMessage::PlayerResult {
                correct,
                correct_answer,
            } => {
                self.feedback = Some(Feedback {
                    correct,
                    correct_answer,
                });
            }
            ServerMessage::RoundSummary { player_states } => {
                for (index, state) in player_states.into_iter().enumerate() {
                    let position =
                        track_position(state.score, self.target_score, self.max_position);
                    match self.tracks.entry(index) {
                        Entry::Occupied(mut entry) => {
                            let track = entry.get_mut();
                            track.name = state.name;
                            track.icon = state.icon;
                            track.score = state.score;
                            track.active = state.active;
                            track.position = position;
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(Track {
                                name: state.name,
                                icon: state.icon,
                                score: state.score,
                                active: state.active,
                                position,
                            });
                        }
                    }
                }
            }
            ServerMessage::Summary { winner, icon } => {
                self.question = None;
                self.countdown_seconds = None;
                self.winner = Some(WinnerBanner { name: winner, icon });
            }
        }
    }

    /// Builds the registration intent, validating locally before anything
    /// touches the wire. The server re-validates on its side regardless.
    pub fn register(
        &self,
        name: &str,
        icon: Option<Icon>,
    ) -> Result<ClientMessage, RegistrationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        let icon = icon.ok_or(RegistrationError::NoIconChosen)?;
        Ok(ClientMessage::PlayerDetailsResp {
            name: name.to_string(),
            icon: icon.as_str().to_string(),
        })
    }

    /// Submits an answer for the question on screen: at most one per round.
    /// Locks itself immediately so a double-click can never produce a
    /// second send, without waiting for the server to say anything.
    pub fn answer(&mut self, index: AnswerIndex) -> Option<ClientMessage> {
        let question = self.question.as_mut()?;
        if self.submission_locked {
            return None;
        }
        question.chosen = Some(index);
        self.submission_locked = true;
        Some(ClientMessage::PlayerResponse {
            response: index.to_string(),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn countdown_seconds(&self) -> Option<u32> {
        self.countdown_seconds
    }

    pub fn question(&self) -> Option<&QuestionView> {
        self.question.as_ref()
    }

    pub fn feedback(&self) -> Option<Feedback> {
        self.feedback
    }

    pub fn tracks(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks.iter().map(|(index, track)| (*index, track))
    }

    pub fn track(&self, player_index: usize) -> Option<&Track> {
        self.tracks.get(&player_index)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn winner(&self) -> Option<&WinnerBanner> {
        self.winner.as_ref()
    }

    /// Drains pending user-visible notices (from `Error` events).
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_types::PlayerState;

    fn state(name: &str, icon: Icon, score: u32, active: bool) -> PlayerState {
        PlayerState {
            name: name.to_string(),
            icon,
            score,
            active,
        }
    }

    fn summary(states: Vec<PlayerState>) -> ServerMessage {
        ServerMessage::RoundSummary {
            player_states: states,
        }
    }

    fn question(round: u32) -> ServerMessage {
        ServerMessage::PresentQuestion {
            round,
            word_to_guess: "petrichor".to_string(),
            definitions: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    }

    fn index(i: u8) -> AnswerIndex {
        AnswerIndex::new(i).unwrap()
    }

    #[test]
    fn round_summary_materializes_tracks_idempotently() {
        let mut projector = Projector::new();
        let states = vec![
            state("Alice", Icon::Horse1, 100, true),
            state("Bob", Icon::Horse2, 0, true),
        ];

        projector.apply(summary(states.clone()));
        assert_eq!(projector.track_count(), 2);
        let first: Vec<Track> = projector.tracks().map(|(_, t)| t.clone()).collect();

        // The same event again must update in place, never duplicate
        projector.apply(summary(states));
        assert_eq!(projector.track_count(), 2);
        let second: Vec<Track> = projector.tracks().map(|(_, t)| t.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn track_positions_follow_the_shared_formula() {
        let mut projector = Projector::new();
        projector.apply(ServerMessage::Welcome { target_score: 500 });
        projector.apply(summary(vec![
            state("Alice", Icon::Horse1, 250, true),
            state("Bob", Icon::Horse2, 9999, true),
        ]));

        assert_eq!(projector.track(0).unwrap().position, 50);
        // Clamped at the end of the track
        assert_eq!(projector.track(1).unwrap().position, 100);
    }

    #[test]
    fn inactive_players_get_the_riderless_marker_but_keep_their_icon() {
        let mut projector = Projector::new();
        projector.apply(summary(vec![state("Alice", Icon::Horse3, 100, false)]));

        let track = projector.track(0).unwrap();
        assert_eq!(track.display_icon(), DisplayIcon::Riderless);
        assert_eq!(track.icon, Icon::Horse3);

        // Back on the horse next summary
        projector.apply(summary(vec![state("Alice", Icon::Horse3, 100, true)]));
        assert_eq!(
            projector.track(0).unwrap().display_icon(),
            DisplayIcon::Rider(Icon::Horse3)
        );
    }

    #[test]
    fn present_question_resets_feedback_and_unlocks_submission() {
        let mut projector = Projector::new();
        projector.apply(question(1));
        assert!(projector.answer(index(2)).is_some());

        projector.apply(ServerMessage::PlayerResult {
            correct: false,
            correct_answer: index(1),
        });
        assert_eq!(projector.feedback().unwrap().correct_answer, index(1));

        projector.apply(question(2));
        assert_eq!(projector.feedback(), None);
        assert_eq!(projector.question().unwrap().round, 2);
        assert_eq!(projector.question().unwrap().chosen, None);
        // The previous round's lock is lifted
        assert!(projector.answer(index(3)).is_some());
    }

    #[test]
    fn at_most_one_answer_per_round() {
        let mut projector = Projector::new();
        projector.apply(question(1));

        let first = projector.answer(index(1));
        assert!(matches!(
            first,
            Some(ClientMessage::PlayerResponse { ref response }) if response == "1"
        ));
        // Locked immediately, before any server acknowledgment
        assert_eq!(projector.answer(index(2)), None);
        assert_eq!(projector.question().unwrap().chosen, Some(index(1)));
    }

    #[test]
    fn no_answer_without_a_question_on_screen() {
        let mut projector = Projector::new();
        assert_eq!(projector.answer(index(1)), None);
    }

    #[test]
    fn registration_validates_name_and_icon_locally() {
        let projector = Projector::new();
        assert_eq!(
            projector.register("  ", Some(Icon::Horse1)),
            Err(RegistrationError::EmptyName)
        );
        assert_eq!(
            projector.register("Alice", None),
            Err(RegistrationError::NoIconChosen)
        );

        let intent = projector.register(" Alice ", Some(Icon::Horse1)).unwrap();
        assert!(matches!(
            intent,
            ClientMessage::PlayerDetailsResp { ref name, ref icon }
                if name == "Alice" && icon == "Horse1"
        ));
    }

    #[test]
    fn about_to_start_restarts_the_countdown_rather_than_stacking() {
        let mut projector = Projector::new();
        projector.apply(ServerMessage::AboutToStart { seconds: 4 });
        assert_eq!(projector.countdown_seconds(), Some(4));

        projector.apply(ServerMessage::AboutToStart { seconds: 4 });
        assert_eq!(projector.countdown_seconds(), Some(4));

        projector.apply(question(1));
        assert_eq!(projector.countdown_seconds(), None);
    }

    #[test]
    fn errors_surface_as_notices_without_touching_game_state() {
        let mut projector = Projector::new();
        projector.apply(question(1));
        projector.apply(ServerMessage::Error {
            message: "a response was already recorded for this round".to_string(),
        });

        assert_eq!(projector.question().unwrap().round, 1);
        assert_eq!(
            projector.take_notices(),
            vec!["a response was already recorded for this round".to_string()]
        );
        assert!(projector.take_notices().is_empty());
    }

    #[test]
    fn summary_hides_the_question_and_shows_the_winner() {
        let mut projector = Projector::new();
        projector.apply(question(5));
        projector.apply(ServerMessage::Summary {
            winner: "Alice".to_string(),
            icon: Icon::Horse1,
        });

        assert_eq!(projector.question(), None);
        let banner = projector.winner().unwrap();
        assert_eq!(banner.name, "Alice");
        assert_eq!(banner.icon, Icon::Horse1);
    }

    #[test]
    fn welcome_records_registration_and_target() {
        let mut projector = Projector::new();
        assert!(!projector.is_registered());
        projector.apply(ServerMessage::Welcome { target_score: 200 });
        assert!(projector.is_registered());

        projector.apply(summary(vec![state("Alice", Icon::Horse1, 100, true)]));
        // Position scales against the announced target
        assert_eq!(projector.track(0).unwrap().position, 50);
    }
}
