use game_types::{AnswerIndex, GamePhase, Icon, PlayerState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::question::{Question, QuestionSource};

/// Errors a player action can provoke. Every variant's display text is the
/// `Error{Message}` payload sent back to the offending connection; none of
/// them move the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("players can only join while the game is in the lobby")]
    RegistrationClosed,
    #[error("player details were already provided")]
    AlreadyRegistered,
    #[error("player name must not be empty")]
    EmptyName,
    #[error("unknown icon: {0}")]
    UnknownIcon(String),
    #[error("cannot start a game with no players")]
    NoPlayers,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("no question is open for answers")]
    NoOpenRound,
    #[error("a response was already recorded for this round")]
    DuplicateResponse,
    #[error("answer index out of range: {0}")]
    AnswerOutOfRange(String),
    #[error("unknown player")]
    UnknownPlayer,
}

/// How `reset` treats the player roster. Whether the lobby keeps
/// registrations across games is a deployment choice, so it lives in
/// configuration rather than in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Keep registrations, zero the scores.
    RetainPlayers,
    /// Drop registrations; indices start at 0 again.
    ClearPlayers,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target_score: u32,
    pub max_track_position: u32,
    pub correct_award: u32,
    pub countdown: Duration,
    pub round_duration: Duration,
    pub reset_policy: ResetPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_score: 500,
            max_track_position: 100,
            correct_award: 100,
            countdown: Duration::from_secs(4),
            round_duration: Duration::from_secs(10),
            reset_policy: ResetPolicy::RetainPlayers,
        }
    }
}

/// One registered participant. Never removed and never renumbered; a
/// disconnect only flips `active`.
#[derive(Debug, Clone)]
pub struct Player {
    pub index: usize,
    pub name: String,
    pub icon: Icon,
    pub score: u32,
    pub active: bool,
}

impl Player {
    fn to_state(&self) -> PlayerState {
        PlayerState {
            name: self.name.clone(),
            icon: self.icon,
            score: self.score,
            active: self.active,
        }
    }
}

/// One question/answer/scoring cycle. Responses are first-wins: a second
/// submission from the same player is rejected, never overwritten.
#[derive(Debug)]
pub struct Round {
    pub number: u32,
    pub question: Question,
    pub deadline: Instant,
    responses: HashMap<usize, AnswerIndex>,
}

impl Round {
    pub fn response_of(&self, player_index: usize) -> Option<AnswerIndex> {
        self.responses.get(&player_index).copied()
    }
}

/// Per-player outcome of a scored round.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutcome {
    pub player_index: usize,
    pub correct: bool,
}

/// Everything the transport layer needs to announce a closed round.
#[derive(Debug, Clone)]
pub struct RoundVerdict {
    pub correct_answer: AnswerIndex,
    pub outcomes: Vec<PlayerOutcome>,
    pub standings: Vec<PlayerState>,
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub player_index: usize,
    pub name: String,
    pub icon: Icon,
}

/// The authoritative state of one game, from lobby to summary. Owns the
/// roster, the phase, and the open round; all mutation goes through the
/// methods below so every transition can hold its invariants.
///
/// The session knows nothing about timers or sockets. Callers decide when
/// the deadline has passed (or let [`Session::deadline_elapsed`] consult
/// the injected clock) and ferry the returned values onto the wire.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    players: Vec<Player>,
    phase: GamePhase,
    round: Option<Round>,
    rounds_played: u32,
    created_at: String,
}

impl Session {
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            clock,
            players: Vec::new(),
            phase: GamePhase::Lobby,
            round: None,
            rounds_played: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn active_player_count(&self) -> usize {
        self.players.iter().filter(|player| player.active).count()
    }

    /// Standings in registration order, the `RoundSummary` payload.
    pub fn standings(&self) -> Vec<PlayerState> {
        self.players.iter().map(Player::to_state).collect()
    }

    /// Registers a player in the lobby. The returned index is the player's
    /// stable display slot for the lifetime of the session.
    pub fn register_player(&mut self, name: &str, icon: Icon) -> Result<usize, SessionError> {
        if self.phase != GamePhase::Lobby {
            return Err(SessionError::RegistrationClosed);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let index = self.players.len();
        self.players.push(Player {
            index,
            name: name.to_string(),
            icon,
            score: 0,
            active: true,
        });
        debug!(session = %self.id, index, name, "player registered");
        Ok(index)
    }

    /// `Lobby -> Countdown`. Returns the countdown duration to broadcast.
    pub fn begin_countdown(&mut self) -> Result<Duration, SessionError> {
        if self.phase != GamePhase::Lobby {
            return Err(SessionError::AlreadyStarted);
        }
        if self.players.is_empty() {
            return Err(SessionError::NoPlayers);
        }
        self.phase = GamePhase::Countdown;
        Ok(self.config.countdown)
    }

    /// `Countdown -> Question` or `Scoring -> Question`: opens the next
    /// round with a fresh question and deadline.
    pub fn begin_round(
        &mut self,
        source: &mut dyn QuestionSource,
    ) -> Result<&Round, SessionError> {
        match self.phase {
            GamePhase::Countdown | GamePhase::Scoring => {}
            _ => return Err(SessionError::NoOpenRound),
        }

        let question = source
            .next_question()
            .map_err(|_| SessionError::NoOpenRound)?;
        self.rounds_played += 1;
        self.round = Some(Round {
            number: self.rounds_played,
            question,
            deadline: self.clock.now() + self.config.round_duration,
            responses: HashMap::new(),
        });
        self.phase = GamePhase::Question;
        debug!(session = %self.id, round = self.rounds_played, "round opened");
        Ok(self.round.as_ref().expect("round just created"))
    }

    /// Records a player's answer. First submission wins; anything after
    /// that, or outside an open round, is rejected without mutation.
    pub fn submit_response(
        &mut self,
        player_index: usize,
        answer: AnswerIndex,
    ) -> Result<(), SessionError> {
        if self.phase != GamePhase::Question {
            return Err(SessionError::NoOpenRound);
        }
        if self.players.get(player_index).is_none() {
            return Err(SessionError::UnknownPlayer);
        }
        let round = self.round.as_mut().ok_or(SessionError::NoOpenRound)?;
        if round.responses.contains_key(&player_index) {
            return Err(SessionError::DuplicateResponse);
        }
        round.responses.insert(player_index, answer);
        Ok(())
    }

    /// True once every active player has answered the open round. Inactive
    /// players are not waited for, so a disconnected peer can never stall
    /// the round. False when nobody is active: a round with no one left to
    /// answer is closed by its deadline, not by quorum.
    pub fn quorum_reached(&self) -> bool {
        let Some(round) = &self.round else {
            return false;
        };
        if self.phase != GamePhase::Question {
            return false;
        }
        let active: Vec<usize> = self
            .players
            .iter()
            .filter(|player| player.active)
            .map(|player| player.index)
            .collect();
        !active.is_empty()
            && active
                .iter()
                .all(|index| round.responses.contains_key(index))
    }

    /// True once the open round's deadline has passed on the injected clock.
    pub fn deadline_elapsed(&self) -> bool {
        match (&self.round, self.phase) {
            (Some(round), GamePhase::Question) => self.clock.now() >= round.deadline,
            _ => false,
        }
    }

    /// `Question -> Scoring`: scores the round and, if someone reached the
    /// target, moves on to `Summary`. Idempotence against the deadline /
    /// quorum race lives here: the loser of the race finds the phase
    /// already moved and gets `NoOpenRound` back, a no-op by design of the
    /// protocol (callers ignore it).
    pub fn close_round(&mut self) -> Result<RoundVerdict, SessionError> {
        if self.phase != GamePhase::Question {
            return Err(SessionError::NoOpenRound);
        }
        let round = self.round.as_ref().ok_or(SessionError::NoOpenRound)?;
        let correct_answer = round.question.correct;

        let mut outcomes = Vec::with_capacity(self.players.len());
        for player in &mut self.players {
            let correct = round
                .responses
                .get(&player.index)
                .is_some_and(|answer| *answer == correct_answer);
            if correct && player.active {
                player.score += self.config.correct_award;
            }
            outcomes.push(PlayerOutcome {
                player_index: player.index,
                correct,
            });
        }

        self.phase = GamePhase::Scoring;
        let winner = self.pick_winner();
        if winner.is_some() {
            self.phase = GamePhase::Summary;
        }

        debug!(
            session = %self.id,
            round = round.number,
            winner = winner.as_ref().map(|w| w.name.as_str()),
            "round closed"
        );

        Ok(RoundVerdict {
            correct_answer,
            outcomes,
            standings: self.standings(),
            winner,
        })
    }

    /// The player with the strictly highest score among those at or over
    /// the target. Ties break to the lowest index: arbitrary, but
    /// deterministic and stable across reconnects.
    fn pick_winner(&self) -> Option<Winner> {
        self.players
            .iter()
            .filter(|player| player.score >= self.config.target_score)
            .max_by_key(|player| player.score)
            .map(|player| Winner {
                player_index: player.index,
                name: player.name.clone(),
                icon: player.icon,
            })
    }

    /// Marks a player's channel as gone. The player keeps their slot and
    /// score so the standings stay stable; they just stop counting towards
    /// quorum and can no longer earn awards.
    pub fn mark_disconnected(&mut self, player_index: usize) {
        if let Some(player) = self.players.get_mut(player_index) {
            player.active = false;
            debug!(session = %self.id, index = player_index, "player disconnected");
        }
    }

    /// Back to the lobby. Clears the round and the scores; the roster
    /// survives or not per the configured [`ResetPolicy`].
    pub fn reset(&mut self) {
        self.reset_with(self.config.reset_policy);
    }

    /// Reset with an explicit policy, overriding configuration. Used when a
    /// session is abandoned: a roster of disconnected players is cleared no
    /// matter what the lobby normally retains.
    pub fn reset_with(&mut self, policy: ResetPolicy) {
        self.round = None;
        self.rounds_played = 0;
        self.phase = GamePhase::Lobby;
        match policy {
            ResetPolicy::RetainPlayers => {
                for player in &mut self.players {
                    player.score = 0;
                }
            }
            ResetPolicy::ClearPlayers => self.players.clear(),
        }
        debug!(session = %self.id, "session reset to lobby");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::question::ScriptedQuestions;
    use game_types::track_position;

    fn test_config() -> SessionConfig {
        SessionConfig {
            target_score: 500,
            max_track_position: 100,
            correct_award: 100,
            countdown: Duration::from_secs(4),
            round_duration: Duration::from_secs(10),
            reset_policy: ResetPolicy::RetainPlayers,
        }
    }

    fn session_with_players(names: &[&str]) -> (Session, ManualClock) {
        let clock = ManualClock::new();
        let mut session = Session::new(test_config(), Arc::new(clock.clone()));
        for (i, name) in names.iter().enumerate() {
            session.register_player(name, Icon::ALL[i]).unwrap();
        }
        (session, clock)
    }

    fn answer(index: u8) -> AnswerIndex {
        AnswerIndex::new(index).unwrap()
    }

    #[test]
    fn registration_assigns_stable_indices_in_join_order() {
        let (session, _) = session_with_players(&["Alice", "Bob", "Carol"]);
        let names: Vec<&str> = session
            .players()
            .iter()
            .map(|player| player.name.as_str())
            .collect();
        assert_eq!(names, ["Alice", "Bob", "Carol"]);
        assert_eq!(session.players()[2].index, 2);
    }

    #[test]
    fn registration_rejects_blank_names() {
        let clock = Arc::new(ManualClock::new());
        let mut session = Session::new(test_config(), clock);
        assert_eq!(
            session.register_player("   ", Icon::Horse1),
            Err(SessionError::EmptyName)
        );
    }

    #[test]
    fn registration_closes_outside_the_lobby() {
        let (mut session, _) = session_with_players(&["Alice"]);
        session.begin_countdown().unwrap();
        assert_eq!(
            session.register_player("Bob", Icon::Horse2),
            Err(SessionError::RegistrationClosed)
        );
        // The failed registration did not move the state machine
        assert_eq!(session.phase(), GamePhase::Countdown);
    }

    #[test]
    fn countdown_requires_a_player() {
        let clock = Arc::new(ManualClock::new());
        let mut session = Session::new(test_config(), clock);
        assert_eq!(session.begin_countdown(), Err(SessionError::NoPlayers));
    }

    #[test]
    fn phase_sequence_is_lobby_countdown_question_scoring() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        assert_eq!(session.phase(), GamePhase::Lobby);

        session.begin_countdown().unwrap();
        assert_eq!(session.phase(), GamePhase::Countdown);

        let mut source = ScriptedQuestions::repeating(3);
        session.begin_round(&mut source).unwrap();
        assert_eq!(session.phase(), GamePhase::Question);

        session.close_round().unwrap();
        assert_eq!(session.phase(), GamePhase::Scoring);

        // And the loop continues into the next question
        session.begin_round(&mut source).unwrap();
        assert_eq!(session.phase(), GamePhase::Question);
    }

    #[test]
    fn correct_answers_earn_the_fixed_award() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();

        session.submit_response(0, answer(1)).unwrap(); // correct
        session.submit_response(1, answer(2)).unwrap(); // wrong

        let verdict = session.close_round().unwrap();
        assert_eq!(verdict.correct_answer, answer(1));
        assert_eq!(
            verdict.outcomes,
            vec![
                PlayerOutcome {
                    player_index: 0,
                    correct: true
                },
                PlayerOutcome {
                    player_index: 1,
                    correct: false
                },
            ]
        );
        assert_eq!(session.players()[0].score, 100);
        assert_eq!(session.players()[1].score, 0);
    }

    #[test]
    fn second_response_from_the_same_player_is_rejected_not_merged() {
        let (mut session, _) = session_with_players(&["Alice"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();

        session.submit_response(0, answer(2)).unwrap();
        assert_eq!(
            session.submit_response(0, answer(1)),
            Err(SessionError::DuplicateResponse)
        );

        // The first (wrong) answer stands, so no award
        let verdict = session.close_round().unwrap();
        assert!(!verdict.outcomes[0].correct);
        assert_eq!(session.players()[0].score, 0);
    }

    #[test]
    fn responses_outside_an_open_round_are_rejected() {
        let (mut session, _) = session_with_players(&["Alice"]);
        assert_eq!(
            session.submit_response(0, answer(1)),
            Err(SessionError::NoOpenRound)
        );

        session.begin_countdown().unwrap();
        assert_eq!(
            session.submit_response(0, answer(1)),
            Err(SessionError::NoOpenRound)
        );
    }

    #[test]
    fn late_response_after_close_does_not_leak_into_the_next_round() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(2);
        session.begin_round(&mut source).unwrap();

        session.submit_response(0, answer(1)).unwrap();
        session.close_round().unwrap();

        // Bob's answer arrives after the deadline fired
        assert_eq!(
            session.submit_response(1, answer(1)),
            Err(SessionError::NoOpenRound)
        );

        // Next round opens untouched by the stray response
        session.begin_round(&mut source).unwrap();
        let round = session.round().unwrap();
        assert_eq!(round.response_of(1), None);
        assert!(!session.quorum_reached());
    }

    #[test]
    fn quorum_counts_active_players_only() {
        let (mut session, _) = session_with_players(&["Alice", "Bob", "Carol", "Dave"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();

        session.mark_disconnected(3);

        session.submit_response(0, answer(1)).unwrap();
        session.submit_response(1, answer(1)).unwrap();
        assert!(!session.quorum_reached());

        session.submit_response(2, answer(1)).unwrap();
        // Closes without waiting for the disconnected fourth player
        assert!(session.quorum_reached());
    }

    #[test]
    fn quorum_is_never_reached_with_no_active_players() {
        let (mut session, _) = session_with_players(&["Alice"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();
        session.mark_disconnected(0);
        assert!(!session.quorum_reached());
    }

    #[test]
    fn disconnected_players_keep_their_slot_and_score() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(2);
        session.begin_round(&mut source).unwrap();
        session.submit_response(1, answer(1)).unwrap();
        session.close_round().unwrap();

        session.mark_disconnected(1);

        let standings = session.standings();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[1].name, "Bob");
        assert_eq!(standings[1].score, 100);
        assert!(!standings[1].active);
    }

    #[test]
    fn inactive_players_earn_no_award_even_with_a_recorded_answer() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();

        session.submit_response(1, answer(1)).unwrap();
        session.mark_disconnected(1);

        session.close_round().unwrap();
        assert_eq!(session.players()[1].score, 0);
    }

    #[test]
    fn deadline_tracks_the_injected_clock() {
        let (mut session, clock) = session_with_players(&["Alice"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();

        assert!(!session.deadline_elapsed());
        clock.advance(Duration::from_secs(9));
        assert!(!session.deadline_elapsed());
        clock.advance(Duration::from_secs(1));
        assert!(session.deadline_elapsed());
    }

    #[test]
    fn closing_an_already_closed_round_is_a_no_op_error() {
        let (mut session, _) = session_with_players(&["Alice"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();
        session.close_round().unwrap();

        let score_before = session.players()[0].score;
        assert_eq!(session.close_round().unwrap_err(), SessionError::NoOpenRound);
        assert_eq!(session.players()[0].score, score_before);
    }

    #[test]
    fn scores_are_monotonically_non_decreasing() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.begin_countdown().unwrap();
        let mut source = ScriptedQuestions::repeating(4);
        let mut previous = vec![0u32; 2];
        for round in 0..4 {
            session.begin_round(&mut source).unwrap();
            // Alice alternates right and wrong, Bob never answers
            let alice = if round % 2 == 0 { answer(1) } else { answer(3) };
            session.submit_response(0, alice).unwrap();
            session.close_round().unwrap();

            for (player, previous) in session.players().iter().zip(&previous) {
                assert!(player.score >= *previous);
            }
            previous = session.players().iter().map(|p| p.score).collect();
        }
        assert_eq!(previous, vec![200, 0]);
    }

    #[test]
    fn winner_is_highest_score_with_lowest_index_tie_break() {
        let (mut session, _) = session_with_players(&["A", "B", "C", "D"]);
        session.players[0].score = 300;
        session.players[1].score = 520;
        session.players[2].score = 520;
        session.players[3].score = 100;

        let winner = session.pick_winner().unwrap();
        assert_eq!(winner.player_index, 1);
        assert_eq!(winner.name, "B");
    }

    #[test]
    fn reaching_the_target_moves_the_session_to_summary() {
        let mut config = test_config();
        config.target_score = 100;
        let mut session = Session::new(config, Arc::new(ManualClock::new()));
        session.register_player("Alice", Icon::Horse1).unwrap();
        session.begin_countdown().unwrap();

        let mut source = ScriptedQuestions::repeating(1);
        session.begin_round(&mut source).unwrap();
        session.submit_response(0, answer(1)).unwrap();

        let verdict = session.close_round().unwrap();
        let winner = verdict.winner.unwrap();
        assert_eq!(winner.name, "Alice");
        assert_eq!(winner.icon, Icon::Horse1);
        assert_eq!(session.phase(), GamePhase::Summary);
    }

    #[test]
    fn reset_returns_to_lobby_and_applies_the_roster_policy() {
        let (mut session, _) = session_with_players(&["Alice", "Bob"]);
        session.players[0].score = 500;
        session.begin_countdown().unwrap();
        session.reset();

        assert_eq!(session.phase(), GamePhase::Lobby);
        assert_eq!(session.players().len(), 2);
        assert!(session.players().iter().all(|player| player.score == 0));

        // Same session configured to clear the roster instead
        let mut config = test_config();
        config.reset_policy = ResetPolicy::ClearPlayers;
        let mut session = Session::new(config, Arc::new(ManualClock::new()));
        session.register_player("Alice", Icon::Horse1).unwrap();
        session.reset();
        assert!(session.players().is_empty());
        assert_eq!(session.register_player("Eve", Icon::Horse2), Ok(0));
    }

    #[test]
    fn standings_positions_follow_the_shared_formula() {
        let (mut session, _) = session_with_players(&["Alice"]);
        session.players[0].score = 250;
        let standings = session.standings();
        let state = &standings[0];
        assert_eq!(
            track_position(state.score, 500, 100),
            50,
            "projector and orchestrator must agree on the mapping"
        );
    }
}
