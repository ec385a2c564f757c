use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_core::{
    QuestionSource, ResetPolicy, Session, SessionConfig, SessionError, SystemClock,
};
use game_types::{AnswerIndex, GamePhase, Icon, ServerMessage};

/// Drives one game session: owns the authoritative [`Session`], paces the
/// countdown and the rounds, and turns state transitions into broadcasts.
///
/// Every broadcast happens while the session lock is held, so no connection
/// can observe a transition another connection's stream does not yet
/// reflect. Round closure is raced between the deadline timer and the
/// all-active-players-responded quorum; whichever fires first closes the
/// round and the loser finds the phase already moved and backs off.
pub struct Orchestrator {
    session: Mutex<Session>,
    question_source: Mutex<Box<dyn QuestionSource>>,
    connections: Arc<ConnectionManager>,
    /// Pinged whenever the open round may be ready to close early.
    round_advanced: Notify,
    /// Bumped on every start and reset. The round loop carries the epoch it
    /// was spawned under and stands down on mismatch, so a loop orphaned by
    /// a mid-countdown reset can never touch a later game's rounds.
    epoch: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        connections: Arc<ConnectionManager>,
        config: SessionConfig,
        question_source: Box<dyn QuestionSource>,
    ) -> Self {
        Self {
            session: Mutex::new(Session::new(config, Arc::new(SystemClock))),
            question_source: Mutex::new(question_source),
            connections,
            round_advanced: Notify::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub async fn phase(&self) -> GamePhase {
        self.session.lock().await.phase()
    }

    /// Registers the connection's player and welcomes it. The `Welcome` is
    /// sent under the session lock so it always precedes any broadcast
    /// caused by a later transition.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        name: &str,
        icon: Icon,
    ) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        if self.connections.player_of(connection_id).await.is_some() {
            return Err(SessionError::AlreadyRegistered);
        }
        let player_index = session.register_player(name, icon)?;
        self.connections.bind_player(connection_id, player_index).await;
        let _ = self
            .connections
            .send_to_connection(
                connection_id,
                ServerMessage::Welcome {
                    target_score: session.config().target_score,
                },
            )
            .await;
        info!(%connection_id, player_index, name, "player joined the lobby");
        Ok(())
    }

    /// The out-of-band start trigger: `Lobby -> Countdown`, then spawns the
    /// round loop that carries the session to its summary.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        let (countdown, epoch) = {
            let mut session = self.session.lock().await;
            let countdown = session.begin_countdown()?;
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            self.connections
                .broadcast(ServerMessage::AboutToStart {
                    seconds: countdown.as_secs() as u32,
                })
                .await;
            (countdown, epoch)
        };

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_rounds(countdown, epoch).await;
        });
        Ok(())
    }

    /// Records a player's answer; on quorum, nudges the round loop so fast
    /// tables never wait out the deadline.
    pub async fn submit_response(
        &self,
        connection_id: ConnectionId,
        raw_response: &str,
    ) -> Result<(), SessionError> {
        let answer = AnswerIndex::parse(raw_response)
            .ok_or_else(|| SessionError::AnswerOutOfRange(raw_response.to_string()))?;

        let mut session = self.session.lock().await;
        let player_index = self
            .connections
            .player_of(connection_id)
            .await
            .ok_or(SessionError::UnknownPlayer)?;
        session.submit_response(player_index, answer)?;

        if session.quorum_reached() {
            self.round_advanced.notify_one();
        }
        Ok(())
    }

    /// Flags the player behind a closed channel as inactive. Their slot and
    /// score survive; the round loop is nudged in case the quorum just
    /// shrank down to the players who already answered.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let Some(player_index) = self.connections.remove_connection(connection_id).await else {
            return;
        };

        let mut session = self.session.lock().await;
        session.mark_disconnected(player_index);

        if session.active_player_count() == 0 {
            if session.phase() != GamePhase::Lobby {
                info!(session = %session.id(), "all players gone, abandoning the session");
            }
            session.reset_with(ResetPolicy::ClearPlayers);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.round_advanced.notify_one();
    }

    /// Explicit `Summary -> Lobby` reset (also usable to abort a stuck
    /// lobby countdown). The round loop notices the epoch change and exits.
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        session.reset();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.round_advanced.notify_one();
    }

    async fn run_rounds(self: Arc<Self>, countdown: Duration, epoch: u64) {
        tokio::time::sleep(countdown).await;

        loop {
            if !self.open_round(epoch).await {
                return;
            }
            self.wait_for_round_close(epoch).await;
            match self.score_round(epoch).await {
                RoundDisposition::NextRound => continue,
                RoundDisposition::GameOver | RoundDisposition::Aborted => return,
            }
        }
    }

    /// Opens the next round and broadcasts its question. Returns false when
    /// the loop should stop: the session was reset underneath us, everyone
    /// left, or the question source ran dry.
    async fn open_round(&self, epoch: u64) -> bool {
        let mut session = self.session.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        match session.phase() {
            GamePhase::Countdown | GamePhase::Scoring => {}
            phase => {
                info!(?phase, "round loop stopping after external transition");
                return false;
            }
        }
        if session.active_player_count() == 0 {
            session.reset_with(ResetPolicy::ClearPlayers);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            return false;
        }

        let mut source = self.question_source.lock().await;
        let message = match session.begin_round(&mut **source) {
            Ok(round) => ServerMessage::PresentQuestion {
                round: round.number,
                word_to_guess: round.question.word_to_guess.clone(),
                definitions: round.question.definitions.clone(),
            },
            Err(error) => {
                error!(%error, "could not open the next round");
                session.reset();
                self.epoch.fetch_add(1, Ordering::SeqCst);
                return false;
            }
        };
        drop(source);

        self.connections.broadcast(message).await;
        true
    }

    /// Parks until the open round is ready to close: deadline elapsed or
    /// quorum reached, whichever fires first. Spurious wake-ups (a stale
    /// notify permit from a previous round) re-check and re-arm.
    async fn wait_for_round_close(&self, epoch: u64) {
        loop {
            let sleep_for = {
                let session = self.session.lock().await;
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                if session.phase() != GamePhase::Question {
                    return;
                }
                if session.quorum_reached() || session.deadline_elapsed() {
                    return;
                }
                session
                    .round()
                    .map(|round| round.deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or_default()
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.round_advanced.notified() => {}
            }
        }
    }

    /// Closes and scores the round, then announces the results: a
    /// personalized `PlayerResult` per player followed by the shared
    /// `RoundSummary`, and `Summary` if someone crossed the target.
    async fn score_round(&self, epoch: u64) -> RoundDisposition {
        let mut session = self.session.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return RoundDisposition::Aborted;
        }
        if session.phase() != GamePhase::Question {
            return RoundDisposition::Aborted;
        }

        let verdict = match session.close_round() {
            Ok(verdict) => verdict,
            Err(error) => {
                // The round closed through another path; nothing to announce
                warn!(%error, "round already closed");
                return RoundDisposition::Aborted;
            }
        };

        for outcome in &verdict.outcomes {
            self.connections
                .send_to_player(
                    outcome.player_index,
                    ServerMessage::PlayerResult {
                        correct: outcome.correct,
                        correct_answer: verdict.correct_answer,
                    },
                )
                .await;
        }

        self.connections
            .broadcast(ServerMessage::RoundSummary {
                player_states: verdict.standings,
            })
            .await;

        match verdict.winner {
            Some(winner) => {
                info!(winner = %winner.name, "game over");
                self.connections
                    .broadcast(ServerMessage::Summary {
                        winner: winner.name,
                        icon: winner.icon,
                    })
                    .await;
                RoundDisposition::GameOver
            }
            None => RoundDisposition::NextRound,
        }
    }
}

enum RoundDisposition {
    NextRound,
    GameOver,
    Aborted,
}
