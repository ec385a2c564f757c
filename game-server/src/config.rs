use std::env;
use std::time::Duration;

use game_core::{ResetPolicy, SessionConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub words_file: String,
    pub target_score: u32,
    pub max_track_position: u32,
    pub correct_award: u32,
    pub countdown_seconds: u64,
    pub round_seconds: u64,
    pub clear_players_on_reset: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()),
            words_file: env::var("WORDS_FILE").unwrap_or_else(|_| "./words.cache".to_string()),
            target_score: env::var("TARGET_SCORE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .expect("Invalid TARGET_SCORE"),
            max_track_position: env::var("MAX_TRACK_POSITION")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("Invalid MAX_TRACK_POSITION"),
            correct_award: env::var("CORRECT_AWARD")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("Invalid CORRECT_AWARD"),
            countdown_seconds: env::var("COUNTDOWN_SECONDS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .expect("Invalid COUNTDOWN_SECONDS"),
            round_seconds: env::var("ROUND_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("Invalid ROUND_SECONDS"),
            clear_players_on_reset: env::var("CLEAR_PLAYERS_ON_RESET")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .expect("Invalid CLEAR_PLAYERS_ON_RESET"),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            target_score: self.target_score,
            max_track_position: self.max_track_position,
            correct_award: self.correct_award,
            countdown: Duration::from_secs(self.countdown_seconds),
            round_duration: Duration::from_secs(self.round_seconds),
            reset_policy: if self.clear_players_on_reset {
                ResetPolicy::ClearPlayers
            } else {
                ResetPolicy::RetainPlayers
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
