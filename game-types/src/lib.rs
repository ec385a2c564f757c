pub mod game;
pub mod messages;
pub mod player;

// Re-export all types
pub use game::*;
pub use messages::*;
pub use player::*;
