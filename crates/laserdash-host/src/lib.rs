pub mod config;
pub mod game_loop;

pub use game_loop::{SessionBroadcast, SessionCommand, SessionConfig, spawn_race_session};
