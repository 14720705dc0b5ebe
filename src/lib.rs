pub mod api;
pub mod arena;
pub mod bot;
pub mod config;
pub mod eval;
pub mod game;
pub mod movegen;
pub mod ordering;
pub mod search;
pub mod transposition;
pub mod web;
pub mod zobrist;

pub use arena::*;
pub use bot::*;
pub use config::*;
pub use game::*;
pub use movegen::*;
pub use search::*;
pub use transposition::{Bound, TranspositionTable, TtStats};
pub use zobrist::Zobrist;
