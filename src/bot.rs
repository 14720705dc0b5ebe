use crate::game::{Color, GameState, Move};
use crate::search::{Engine, SearchLimits, SearchOutcome, MAX_SEARCH_DEPTH};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::time::Duration;
use tracing::debug;

/// Trait that all bots must implement
pub trait Bot: Send {
    /// Get the name of the bot
    fn name(&self) -> &str;

    /// Get the next move for the current game state.
    /// Returns `None` when the side to move has no legal move.
    fn get_move(&mut self, state: &GameState, time_limit: Duration) -> Option<Move>;

    /// Notified when the game starts
    fn game_start(&mut self, _color: Color) {}

    /// Notified when a move is made (by either player)
    fn notify_move(&mut self, _mv: Move) {}

    /// Notified when the game ends
    fn game_end(&mut self) {}
}

/// Picks a uniformly random legal move.
pub struct RandomBot {
    name: String,
    rng: StdRng,
}

impl RandomBot {
    pub fn new(name: String, seed: u64) -> Self {
        RandomBot {
            name,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Bot for RandomBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, state: &GameState, _time_limit: Duration) -> Option<Move> {
        state.legal_moves().choose(&mut self.rng).copied()
    }
}

/// Alpha-beta bot. Deepens until `max_depth` or until half the time limit is
/// gone; a started depth always runs to completion.
pub struct SearchBot {
    name: String,
    engine: Engine,
    max_depth: u8,
}

impl SearchBot {
    pub fn new(name: String, engine: Engine, max_depth: u8) -> Self {
        SearchBot {
            name,
            engine,
            max_depth: max_depth.clamp(1, MAX_SEARCH_DEPTH),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Bot for SearchBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, state: &GameState, time_limit: Duration) -> Option<Move> {
        let mut scratch = state.clone();
        let limits = SearchLimits::timed(self.max_depth, time_limit / 2);
        match self.engine.search(&mut scratch, limits) {
            SearchOutcome::Found(report) => {
                debug!(bot = %self.name, best = %report.best_move, depth = report.depth, "bot move");
                Some(report.best_move)
            }
            SearchOutcome::GameOver(_) => None,
        }
    }

    fn game_start(&mut self, _color: Color) {
        self.engine.clear();
    }
}
