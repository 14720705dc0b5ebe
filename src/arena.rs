use crate::bot::Bot;
use crate::game::{Color, GameState, Move, Outcome};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct MatchConfig {
    pub time_per_move: Duration,
    /// Plies before the match is scored as a draw.
    pub max_moves: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            time_per_move: Duration::from_secs(5),
            max_moves: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Win {
        winner_name: String,
        color: Color,
        moves: usize,
    },
    Draw {
        moves: usize,
        reason: String,
    },
    Timeout {
        violator: String,
        winner: String,
    },
    IllegalMove {
        violator: String,
        winner: String,
    },
}

impl MatchResult {
    pub fn winner(&self) -> Option<&str> {
        match self {
            MatchResult::Win { winner_name, .. } => Some(winner_name),
            MatchResult::Timeout { winner, .. } => Some(winner),
            MatchResult::IllegalMove { winner, .. } => Some(winner),
            MatchResult::Draw { .. } => None,
        }
    }
}

/// Two bots playing one game from a given position.
pub struct Match {
    config: MatchConfig,
    state: GameState,
    white_bot: Box<dyn Bot>,
    black_bot: Box<dyn Bot>,
    moves: Vec<Move>,
}

impl Match {
    pub fn new(white_bot: Box<dyn Bot>, black_bot: Box<dyn Bot>, config: MatchConfig) -> Self {
        Self::from_position(white_bot, black_bot, config, GameState::new())
    }

    pub fn from_position(
        white_bot: Box<dyn Bot>,
        black_bot: Box<dyn Bot>,
        config: MatchConfig,
        state: GameState,
    ) -> Self {
        Match {
            config,
            state,
            white_bot,
            black_bot,
            moves: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Moves played so far.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn play(&mut self) -> MatchResult {
        self.white_bot.game_start(Color::White);
        self.black_bot.game_start(Color::Black);
        info!(
            white = self.white_bot.name(),
            black = self.black_bot.name(),
            fen = %self.state.to_fen(),
            "match starting"
        );

        while !self.state.is_game_over() && self.moves.len() < self.config.max_moves {
            if let Some(result) = self.play_move() {
                self.finish();
                return result;
            }
        }
        self.finish();

        let moves = self.moves.len();
        let result = match self.state.outcome() {
            Some(Outcome::Checkmate { winner }) => MatchResult::Win {
                winner_name: self.bot(winner).name().to_string(),
                color: winner,
                moves,
            },
            Some(Outcome::Stalemate) => MatchResult::Draw {
                moves,
                reason: "stalemate".to_string(),
            },
            Some(Outcome::InsufficientMaterial) => MatchResult::Draw {
                moves,
                reason: "insufficient material".to_string(),
            },
            Some(Outcome::SeventyFiveMoves) => MatchResult::Draw {
                moves,
                reason: "seventy-five move rule".to_string(),
            },
            None => MatchResult::Draw {
                moves,
                reason: format!("move limit ({}) reached", self.config.max_moves),
            },
        };
        info!(result = ?result, "match finished");
        result
    }

    fn finish(&mut self) {
        self.white_bot.game_end();
        self.black_bot.game_end();
    }

    fn bot(&self, color: Color) -> &dyn Bot {
        match color {
            Color::White => &*self.white_bot,
            Color::Black => &*self.black_bot,
        }
    }

    fn bot_mut(&mut self, color: Color) -> &mut Box<dyn Bot> {
        match color {
            Color::White => &mut self.white_bot,
            Color::Black => &mut self.black_bot,
        }
    }

    fn play_move(&mut self) -> Option<MatchResult> {
        let mover = self.state.side_to_move();
        let time_per_move = self.config.time_per_move;
        let state = self.state.clone();

        let start = Instant::now();
        let mv = self.bot_mut(mover).get_move(&state, time_per_move);
        let elapsed = start.elapsed();

        let violator = self.bot(mover).name().to_string();
        let winner = self.bot(mover.opponent()).name().to_string();

        if elapsed > time_per_move {
            warn!(bot = %violator, ?elapsed, limit = ?time_per_move, "timeout");
            return Some(MatchResult::Timeout { violator, winner });
        }

        let Some(mv) = mv else {
            warn!(bot = %violator, "returned no move");
            return Some(MatchResult::IllegalMove { violator, winner });
        };

        if let Err(e) = self.state.play(mv) {
            warn!(bot = %violator, error = %e, "illegal move");
            return Some(MatchResult::IllegalMove { violator, winner });
        }
        debug!(bot = %violator, mv = %mv, ?elapsed, "move played");

        self.moves.push(mv);
        self.white_bot.notify_move(mv);
        self.black_bot.notify_move(mv);
        None
    }
}
