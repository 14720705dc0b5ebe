//! Request level operations shared by the HTTP server and the CLI.
//!
//! Everything here takes a FEN string and returns either a serializable
//! response or an `EngineError`; nothing below this layer reports failure by
//! panicking across it.

use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

use crate::eval::evaluate;
use crate::game::{Color, FenError, GameState, Outcome};
use crate::search::{Engine, Iteration, SearchLimits, SearchOutcome, SearchReport};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid position: {0}")]
    InvalidPosition(#[from] FenError),
    #[error("internal engine error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveResponse {
    /// Position after the chosen move.
    pub fen: String,
    #[serde(rename = "move")]
    pub mv: String,
    /// Pawns, from White's point of view.
    pub evaluation: f64,
    /// Seconds, rounded to two decimals.
    pub search_time: f64,
    pub nodes: u64,
    pub nps: u64,
    pub depth: u8,
    pub pv: String,
    /// Moves to mate from White's point of view (negative: Black mates).
    pub mate: Option<i32>,
    pub iterations: Vec<Iteration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameOverResponse {
    pub fen: String,
    pub game_over: bool,
    pub result: &'static str,
    pub outcome: Outcome,
    pub evaluation: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MoveOutcome {
    Played(MoveResponse),
    GameOver(GameOverResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SideCastling {
    pub kingside: bool,
    pub queenside: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CastlingResponse {
    pub white: SideCastling,
    pub black: SideCastling,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub fen: String,
    /// Static evaluation in pawns, from White's point of view.
    pub evaluation: f64,
    pub turn: Color,
    pub legal_moves: usize,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub castling: CastlingResponse,
}

fn pawns(centipawns: i32) -> f64 {
    centipawns as f64 / 100.0
}

fn round_seconds(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Search `fen` to `depth` and play the best move.
pub fn best_move(engine: &mut Engine, fen: &str, depth: u8) -> Result<MoveOutcome, EngineError> {
    best_move_with_limits(engine, fen, SearchLimits::depth(depth))
}

pub fn best_move_with_limits(
    engine: &mut Engine,
    fen: &str,
    limits: SearchLimits,
) -> Result<MoveOutcome, EngineError> {
    let mut state = GameState::from_fen(fen)?;
    let outcome = contained(fen, || engine.search(&mut state, limits))?;

    match outcome {
        SearchOutcome::GameOver(outcome) => Ok(MoveOutcome::GameOver(game_over(&mut state, outcome))),
        SearchOutcome::Found(report) => Ok(MoveOutcome::Played(played(state, report))),
    }
}

fn game_over(state: &mut GameState, outcome: Outcome) -> GameOverResponse {
    GameOverResponse {
        fen: state.to_fen(),
        game_over: true,
        result: outcome.result(),
        outcome,
        evaluation: pawns(evaluate(state)),
    }
}

fn played(mut state: GameState, report: SearchReport) -> MoveResponse {
    state.make_move(report.best_move);
    MoveResponse {
        fen: state.to_fen(),
        mv: report.best_move.uci(),
        evaluation: pawns(report.display_score),
        search_time: round_seconds(report.elapsed.as_secs_f64()),
        nodes: report.nodes,
        nps: report.nps,
        depth: report.depth,
        pv: report.pv_string(),
        mate: report.mate(),
        iterations: report.iterations,
    }
}

/// Run `f`, turning a panic into `EngineError::Internal`.
fn contained<T>(fen: &str, f: impl FnOnce() -> T) -> Result<T, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(%fen, %message, "request aborted");
        EngineError::Internal(message)
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "search panicked".to_string()
    }
}

/// Static facts about `fen` without searching.
pub fn analyze(fen: &str) -> Result<AnalysisResponse, EngineError> {
    let state = GameState::from_fen(fen)?;
    contained(fen, || describe(state))
}

fn describe(mut state: GameState) -> AnalysisResponse {
    let rights = state.castling();
    let legal_moves = state.legal_moves().len();
    let is_check = state.is_check();

    AnalysisResponse {
        fen: state.to_fen(),
        evaluation: pawns(evaluate(&mut state)),
        turn: state.side_to_move(),
        legal_moves,
        is_check,
        is_checkmate: is_check && legal_moves == 0,
        is_stalemate: !is_check && legal_moves == 0,
        castling: CastlingResponse {
            white: SideCastling {
                kingside: rights.kingside(Color::White),
                queenside: rights.queenside(Color::White),
            },
            black: SideCastling {
                kingside: rights.kingside(Color::Black),
                queenside: rights.queenside(Color::Black),
            },
        },
    }
}
