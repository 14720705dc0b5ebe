//! Move ordering for alpha-beta.

use std::cmp::Reverse;

use crate::eval::material_value;
use crate::game::{GameState, Move};

const SUGGESTED_PRIORITY: i32 = i32::MAX;
const PROMOTION_BASE: i32 = 1_000_000;
const CAPTURE_BASE: i32 = 100_000;

/// Most valuable victim, least valuable attacker.
fn capture_score(state: &GameState, mv: Move) -> Option<i32> {
    let victim = mv.captured(state)?;
    let attacker = state.piece_at(mv.from).map_or(0, |p| material_value(p.kind));
    Some(material_value(victim) * 100 - attacker)
}

/// Ranking key for `mv`; higher is searched earlier. Quiet moves score 0.
pub fn move_priority(state: &GameState, mv: Move, suggested: Option<Move>) -> i32 {
    if suggested == Some(mv) {
        return SUGGESTED_PRIORITY;
    }
    let capture = capture_score(state, mv);
    match (mv.promotion, capture) {
        (Some(kind), capture) => PROMOTION_BASE + material_value(kind) + capture.unwrap_or(0),
        (None, Some(score)) => CAPTURE_BASE + score,
        (None, None) => 0,
    }
}

/// Sort `moves` best-first in place. Equal priorities keep their generation order.
pub fn order_moves(state: &GameState, moves: &mut [Move], suggested: Option<Move>) {
    moves.sort_by_cached_key(|&mv| Reverse(move_priority(state, mv, suggested)));
}
