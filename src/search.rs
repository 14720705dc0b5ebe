//! Negamax alpha-beta search with a transposition table and an iterative
//! deepening root driver.
//!
//! Scores are centipawns from the point of view of the side to move at the
//! node being searched. Mate scores are `MATE_SCORE - ply` and are converted to
//! a ply independent form before they enter the table.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::eval::evaluate;
use crate::game::{Color, GameState, Move, Outcome};
use crate::ordering::order_moves;
use crate::transposition::{Bound, TranspositionTable, TtStats};
use crate::zobrist::Zobrist;

pub const MATE_SCORE: i32 = 100_000;
pub const MAX_PLY: i32 = 128;
/// Scores at or beyond this magnitude are forced mates.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY;
pub const INFINITY: i32 = MATE_SCORE + 1;

pub const DEFAULT_DEPTH: u8 = 4;
pub const MAX_SEARCH_DEPTH: u8 = 10;

/// Make a mate score relative to the node it was found at before storing it.
pub fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply
    } else if score <= -MATE_THRESHOLD {
        score - ply
    } else {
        score
    }
}

/// Inverse of `score_to_tt` for the ply the entry is read back at.
pub fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply
    } else if score <= -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}

pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Moves until mate, positive when the scoring side mates and negative when it
/// gets mated. `None` for ordinary scores.
pub fn mate_in(score: i32) -> Option<i32> {
    if !is_mate_score(score) {
        return None;
    }
    let plies = MATE_SCORE - score.abs();
    let moves = (plies + 1) / 2;
    Some(if score > 0 { moves } else { -moves })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: u8,
    /// Stop deepening once this much time has been spent. Checked between depths.
    pub time: Option<Duration>,
}

impl SearchLimits {
    pub fn depth(depth: u8) -> Self {
        SearchLimits { depth, time: None }
    }

    pub fn timed(depth: u8, time: Duration) -> Self {
        SearchLimits {
            depth,
            time: Some(time),
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits::depth(DEFAULT_DEPTH)
    }
}

/// Result of one completed deepening step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Iteration {
    pub depth: u8,
    /// Side-to-move score.
    pub score: i32,
    /// Nodes visited by this depth alone.
    pub nodes: u64,
    #[serde(serialize_with = "serialize_moves")]
    pub pv: Vec<Move>,
    #[serde(serialize_with = "serialize_move")]
    pub best_move: Move,
}

fn serialize_moves<S: serde::Serializer>(moves: &[Move], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(moves.iter().map(Move::uci))
}

fn serialize_move<S: serde::Serializer>(mv: &Move, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&mv.uci())
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best_move: Move,
    /// Score for the side to move at the root.
    pub score: i32,
    /// Score from White's point of view.
    pub display_score: i32,
    /// Deepest completed depth.
    pub depth: u8,
    pub nodes: u64,
    pub cutoffs: u64,
    pub elapsed: Duration,
    pub nps: u64,
    pub pv: Vec<Move>,
    pub iterations: Vec<Iteration>,
    pub tt: TtStats,
}

impl SearchReport {
    /// Space separated coordinate moves.
    pub fn pv_string(&self) -> String {
        self.pv.iter().map(Move::uci).collect::<Vec<_>>().join(" ")
    }

    /// Mate distance from White's point of view.
    pub fn mate(&self) -> Option<i32> {
        mate_in(self.display_score)
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// The root position is already decided; nothing was searched.
    GameOver(Outcome),
    Found(SearchReport),
}

fn nodes_per_second(nodes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { (nodes as f64 / secs) as u64 } else { 0 }
}

/// Owns the transposition table across searches and shares the key table.
pub struct Engine {
    zobrist: Arc<Zobrist>,
    tt: TranspositionTable,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(Arc::new(Zobrist::default()), TranspositionTable::default())
    }
}

impl Engine {
    pub fn new(zobrist: Arc<Zobrist>, tt: TranspositionTable) -> Self {
        Engine { zobrist, tt }
    }

    pub fn with_hash_size(size_mb: usize, seed: u64) -> Self {
        Engine::new(Arc::new(Zobrist::new(seed)), TranspositionTable::new(size_mb))
    }

    pub fn zobrist(&self) -> &Arc<Zobrist> {
        &self.zobrist
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Forget everything learned by earlier searches.
    pub fn clear(&mut self) {
        self.tt.clear();
    }

    /// Iterative deepening from depth 1 to `limits.depth`. `state` is mutated
    /// during the search and restored before returning.
    pub fn search(&mut self, state: &mut GameState, limits: SearchLimits) -> SearchOutcome {
        let mut root_moves = Vec::with_capacity(48);
        state.generate_legal(&mut root_moves);
        let Some(&first) = root_moves.first() else {
            return SearchOutcome::GameOver(if state.is_check() {
                Outcome::Checkmate {
                    winner: state.side_to_move().opponent(),
                }
            } else {
                Outcome::Stalemate
            });
        };
        if state.is_insufficient_material() {
            return SearchOutcome::GameOver(Outcome::InsufficientMaterial);
        }
        if state.is_seventyfive_moves() {
            return SearchOutcome::GameOver(Outcome::SeventyFiveMoves);
        }

        self.tt.new_search();
        let start = Instant::now();
        let root_key = self.zobrist.hash(state);
        let target = limits.depth.max(1);

        let mut searcher = Searcher {
            zobrist: &self.zobrist,
            tt: &mut self.tt,
            nodes: 0,
            cutoffs: 0,
        };
        let mut iterations = Vec::with_capacity(target as usize);
        let mut last = searcher.iterate(state, &mut root_moves, 1, root_key, first);
        for depth in 2..=target {
            if limits.time.is_some_and(|budget| start.elapsed() >= budget) {
                debug!(completed = last.depth, "time budget spent");
                break;
            }
            let next = searcher.iterate(state, &mut root_moves, depth, root_key, first);
            iterations.push(std::mem::replace(&mut last, next));
        }
        iterations.push(last.clone());

        let (nodes, cutoffs) = (searcher.nodes, searcher.cutoffs);
        let elapsed = start.elapsed();
        let display_score = match state.side_to_move() {
            Color::White => last.score,
            Color::Black => -last.score,
        };
        let report = SearchReport {
            best_move: last.best_move,
            score: last.score,
            display_score,
            depth: last.depth,
            nodes,
            cutoffs,
            elapsed,
            nps: nodes_per_second(nodes, elapsed),
            pv: last.pv,
            iterations,
            tt: self.tt.stats(),
        };
        info!(
            best = %report.best_move,
            score = report.display_score,
            depth = report.depth,
            nodes = report.nodes,
            nps = report.nps,
            hashfull = report.tt.hashfull,
            "search finished"
        );
        SearchOutcome::Found(report)
    }
}

/// Per-search traversal state.
struct Searcher<'a> {
    zobrist: &'a Zobrist,
    tt: &'a mut TranspositionTable,
    nodes: u64,
    cutoffs: u64,
}

impl Searcher<'_> {
    /// One deepening step over the (non-empty) root move list.
    fn iterate(
        &mut self,
        state: &mut GameState,
        moves: &mut [Move],
        depth: u8,
        key: u64,
        fallback: Move,
    ) -> Iteration {
        let before = self.nodes;
        let (score, pv) = self.root(state, moves, depth, key);
        let iteration = Iteration {
            depth,
            score,
            nodes: self.nodes - before,
            best_move: pv.first().copied().unwrap_or(fallback),
            pv,
        };
        debug!(
            depth,
            score,
            nodes = iteration.nodes,
            best = %iteration.best_move,
            pv = %iteration.pv.iter().map(Move::uci).collect::<Vec<_>>().join(" "),
            "depth complete"
        );
        iteration
    }

    /// Full-window search of the root. Never answers from the table so every
    /// depth is actually searched; the stored move only seeds the ordering.
    fn root(&mut self, state: &mut GameState, moves: &mut [Move], depth: u8, key: u64) -> (i32, Vec<Move>) {
        self.nodes += 1;
        let suggested = self.tt.probe(key).and_then(|entry| entry.best_move);
        order_moves(state, moves, suggested);

        let mut alpha = -INFINITY;
        let mut best_pv = Vec::new();
        let mut child_pv = Vec::new();
        for &mv in moves.iter() {
            let undo = state.make_move(mv);
            let child_key = self.zobrist.update(key, state, mv, &undo);
            let score = -self.negamax(state, depth - 1, -INFINITY, -alpha, 1, child_key, &mut child_pv);
            state.unmake_move(mv, undo);

            if score > alpha {
                alpha = score;
                best_pv.clear();
                best_pv.push(mv);
                best_pv.extend_from_slice(&child_pv);
            }
        }

        self.tt.store(key, depth, score_to_tt(alpha, 0), Bound::Exact, best_pv.first().copied());
        (alpha, best_pv)
    }

    #[allow(clippy::too_many_arguments)]
    fn negamax(
        &mut self,
        state: &mut GameState,
        depth: u8,
        mut alpha: i32,
        beta: i32,
        ply: i32,
        key: u64,
        pv: &mut Vec<Move>,
    ) -> i32 {
        self.nodes += 1;
        pv.clear();

        let lookup = self.tt.lookup_score(key, depth, score_to_tt(alpha, ply), score_to_tt(beta, ply));
        if lookup.usable {
            if let Some(mv) = lookup.best_move {
                pv.push(mv);
            }
            return score_from_tt(lookup.score, ply);
        }

        let mut moves = Vec::with_capacity(48);
        state.generate_legal(&mut moves);
        if moves.is_empty() {
            return if state.is_check() { -MATE_SCORE + ply } else { 0 };
        }
        if state.is_insufficient_material() || state.is_seventyfive_moves() {
            return 0;
        }
        if depth == 0 || ply >= MAX_PLY {
            return state.side_to_move().sign() * evaluate(state);
        }

        order_moves(state, &mut moves, lookup.best_move);

        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;
        let mut child_pv = Vec::new();
        for mv in moves {
            let undo = state.make_move(mv);
            let child_key = self.zobrist.update(key, state, mv, &undo);
            let score = -self.negamax(state, depth - 1, -beta, -alpha, ply + 1, child_key, &mut child_pv);
            state.unmake_move(mv, undo);

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
                pv.clear();
                pv.push(mv);
                pv.extend_from_slice(&child_pv);
            }
            alpha = alpha.max(score);
            if alpha >= beta {
                self.cutoffs += 1;
                break;
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(key, depth, score_to_tt(best_score, ply), bound, best_move);
        best_score
    }
}
