//! Static evaluation from White's point of view.
//!
//! Score = material + piece-square tables + mobility + king placement. Tables are
//! laid out a1..h8 (rank 1 first) and read at `square` for White and at
//! `63 - square` for Black.

use crate::game::{Color, GameState, PieceKind, Square};
use crate::search::MATE_SCORE;

pub const PAWN_VALUE: i32 = 100;
pub const KNIGHT_VALUE: i32 = 320;
pub const BISHOP_VALUE: i32 = 330;
pub const ROOK_VALUE: i32 = 500;
pub const QUEEN_VALUE: i32 = 900;
pub const KING_VALUE: i32 = 20_000;

const MOBILITY_WEIGHT: i32 = 2;
const CASTLED_KING_BONUS: i32 = 30;
const STUCK_KING_PENALTY: i32 = 20;
const ENDGAME_PIECE_COUNT: usize = 10;

#[rustfmt::skip]
const PAWN_TABLE: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10,-20,-20, 10, 10,  5,
     5, -5,-10,  0,  0,-10, -5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5,  5, 10, 25, 25, 10,  5,  5,
    10, 10, 20, 30, 30, 20, 10, 10,
    50, 50, 50, 50, 50, 50, 50, 50,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_TABLE: [i32; 64] = [
    -50,-40,-30,-30,-30,-30,-40,-50,
    -40,-20,  0,  5,  5,  0,-20,-40,
    -30,  5, 10, 15, 15, 10,  5,-30,
    -30,  0, 15, 20, 20, 15,  0,-30,
    -30,  5, 15, 20, 20, 15,  5,-30,
    -30,  0, 10, 15, 15, 10,  0,-30,
    -40,-20,  0,  0,  0,  0,-20,-40,
    -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const BISHOP_TABLE: [i32; 64] = [
    -20,-10,-10,-10,-10,-10,-10,-20,
    -10,  5,  0,  0,  0,  0,  5,-10,
    -10, 10, 10, 10, 10, 10, 10,-10,
    -10,  0, 10, 10, 10, 10,  0,-10,
    -10,  5,  5, 10, 10,  5,  5,-10,
    -10,  0,  5, 10, 10,  5,  0,-10,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const ROOK_TABLE: [i32; 64] = [
     0,  0,  0,  5,  5,  0,  0,  0,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     5, 10, 10, 10, 10, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_TABLE: [i32; 64] = [
    -20,-10,-10, -5, -5,-10,-10,-20,
    -10,  0,  5,  0,  0,  0,  0,-10,
    -10,  5,  5,  5,  5,  5,  0,-10,
      0,  0,  5,  5,  5,  5,  0, -5,
     -5,  0,  5,  5,  5,  5,  0, -5,
    -10,  0,  5,  5,  5,  5,  0,-10,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -20,-10,-10, -5, -5,-10,-10,-20,
];

/// Middlegame: stay behind the pawns, ideally on a castled square.
#[rustfmt::skip]
const KING_MIDDLEGAME_TABLE: [i32; 64] = [
     20, 30, 10,  0,  0, 10, 30, 20,
     20, 20,  0,  0,  0,  0, 20, 20,
    -10,-20,-20,-20,-20,-20,-20,-10,
    -20,-30,-30,-40,-40,-30,-30,-20,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
];

/// Endgame: walk to the centre.
#[rustfmt::skip]
const KING_ENDGAME_TABLE: [i32; 64] = [
    -50,-30,-30,-30,-30,-30,-30,-50,
    -30,-30,  0,  0,  0,  0,-30,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-20,-10,  0,  0,-10,-20,-30,
    -50,-40,-30,-20,-20,-30,-40,-50,
];

pub fn material_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => PAWN_VALUE,
        PieceKind::Knight => KNIGHT_VALUE,
        PieceKind::Bishop => BISHOP_VALUE,
        PieceKind::Rook => ROOK_VALUE,
        PieceKind::Queen => QUEEN_VALUE,
        PieceKind::King => KING_VALUE,
    }
}

/// Few pieces left, or both queens gone.
pub fn is_endgame(state: &GameState) -> bool {
    let mut pieces = 0;
    let mut queens = 0;
    for (_, piece) in state.pieces() {
        pieces += 1;
        if piece.kind == PieceKind::Queen {
            queens += 1;
        }
    }
    pieces <= ENDGAME_PIECE_COUNT || queens == 0
}

pub fn piece_square_value(kind: PieceKind, color: Color, sq: Square, endgame: bool) -> i32 {
    let table = match kind {
        PieceKind::Pawn => &PAWN_TABLE,
        PieceKind::Knight => &KNIGHT_TABLE,
        PieceKind::Bishop => &BISHOP_TABLE,
        PieceKind::Rook => &ROOK_TABLE,
        PieceKind::Queen => &QUEEN_TABLE,
        PieceKind::King if endgame => &KING_ENDGAME_TABLE,
        PieceKind::King => &KING_MIDDLEGAME_TABLE,
    };
    let index = match color {
        Color::White => sq.index(),
        Color::Black => sq.flip().index(),
    };
    table[index]
}

/// Material plus placement, summed over every occupied square.
pub fn material_and_placement(state: &GameState) -> i32 {
    let endgame = is_endgame(state);
    state
        .pieces()
        .map(|(sq, piece)| {
            let value = material_value(piece.kind)
                + piece_square_value(piece.kind, piece.color, sq, endgame);
            value * piece.color.sign()
        })
        .sum()
}

/// (White legal moves - Black legal moves) * 2. Counts the idle side by flipping
/// the turn and flips it back before returning.
pub fn mobility(state: &mut GameState) -> i32 {
    let original = state.side_to_move();
    let mut moves = Vec::with_capacity(64);

    state.set_side_to_move(Color::White);
    state.generate_legal(&mut moves);
    let white = moves.len() as i32;

    state.set_side_to_move(Color::Black);
    state.generate_legal(&mut moves);
    let black = moves.len() as i32;

    state.set_side_to_move(original);
    (white - black) * MOBILITY_WEIGHT
}

/// Bonus for a king on g1/c1 (g8/c8), penalty for a central back-rank king
/// whose side has no castling rights left.
pub fn king_safety(state: &GameState) -> i32 {
    let mut score = 0;
    let rights = state.castling();

    let white = state.king_square(Color::White);
    if white == Square::G1 || white == Square::C1 {
        score += CASTLED_KING_BONUS;
    }
    if [Square::D1, Square::E1, Square::F1].contains(&white) && !rights.any(Color::White) {
        score -= STUCK_KING_PENALTY;
    }

    let black = state.king_square(Color::Black);
    if black == Square::G8 || black == Square::C8 {
        score -= CASTLED_KING_BONUS;
    }
    if [Square::D8, Square::E8, Square::F8].contains(&black) && !rights.any(Color::Black) {
        score += STUCK_KING_PENALTY;
    }

    score
}

/// Evaluate `state` from White's perspective. Checkmate scores `±MATE_SCORE`,
/// stalemate and dead positions score 0. `state` is unchanged on return.
pub fn evaluate(state: &mut GameState) -> i32 {
    let mut moves = Vec::with_capacity(64);
    state.generate_legal(&mut moves);
    if moves.is_empty() {
        if state.is_check() {
            return -MATE_SCORE * state.side_to_move().sign();
        }
        return 0;
    }
    if state.is_insufficient_material() {
        return 0;
    }

    material_and_placement(state) + mobility(state) + king_safety(state)
}
