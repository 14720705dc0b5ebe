//! Legal move generation and attack detection on the mailbox board.

use crate::game::{Color, GameState, Move, MoveKind, Piece, PieceKind, Square};

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Is `sq` attacked by any piece of color `by`?
pub fn is_square_attacked(state: &GameState, sq: Square, by: Color) -> bool {
    // An attacking pawn sits one rank behind the target from its own point of view.
    for df in [-1, 1] {
        if let Some(from) = sq.offset(df, -by.forward()) {
            if state.piece_at(from) == Some(Piece::new(PieceKind::Pawn, by)) {
                return true;
            }
        }
    }

    let attacked_by_step = |deltas: &[(i8, i8)], kind: PieceKind| {
        deltas.iter().any(|&(df, dr)| {
            sq.offset(df, dr)
                .and_then(|from| state.piece_at(from))
                .is_some_and(|p| p == Piece::new(kind, by))
        })
    };
    if attacked_by_step(&KNIGHT_DELTAS, PieceKind::Knight)
        || attacked_by_step(&KING_DELTAS, PieceKind::King)
    {
        return true;
    }

    let attacked_by_slider = |directions: &[(i8, i8)], kind: PieceKind| {
        directions.iter().any(|&(df, dr)| {
            let mut current = sq;
            while let Some(next) = current.offset(df, dr) {
                if let Some(piece) = state.piece_at(next) {
                    return piece.color == by
                        && (piece.kind == kind || piece.kind == PieceKind::Queen);
                }
                current = next;
            }
            false
        })
    };
    attacked_by_slider(&ROOK_DIRECTIONS, PieceKind::Rook)
        || attacked_by_slider(&BISHOP_DIRECTIONS, PieceKind::Bishop)
}

/// Moves that obey piece movement rules but may leave the mover's king in check.
/// Captures of a king are never produced.
pub fn pseudo_legal_moves(state: &GameState, out: &mut Vec<Move>) {
    let us = state.side_to_move();
    for (from, piece) in state.pieces() {
        if piece.color != us {
            continue;
        }
        match piece.kind {
            PieceKind::Pawn => pawn_moves(state, from, us, out),
            PieceKind::Knight => step_moves(state, from, us, &KNIGHT_DELTAS, out),
            PieceKind::Bishop => slide_moves(state, from, us, &BISHOP_DIRECTIONS, out),
            PieceKind::Rook => slide_moves(state, from, us, &ROOK_DIRECTIONS, out),
            PieceKind::Queen => {
                slide_moves(state, from, us, &ROOK_DIRECTIONS, out);
                slide_moves(state, from, us, &BISHOP_DIRECTIONS, out);
            }
            PieceKind::King => {
                step_moves(state, from, us, &KING_DELTAS, out);
                castle_moves(state, from, us, out);
            }
        }
    }
}

/// Can a piece of color `us` land on `to`? Empty squares and non-king enemies qualify.
fn can_land(state: &GameState, to: Square, us: Color) -> bool {
    match state.piece_at(to) {
        None => true,
        Some(piece) => piece.color != us && piece.kind != PieceKind::King,
    }
}

fn step_moves(state: &GameState, from: Square, us: Color, deltas: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(df, dr) in deltas {
        if let Some(to) = from.offset(df, dr) {
            if can_land(state, to, us) {
                out.push(Move::new(from, to));
            }
        }
    }
}

fn slide_moves(
    state: &GameState,
    from: Square,
    us: Color,
    directions: &[(i8, i8)],
    out: &mut Vec<Move>,
) {
    for &(df, dr) in directions {
        let mut current = from;
        while let Some(to) = current.offset(df, dr) {
            match state.piece_at(to) {
                None => out.push(Move::new(from, to)),
                Some(_) => {
                    if can_land(state, to, us) {
                        out.push(Move::new(from, to));
                    }
                    break;
                }
            }
            current = to;
        }
    }
}

fn push_pawn_move(from: Square, to: Square, out: &mut Vec<Move>) {
    if to.rank() == 0 || to.rank() == 7 {
        for kind in PieceKind::PROMOTIONS {
            out.push(Move::promote(from, to, kind));
        }
    } else {
        out.push(Move::new(from, to));
    }
}

fn pawn_moves(state: &GameState, from: Square, us: Color, out: &mut Vec<Move>) {
    let forward = us.forward();
    let start_rank = match us {
        Color::White => 1,
        Color::Black => 6,
    };

    if let Some(one) = from.offset(0, forward) {
        if state.piece_at(one).is_none() {
            push_pawn_move(from, one, out);
            if from.rank() == start_rank {
                if let Some(two) = one.offset(0, forward) {
                    if state.piece_at(two).is_none() {
                        out.push(Move::with_kind(from, two, MoveKind::DoublePush));
                    }
                }
            }
        }
    }

    // The en passant target only belongs to the side whose turn it really is.
    let ep_rank = match us {
        Color::White => 5,
        Color::Black => 2,
    };
    for df in [-1, 1] {
        let Some(to) = from.offset(df, forward) else {
            continue;
        };
        match state.piece_at(to) {
            Some(piece) if piece.color != us && piece.kind != PieceKind::King => {
                push_pawn_move(from, to, out);
            }
            None if state.en_passant() == Some(to) && to.rank() == ep_rank => {
                out.push(Move::with_kind(from, to, MoveKind::EnPassant));
            }
            _ => {}
        }
    }
}

fn castle_moves(state: &GameState, from: Square, us: Color, out: &mut Vec<Move>) {
    let rights = state.castling();
    let (home, kingside_path, queenside_path, kingside_to, queenside_to) = match us {
        Color::White => (
            Square::E1,
            [Square::F1, Square::G1],
            [Square::D1, Square::C1, Square::B1],
            Square::G1,
            Square::C1,
        ),
        Color::Black => (
            Square::E8,
            [Square::F8, Square::G8],
            [Square::D8, Square::C8, Square::B8],
            Square::G8,
            Square::C8,
        ),
    };
    if from != home || !rights.any(us) {
        return;
    }
    let them = us.opponent();
    if is_square_attacked(state, home, them) {
        return;
    }

    let empty = |squares: &[Square]| squares.iter().all(|&sq| state.piece_at(sq).is_none());
    let safe = |squares: &[Square]| squares.iter().all(|&sq| !is_square_attacked(state, sq, them));

    if rights.kingside(us) && empty(&kingside_path) && safe(&kingside_path) {
        out.push(Move::with_kind(home, kingside_to, MoveKind::Castle));
    }
    // b1/b8 must be empty but may be attacked.
    if rights.queenside(us) && empty(&queenside_path) && safe(&queenside_path[..2]) {
        out.push(Move::with_kind(home, queenside_to, MoveKind::Castle));
    }
}

impl GameState {
    /// Fill `out` with the legal moves of the side to move. Legality is checked by
    /// making each candidate in place and taking it back, so `self` is unchanged on return.
    pub fn generate_legal(&mut self, out: &mut Vec<Move>) {
        out.clear();
        pseudo_legal_moves(self, out);
        let us = self.side_to_move();
        out.retain(|&mv| {
            let undo = self.make_move(mv);
            let safe = !is_square_attacked(self, self.king_square(us), us.opponent());
            self.unmake_move(mv, undo);
            safe
        });
    }

    /// Legal moves of the side to move, for callers holding a shared reference.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut scratch = self.clone();
        let mut moves = Vec::with_capacity(48);
        scratch.generate_legal(&mut moves);
        moves
    }

    /// Is the side to move in check?
    pub fn is_check(&self) -> bool {
        let us = self.side_to_move();
        is_square_attacked(self, self.king_square(us), us.opponent())
    }
}

/// Count leaf nodes of the legal move tree to `depth`.
pub fn perft(state: &mut GameState, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut moves = Vec::with_capacity(48);
    state.generate_legal(&mut moves);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in moves {
        let undo = state.make_move(mv);
        nodes += perft(state, depth - 1);
        state.unmake_move(mv, undo);
    }
    nodes
}
