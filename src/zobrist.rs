//! Zobrist hashing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game::{castle_rook_squares, CastlingRights, Color, GameState, Move, Piece, PieceKind, Square, Undo};

const PIECE_KINDS: usize = 6;
const COLORS: usize = 2;
const SQUARES: usize = 64;
const CASTLING_STATES: usize = 16;
/// Files a-h plus index 8 for "no en passant target".
const EN_PASSANT_STATES: usize = 9;
const NO_EN_PASSANT: usize = 8;

/// Immutable key table. Built once from a seed, then only read, so one instance
/// can be shared between searches (e.g. behind an `Arc`).
#[derive(Clone)]
pub struct Zobrist {
    pieces: [[[u64; SQUARES]; COLORS]; PIECE_KINDS],
    castling: [u64; CASTLING_STATES],
    en_passant: [u64; EN_PASSANT_STATES],
    side_to_move: u64,
}

impl Zobrist {
    pub const DEFAULT_SEED: u64 = 0xDEAD_BEEF;

    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut pieces = [[[0u64; SQUARES]; COLORS]; PIECE_KINDS];
        for by_color in pieces.iter_mut() {
            for by_square in by_color.iter_mut() {
                for key in by_square.iter_mut() {
                    *key = rng.random::<u64>();
                }
            }
        }

        let mut castling = [0u64; CASTLING_STATES];
        for key in castling.iter_mut() {
            *key = rng.random::<u64>();
        }

        let mut en_passant = [0u64; EN_PASSANT_STATES];
        for key in en_passant.iter_mut() {
            *key = rng.random::<u64>();
        }

        Self {
            pieces,
            castling,
            en_passant,
            side_to_move: rng.random::<u64>(),
        }
    }

    /// Full fingerprint computed from scratch.
    pub fn hash(&self, state: &GameState) -> u64 {
        let mut key = 0;
        for (sq, piece) in state.pieces() {
            key ^= self.piece_key(piece, sq);
        }
        key ^= self.castling[state.castling().bits() as usize];
        key ^= self.en_passant[en_passant_index(state.en_passant())];
        if state.side_to_move() == Color::Black {
            key ^= self.side_to_move;
        }
        key
    }

    #[inline]
    fn piece_key(&self, piece: Piece, sq: Square) -> u64 {
        self.pieces[piece.kind.index()][piece.color.index()][sq.index()]
    }

    #[inline]
    pub fn toggle_piece(&self, key: u64, piece: Piece, sq: Square) -> u64 {
        key ^ self.piece_key(piece, sq)
    }

    #[inline]
    pub fn toggle_castling_delta(&self, key: u64, old: CastlingRights, new: CastlingRights) -> u64 {
        key ^ self.castling[old.bits() as usize] ^ self.castling[new.bits() as usize]
    }

    #[inline]
    pub fn toggle_en_passant_delta(&self, key: u64, old: Option<Square>, new: Option<Square>) -> u64 {
        key ^ self.en_passant[en_passant_index(old)] ^ self.en_passant[en_passant_index(new)]
    }

    #[inline]
    pub fn toggle_side(&self, key: u64) -> u64 {
        key ^ self.side_to_move
    }

    /// Fingerprint of `after`, given the fingerprint `key` of the position before
    /// `mv` was made and the `undo` record returned by `make_move`.
    pub fn update(&self, key: u64, after: &GameState, mv: Move, undo: &Undo) -> u64 {
        let mover = after.side_to_move().opponent();
        let mut key = key;

        if let Some(landed) = after.piece_at(mv.to) {
            let origin = match mv.promotion {
                Some(_) => Piece::new(PieceKind::Pawn, mover),
                None => landed,
            };
            key = self.toggle_piece(key, origin, mv.from);
            key = self.toggle_piece(key, landed, mv.to);
        }

        if let Some(captured) = undo.captured {
            let at = if mv.is_en_passant() {
                mv.to.offset(0, -mover.forward()).unwrap_or(mv.to)
            } else {
                mv.to
            };
            key = self.toggle_piece(key, captured, at);
        }

        if mv.is_castle() {
            if let Some((rook_from, rook_to)) = castle_rook_squares(mv.to) {
                let rook = Piece::new(PieceKind::Rook, mover);
                key = self.toggle_piece(key, rook, rook_from);
                key = self.toggle_piece(key, rook, rook_to);
            }
        }

        key = self.toggle_castling_delta(key, undo.castling, after.castling());
        key = self.toggle_en_passant_delta(key, undo.en_passant, after.en_passant());
        self.toggle_side(key)
    }
}

impl Default for Zobrist {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

fn en_passant_index(square: Option<Square>) -> usize {
    square.map_or(NO_EN_PASSANT, |sq| sq.file() as usize)
}
