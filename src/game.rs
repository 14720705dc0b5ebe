use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Largest halfmove clock or fullmove number accepted from a FEN.
pub const MAX_FEN_COUNTER: u32 = 1_000_000;

/// Halfmoves without a capture or pawn move that end the game.
pub const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    /// +1 for White, -1 for Black. Converts White-relative scores to mover-relative ones.
    pub fn sign(&self) -> i32 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Direction pawns of this color advance in, in ranks.
    pub fn forward(&self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    pub fn index(&self) -> usize {
        match self {
            PieceKind::Pawn => 0,
            PieceKind::Knight => 1,
            PieceKind::Bishop => 2,
            PieceKind::Rook => 3,
            PieceKind::Queen => 4,
            PieceKind::King => 5,
        }
    }

    /// Lowercase letter used by FEN and coordinate notation.
    pub fn to_char(&self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_char(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Piece { kind, color }
    }

    /// FEN letter: uppercase for White, lowercase for Black.
    pub fn to_char(&self) -> char {
        let c = self.kind.to_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    pub fn from_char(c: char) -> Option<Piece> {
        let kind = PieceKind::from_char(c)?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Piece::new(kind, color))
    }
}

/// Board square, 0 = a1 through 63 = h8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);

    /// `file` and `rank` must both be below 8.
    pub const fn new(file: u8, rank: u8) -> Self {
        Square(rank * 8 + file)
    }

    pub const fn from_index(index: usize) -> Option<Square> {
        if index < 64 {
            Some(Square(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Square mirrored through the board centre (`63 - index`).
    pub const fn flip(self) -> Square {
        Square(63 - self.0)
    }

    pub fn offset(self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file() as i8 + df;
        let rank = self.rank() as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Square::new(file as u8, rank as u8))
        } else {
            None
        }
    }

    /// True for dark squares (a1 is dark).
    pub fn is_dark(self) -> bool {
        (self.file() + self.rank()) % 2 == 0
    }

    pub fn parse(s: &str) -> Option<Square> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        if file < 8 && rank < 8 {
            Some(Square::new(file, rank))
        } else {
            None
        }
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file()) as char,
            (b'1' + self.rank()) as char
        )
    }
}

/// Castling rights as a 4-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KINGSIDE: u8 = 1;
    pub const WHITE_QUEENSIDE: u8 = 2;
    pub const BLACK_KINGSIDE: u8 = 4;
    pub const BLACK_QUEENSIDE: u8 = 8;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(15);

    pub const fn from_bits(bits: u8) -> Self {
        CastlingRights(bits & 15)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn kingside(self, color: Color) -> bool {
        match color {
            Color::White => self.has(Self::WHITE_KINGSIDE),
            Color::Black => self.has(Self::BLACK_KINGSIDE),
        }
    }

    pub fn queenside(self, color: Color) -> bool {
        match color {
            Color::White => self.has(Self::WHITE_QUEENSIDE),
            Color::Black => self.has(Self::BLACK_QUEENSIDE),
        }
    }

    pub fn any(self, color: Color) -> bool {
        self.kingside(color) || self.queenside(color)
    }

    fn remove(&mut self, flags: u8) {
        self.0 &= !flags;
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        let flags = [
            (Self::WHITE_KINGSIDE, 'K'),
            (Self::WHITE_QUEENSIDE, 'Q'),
            (Self::BLACK_KINGSIDE, 'k'),
            (Self::BLACK_QUEENSIDE, 'q'),
        ];
        for (flag, c) in flags {
            if self.has(flag) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

/// Rights lost when a piece leaves or lands on `sq`.
fn rights_cleared_by(sq: Square) -> u8 {
    match sq {
        Square::A1 => CastlingRights::WHITE_QUEENSIDE,
        Square::E1 => CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE,
        Square::H1 => CastlingRights::WHITE_KINGSIDE,
        Square::A8 => CastlingRights::BLACK_QUEENSIDE,
        Square::E8 => CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE,
        Square::H8 => CastlingRights::BLACK_KINGSIDE,
        _ => 0,
    }
}

/// Rook origin and destination for a castling king move landing on `king_to`.
pub fn castle_rook_squares(king_to: Square) -> Option<(Square, Square)> {
    match king_to {
        Square::G1 => Some((Square::H1, Square::F1)),
        Square::C1 => Some((Square::A1, Square::D1)),
        Square::G8 => Some((Square::H8, Square::F8)),
        Square::C8 => Some((Square::A8, Square::D8)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    DoublePush,
    EnPassant,
    Castle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub kind: MoveKind,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            promotion: None,
            kind: MoveKind::Normal,
        }
    }

    pub fn with_kind(from: Square, to: Square, kind: MoveKind) -> Self {
        Move {
            from,
            to,
            promotion: None,
            kind,
        }
    }

    pub fn promote(from: Square, to: Square, piece: PieceKind) -> Self {
        Move {
            from,
            to,
            promotion: Some(piece),
            kind: MoveKind::Normal,
        }
    }

    pub fn is_castle(&self) -> bool {
        self.kind == MoveKind::Castle
    }

    pub fn is_en_passant(&self) -> bool {
        self.kind == MoveKind::EnPassant
    }

    /// Kind of the piece this move captures in `state`, if any.
    pub fn captured(&self, state: &GameState) -> Option<PieceKind> {
        if self.is_en_passant() {
            Some(PieceKind::Pawn)
        } else {
            state.piece_at(self.to).map(|p| p.kind)
        }
    }

    pub fn is_capture(&self, state: &GameState) -> bool {
        self.captured(state).is_some()
    }

    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(kind) => format!("{}{}{}", self.from, self.to, kind.to_char()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uci())
    }
}

/// Board fields overwritten by `make_move`, needed to take the move back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undo {
    pub captured: Option<Piece>,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("expected 4 to 6 space separated fields, found {0}")]
    FieldCount(usize),
    #[error("invalid piece placement: {0}")]
    Placement(String),
    #[error("invalid side to move '{0}'")]
    SideToMove(String),
    #[error("invalid castling field '{0}'")]
    Castling(String),
    #[error("invalid en passant field '{0}'")]
    EnPassant(String),
    #[error("invalid move counter '{0}'")]
    Counter(String),
    #[error("expected exactly one {color} king, found {count}")]
    KingCount { color: &'static str, count: usize },
    #[error("pawn on back rank at {0}")]
    PawnOnBackRank(Square),
    #[error("side not to move is in check")]
    OpponentInCheck,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Game already over")]
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoves,
}

impl Outcome {
    /// PGN style result string.
    pub fn result(&self) -> &'static str {
        match self {
            Outcome::Checkmate {
                winner: Color::White,
            } => "1-0",
            Outcome::Checkmate {
                winner: Color::Black,
            } => "0-1",
            Outcome::Stalemate | Outcome::InsufficientMaterial | Outcome::SeventyFiveMoves => {
                "1/2-1/2"
            }
        }
    }
}

fn parse_counter(text: &str) -> Result<u32, FenError> {
    match text.parse::<u32>() {
        Ok(n) if n <= MAX_FEN_COUNTER => Ok(n),
        _ => Err(FenError::Counter(text.to_string())),
    }
}

/// Chess position with in-place make/unmake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    board: [Option<Piece>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    king_squares: [Square; 2],
}

impl GameState {
    /// Standard starting position.
    pub fn new() -> Self {
        let mut state = GameState::empty();
        let back = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, &kind) in back.iter().enumerate() {
            let file = file as u8;
            state.put(Square::new(file, 0), Piece::new(kind, Color::White));
            state.put(Square::new(file, 1), Piece::new(PieceKind::Pawn, Color::White));
            state.put(Square::new(file, 6), Piece::new(PieceKind::Pawn, Color::Black));
            state.put(Square::new(file, 7), Piece::new(kind, Color::Black));
        }
        state.castling = CastlingRights::ALL;
        state
    }

    fn empty() -> Self {
        GameState {
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            king_squares: [Square::E1, Square::E8],
        }
    }

    fn put(&mut self, sq: Square, piece: Piece) {
        self.board[sq.index()] = Some(piece);
        if piece.kind == PieceKind::King {
            self.king_squares[piece.color.index()] = sq;
        }
    }

    /// Parse a position from Forsyth-Edwards Notation. The move counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if !(4..=6).contains(&fields.len()) {
            return Err(FenError::FieldCount(fields.len()));
        }

        let mut state = GameState::empty();
        let mut king_counts = [0usize; 2];

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Placement(format!(
                "expected 8 ranks, found {}",
                ranks.len()
            )));
        }
        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(FenError::Placement(format!("bad empty count '{}'", c)));
                    }
                    file += skip as u8;
                } else {
                    let piece = Piece::from_char(c)
                        .ok_or_else(|| FenError::Placement(format!("unknown piece '{}'", c)))?;
                    if file >= 8 {
                        return Err(FenError::Placement(format!(
                            "rank {} has more than 8 files",
                            rank + 1
                        )));
                    }
                    let sq = Square::new(file, rank);
                    if piece.kind == PieceKind::Pawn && (rank == 0 || rank == 7) {
                        return Err(FenError::PawnOnBackRank(sq));
                    }
                    if piece.kind == PieceKind::King {
                        king_counts[piece.color.index()] += 1;
                    }
                    state.put(sq, piece);
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::Placement(format!(
                        "rank {} has more than 8 files",
                        rank + 1
                    )));
                }
            }
            if file != 8 {
                return Err(FenError::Placement(format!(
                    "rank {} has {} files",
                    rank + 1,
                    file
                )));
            }
        }

        for color in [Color::White, Color::Black] {
            let count = king_counts[color.index()];
            if count != 1 {
                let color = if color == Color::White { "white" } else { "black" };
                return Err(FenError::KingCount { color, count });
            }
        }

        state.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        if fields[2] != "-" {
            let mut bits = 0u8;
            for c in fields[2].chars() {
                bits |= match c {
                    'K' => CastlingRights::WHITE_KINGSIDE,
                    'Q' => CastlingRights::WHITE_QUEENSIDE,
                    'k' => CastlingRights::BLACK_KINGSIDE,
                    'q' => CastlingRights::BLACK_QUEENSIDE,
                    _ => return Err(FenError::Castling(fields[2].to_string())),
                };
            }
            state.castling = CastlingRights::from_bits(bits);
            state.sanitize_castling();
        }

        if fields[3] != "-" {
            let sq = Square::parse(fields[3])
                .ok_or_else(|| FenError::EnPassant(fields[3].to_string()))?;
            let expected_rank = match state.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            if sq.rank() != expected_rank {
                return Err(FenError::EnPassant(fields[3].to_string()));
            }
            // Keep the target only when the double-pushed pawn is actually there.
            let mover = state.side_to_move.opponent();
            let pushed = sq.offset(0, mover.forward());
            if pushed.and_then(|s| state.piece_at(s)) == Some(Piece::new(PieceKind::Pawn, mover)) {
                state.en_passant = Some(sq);
            }
        }

        if let Some(text) = fields.get(4) {
            state.halfmove_clock = parse_counter(text)?;
        }
        if let Some(text) = fields.get(5) {
            state.fullmove_number = parse_counter(text)?.max(1);
        }

        let waiting = state.side_to_move.opponent();
        if crate::movegen::is_square_attacked(&state, state.king_square(waiting), state.side_to_move)
        {
            return Err(FenError::OpponentInCheck);
        }

        Ok(state)
    }

    /// Drop castling rights whose king or rook is not on its home square.
    fn sanitize_castling(&mut self) {
        let checks = [
            (CastlingRights::WHITE_KINGSIDE, Square::E1, Square::H1, Color::White),
            (CastlingRights::WHITE_QUEENSIDE, Square::E1, Square::A1, Color::White),
            (CastlingRights::BLACK_KINGSIDE, Square::E8, Square::H8, Color::Black),
            (CastlingRights::BLACK_QUEENSIDE, Square::E8, Square::A8, Color::Black),
        ];
        for (flag, king, rook, color) in checks {
            let king_home = self.piece_at(king) == Some(Piece::new(PieceKind::King, color));
            let rook_home = self.piece_at(rook) == Some(Piece::new(PieceKind::Rook, color));
            if !(king_home && rook_home) {
                self.castling.remove(flag);
            }
        }
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.piece_at(Square::new(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.to_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }
        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let ep = self
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} {} {} {} {}",
            placement, side, self.castling, ep, self.halfmove_clock, self.fullmove_number
        )
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq.index()]
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// Flip the side to move without touching any other field. The position may
    /// be one the rules would never produce; used for counting the idle side's moves.
    pub fn set_side_to_move(&mut self, color: Color) {
        self.side_to_move = color;
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.king_squares[color.index()]
    }

    /// Occupied squares with their pieces, a1 first.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    /// Apply a legal move in place and return what is needed to take it back.
    pub fn make_move(&mut self, mv: Move) -> Undo {
        let mover = self.side_to_move;
        let undo = Undo {
            captured: None,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
        };

        let moving = self.board[mv.from.index()].take();
        let captured = if mv.is_en_passant() {
            mv.to
                .offset(0, -mover.forward())
                .and_then(|sq| self.board[sq.index()].take())
        } else {
            self.board[mv.to.index()].take()
        };

        self.board[mv.to.index()] = match (moving, mv.promotion) {
            (Some(piece), Some(kind)) => Some(Piece::new(kind, piece.color)),
            (piece, None) => piece,
            (None, Some(_)) => None,
        };

        if mv.is_castle() {
            if let Some((rook_from, rook_to)) = castle_rook_squares(mv.to) {
                self.board[rook_to.index()] = self.board[rook_from.index()].take();
            }
        }

        let moved_kind = moving.map(|p| p.kind);
        if moved_kind == Some(PieceKind::King) {
            self.king_squares[mover.index()] = mv.to;
        }

        self.castling
            .remove(rights_cleared_by(mv.from) | rights_cleared_by(mv.to));
        self.en_passant = if mv.kind == MoveKind::DoublePush {
            mv.from.offset(0, mover.forward())
        } else {
            None
        };

        if moved_kind == Some(PieceKind::Pawn) || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if mover == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = mover.opponent();

        Undo { captured, ..undo }
    }

    /// Take back `mv`, which must be the last move made with `make_move`.
    pub fn unmake_move(&mut self, mv: Move, undo: Undo) {
        let mover = self.side_to_move.opponent();
        self.side_to_move = mover;
        if mover == Color::Black {
            self.fullmove_number -= 1;
        }

        let landed = self.board[mv.to.index()].take();
        self.board[mv.from.index()] = match (landed, mv.promotion) {
            (Some(piece), Some(_)) => Some(Piece::new(PieceKind::Pawn, piece.color)),
            (piece, _) => piece,
        };

        if mv.is_en_passant() {
            if let Some(sq) = mv.to.offset(0, -mover.forward()) {
                self.board[sq.index()] = undo.captured;
            }
        } else {
            self.board[mv.to.index()] = undo.captured;
        }

        if mv.is_castle() {
            if let Some((rook_from, rook_to)) = castle_rook_squares(mv.to) {
                self.board[rook_from.index()] = self.board[rook_to.index()].take();
            }
        }

        if landed.map(|p| p.kind) == Some(PieceKind::King) {
            self.king_squares[mover.index()] = mv.from;
        }

        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
    }

    /// Validate and apply a move.
    pub fn play(&mut self, mv: Move) -> Result<(), GameError> {
        if self.is_game_over() {
            return Err(GameError::GameOver);
        }
        if !self.legal_moves().contains(&mv) {
            return Err(GameError::IllegalMove(mv.uci()));
        }
        self.make_move(mv);
        Ok(())
    }

    /// Resolve coordinate notation (`e2e4`, `e7e8q`) against the legal moves.
    pub fn parse_move(&self, text: &str) -> Result<Move, GameError> {
        let text = text.trim().to_ascii_lowercase();
        self.legal_moves()
            .into_iter()
            .find(|mv| mv.uci() == text)
            .ok_or(GameError::IllegalMove(text))
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && self.legal_moves().is_empty()
    }

    /// Neither side can ever deliver mate.
    pub fn is_insufficient_material(&self) -> bool {
        let mut minors = Vec::with_capacity(2);
        for (sq, piece) in self.pieces() {
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
                PieceKind::Knight | PieceKind::Bishop => {
                    if minors.len() == 2 {
                        return false;
                    }
                    minors.push((sq, piece.kind));
                }
            }
        }
        match minors.as_slice() {
            [] | [_] => true,
            [(a, PieceKind::Bishop), (b, PieceKind::Bishop)] => a.is_dark() == b.is_dark(),
            _ => false,
        }
    }

    /// Checkmate on the last move still wins; `outcome` looks for mate first.
    pub fn is_seventyfive_moves(&self) -> bool {
        self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if self.legal_moves().is_empty() {
            if self.is_check() {
                return Some(Outcome::Checkmate {
                    winner: self.side_to_move.opponent(),
                });
            }
            return Some(Outcome::Stalemate);
        }
        if self.is_insufficient_material() {
            return Some(Outcome::InsufficientMaterial);
        }
        if self.is_seventyfive_moves() {
            return Some(Outcome::SeventyFiveMoves);
        }
        None
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// "1-0", "0-1", "1/2-1/2", or "*" while the game is running.
    pub fn result_string(&self) -> &'static str {
        self.outcome().map(|o| o.result()).unwrap_or("*")
    }

    /// Display the board as a string, rank 8 at the top.
    pub fn display_board(&self) -> String {
        let mut output = String::new();
        output.push_str("  a b c d e f g h\n");
        for rank in (0..8u8).rev() {
            output.push_str(&format!("{} ", rank + 1));
            for file in 0..8u8 {
                let c = self
                    .piece_at(Square::new(file, rank))
                    .map(|p| p.to_char())
                    .unwrap_or('.');
                output.push(c);
                output.push(' ');
            }
            output.push_str(&format!("{}\n", rank + 1));
        }
        output.push_str("  a b c d e f g h\n");
        output.push_str(&format!(
            "{} to move\n",
            match self.side_to_move {
                Color::White => "White",
                Color::Black => "Black",
            }
        ));
        output
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::IndexedRandom;
    use rand::SeedableRng;

    fn sq(s: &str) -> Square {
        Square::parse(s).unwrap()
    }

    fn play_uci(state: &mut GameState, text: &str) {
        let mv = state.parse_move(text).unwrap();
        state.play(mv).unwrap();
    }

    #[test]
    fn test_start_position_round_trips_through_fen() {
        let state = GameState::new();
        assert_eq!(state.to_fen(), START_FEN);
        assert_eq!(GameState::from_fen(START_FEN).unwrap(), state);
    }

    #[test]
    fn test_square_indexing() {
        assert_eq!(sq("a1").index(), 0);
        assert_eq!(sq("h8").index(), 63);
        assert_eq!(sq("e4").file(), 4);
        assert_eq!(sq("e4").rank(), 3);
        assert_eq!(sq("a1").flip(), sq("h8"));
        assert_eq!(sq("e2").to_string(), "e2");
        assert!(Square::parse("i1").is_none());
        assert!(Square::parse("a9").is_none());
        assert!(sq("a1").is_dark());
        assert!(!sq("h1").is_dark());
    }

    #[test]
    fn test_fen_optional_counters_default() {
        let state = GameState::from_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(state.halfmove_clock(), 0);
        assert_eq!(state.fullmove_number(), 1);
    }

    #[test]
    fn test_fen_rejects_malformed_input() {
        assert_eq!(
            GameState::from_fen("not a fen"),
            Err(FenError::FieldCount(3))
        );
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1"),
            Err(FenError::Placement(_))
        ));
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::Placement(_))
        ));
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/ppppXppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::Placement(_))
        ));
        assert_eq!(
            GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"),
            Err(FenError::SideToMove("x".to_string()))
        );
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1"),
            Err(FenError::Castling(_))
        ));
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e3 0 1"),
            Err(FenError::EnPassant(_))
        ));
        assert!(matches!(
            GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - x 1"),
            Err(FenError::Counter(_))
        ));
        assert_eq!(
            GameState::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::KingCount {
                color: "black",
                count: 0
            })
        );
        assert!(matches!(
            GameState::from_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::PawnOnBackRank(_))
        ));
        assert_eq!(
            GameState::from_fen("4k3/4Q3/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::OpponentInCheck)
        );
    }

    #[test]
    fn test_fen_drops_unbacked_castling_rights() {
        let state = GameState::from_fen("4k3/8/8/8/8/8/8/4K2R w KQkq - 0 1").unwrap();
        assert_eq!(state.castling().bits(), CastlingRights::WHITE_KINGSIDE);
    }

    #[test]
    fn test_double_push_sets_en_passant_target() {
        let mut state = GameState::new();
        play_uci(&mut state, "e2e4");
        assert_eq!(state.en_passant(), Some(sq("e3")));
        assert_eq!(
            state.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        play_uci(&mut state, "g8f6");
        assert_eq!(state.en_passant(), None);
        assert_eq!(state.fullmove_number(), 2);
        assert_eq!(state.halfmove_clock(), 1);
    }

    #[test]
    fn test_en_passant_capture_removes_pawn() {
        let mut state =
            GameState::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let before = state.clone();
        let mv = state.parse_move("e5d6").unwrap();
        assert!(mv.is_en_passant());
        let undo = state.make_move(mv);
        assert_eq!(state.piece_at(sq("d5")), None);
        assert_eq!(
            state.piece_at(sq("d6")),
            Some(Piece::new(PieceKind::Pawn, Color::White))
        );
        state.unmake_move(mv, undo);
        assert_eq!(state, before);
    }

    #[test]
    fn test_castling_moves_rook_and_clears_rights() {
        let mut state =
            GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let before = state.clone();
        let mv = state.parse_move("e1g1").unwrap();
        assert!(mv.is_castle());
        let undo = state.make_move(mv);
        assert_eq!(
            state.piece_at(sq("f1")),
            Some(Piece::new(PieceKind::Rook, Color::White))
        );
        assert_eq!(state.piece_at(sq("h1")), None);
        assert_eq!(state.king_square(Color::White), sq("g1"));
        assert!(!state.castling().any(Color::White));
        assert!(state.castling().any(Color::Black));
        state.unmake_move(mv, undo);
        assert_eq!(state, before);
    }

    #[test]
    fn test_rook_capture_clears_opponent_right() {
        let mut state =
            GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play_uci(&mut state, "a1a8");
        assert!(!state.castling().queenside(Color::Black));
        assert!(state.castling().kingside(Color::Black));
        assert!(!state.castling().queenside(Color::White));
    }

    #[test]
    fn test_promotion_and_unmake() {
        let mut state = GameState::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let before = state.clone();
        let mv = state.parse_move("a7b8n").unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Knight));
        assert_eq!(mv.captured(&state), Some(PieceKind::Knight));
        let undo = state.make_move(mv);
        assert_eq!(
            state.piece_at(sq("b8")),
            Some(Piece::new(PieceKind::Knight, Color::White))
        );
        state.unmake_move(mv, undo);
        assert_eq!(state, before);
    }

    #[test]
    fn test_make_unmake_restores_state_over_random_games() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut state = GameState::new();
            for _ in 0..80 {
                let moves = state.legal_moves();
                let Some(&mv) = moves.choose(&mut rng) else {
                    break;
                };
                for &probe in &moves {
                    let before = state.clone();
                    let undo = state.make_move(probe);
                    state.unmake_move(probe, undo);
                    assert_eq!(state, before, "make/unmake of {} changed state", probe);
                }
                state.make_move(mv);
            }
        }
    }

    #[test]
    fn test_play_rejects_illegal_move() {
        let mut state = GameState::new();
        let mv = Move::new(sq("e2"), sq("e5"));
        assert_eq!(
            state.play(mv),
            Err(GameError::IllegalMove("e2e5".to_string()))
        );
        assert!(state.parse_move("e1e2").is_err());
    }

    #[test]
    fn test_checkmate_detection() {
        // Fool's mate
        let state = GameState::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        assert!(state.is_check());
        assert!(state.is_checkmate());
        assert!(!state.is_stalemate());
        assert_eq!(
            state.outcome(),
            Some(Outcome::Checkmate {
                winner: Color::Black
            })
        );
        assert_eq!(state.result_string(), "0-1");
    }

    #[test]
    fn test_stalemate_detection() {
        let state = GameState::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(!state.is_check());
        assert!(state.is_stalemate());
        assert_eq!(state.outcome(), Some(Outcome::Stalemate));
        assert_eq!(state.result_string(), "1/2-1/2");
    }

    #[test]
    fn test_insufficient_material() {
        let cases = [
            ("4k3/8/8/8/8/8/8/4K3 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/4KN2 w - - 0 1", true),
            ("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            // bishops on c1 and f8 are both dark squares
            ("4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1", true),
            ("4k1b1/8/8/8/8/8/8/2B1K3 w - - 0 1", false),
            ("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1", false),
            ("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", false),
            ("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false),
        ];
        for (fen, expected) in cases {
            let state = GameState::from_fen(fen).unwrap();
            assert_eq!(state.is_insufficient_material(), expected, "{}", fen);
        }
        let bare = GameState::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(bare.outcome(), Some(Outcome::InsufficientMaterial));
        assert!(bare.is_game_over());
    }

    #[test]
    fn test_fen_counters_are_bounded() {
        let at_limit = format!("4k3/8/8/8/8/8/8/R3K3 w - - {0} {0}", MAX_FEN_COUNTER);
        let mut state = GameState::from_fen(&at_limit).unwrap();
        assert_eq!(state.fullmove_number(), MAX_FEN_COUNTER);
        for text in ["4294967295 1", "0 4294967295", "1000001 1"] {
            let fen = format!("4k3/8/8/8/8/8/8/R3K3 w - - {}", text);
            assert!(matches!(GameState::from_fen(&fen), Err(FenError::Counter(_))), "{}", fen);
        }

        let mv = state.parse_move("a1a2").unwrap();
        let undo = state.make_move(mv);
        assert_eq!(state.halfmove_clock(), MAX_FEN_COUNTER + 1);
        state.unmake_move(mv, undo);
        assert_eq!(state.halfmove_clock(), MAX_FEN_COUNTER);
    }

    #[test]
    fn test_seventy_five_move_rule() {
        let running = GameState::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 149 120").unwrap();
        assert!(!running.is_seventyfive_moves());
        assert_eq!(running.outcome(), None);

        let drawn = GameState::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 150 120").unwrap();
        assert_eq!(drawn.outcome(), Some(Outcome::SeventyFiveMoves));
        assert_eq!(drawn.result_string(), "1/2-1/2");

        // Mate still takes precedence over the clock.
        let mated = GameState::from_fen("R3k3/8/4K3/8/8/8/8/8 b - - 150 120").unwrap();
        assert!(matches!(mated.outcome(), Some(Outcome::Checkmate { .. })));
    }

    #[test]
    fn test_set_side_to_move_touches_only_turn() {
        let mut state = GameState::new();
        let before = state.clone();
        state.set_side_to_move(Color::Black);
        assert_eq!(state.side_to_move(), Color::Black);
        assert_eq!(state.castling(), before.castling());
        assert_eq!(state.fullmove_number(), before.fullmove_number());
        state.set_side_to_move(Color::White);
        assert_eq!(state, before);
    }

    #[test]
    fn test_display_board() {
        let display = GameState::new().display_board();
        assert!(display.contains("8 r n b q k b n r 8"));
        assert!(display.contains("White to move"));
    }
}
