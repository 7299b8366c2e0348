//! The match room: two seats, one game, one relay loop.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;

use relayrook_protocol::Message;
use relayrook_session::Session;

use crate::{RoomError, RoomRegistry};

/// Starting position used when the first joiner does not name one.
pub const DEFAULT_START_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// How long a player gets to acknowledge a notification before the room
/// treats them as gone.
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Which seat a player occupies. White always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    pub fn is_white(self) -> bool {
        matches!(self, Self::White)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// What a joining client asked for in its preference exchange.
///
/// Only the first player to enter an empty room gets a say: their clock
/// budget and starting position become the room's settings.
#[derive(Debug, Clone)]
pub struct JoinPrefs {
    /// Per-player clock budget in milliseconds. Zero or negative means
    /// play without a clock.
    pub preferred_clock_millis: i64,
    /// Starting position in FEN. Empty means the standard position.
    pub start_fen: String,
}

/// The result of a successful join.
#[derive(Debug, Clone, Copy)]
pub struct JoinOutcome {
    /// The seat the player ended up in.
    pub color: Color,
    /// `true` when both seats are now filled and the caller should kick
    /// off the game.
    pub ready_to_start: bool,
}

// =========================================================================
// Seats
// =========================================================================

/// The room's two seats and the eviction machinery that keeps them
/// consistent.
#[derive(Default)]
struct Seats {
    white: Option<Session>,
    black: Option<Session>,
}

impl Seats {
    fn seat_mut(&mut self, color: Color) -> &mut Option<Session> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    fn seat(&self, color: Color) -> Option<&Session> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    fn occupied(&self, color: Color) -> bool {
        self.seat(color).is_some()
    }

    fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    fn is_live(&mut self, color: Color) -> bool {
        match self.seat_mut(color).as_mut() {
            Some(session) => session.is_live(),
            None => false,
        }
    }

    /// Removes a seated player, notifies the opposing seat, and — if the
    /// opponent turns out to be broken too — removes them as well.
    ///
    /// The cascade is a work list rather than recursion: each eviction
    /// may enqueue at most the opposing seat, and an emptied seat stops
    /// the chain, so the loop runs at most twice per call.
    async fn evict(&mut self, seat: Color, notify: bool, reason: &str) {
        let mut work = VecDeque::new();
        work.push_back((seat, notify, reason.to_string()));

        while let Some((color, notify, reason)) = work.pop_front() {
            let Some(mut session) = self.seat_mut(color).take() else {
                continue;
            };
            tracing::info!(
                session_id = %session.session_id(),
                user = %session.user_name(),
                %color,
                "player evicted"
            );
            if notify {
                close_with(&mut session, &reason).await;
            } else {
                session.shutdown().await;
            }

            let peer = color.other();
            let Some(peer_session) = self.seat_mut(peer).as_mut() else {
                continue;
            };
            if !peer_session.is_live() {
                work.push_back((peer, false, String::new()));
                continue;
            }
            // A live opponent is told about the departure and must
            // acknowledge it; anything else marks them as broken.
            let verdict = match peer_session.send(&Message::PlayerLeft).await {
                Err(_) => Some("Connection lost"),
                Ok(()) => match timeout(ACK_TIMEOUT, peer_session.next_message()).await {
                    Ok(Some(Message::Ack)) => None,
                    Ok(Some(_)) => Some("Unknown packet. Expected Ack"),
                    Ok(None) => Some("Connection lost"),
                    Err(_) => Some("Unresponsive client"),
                },
            };
            if let Some(why) = verdict {
                work.push_back((peer, true, why.to_string()));
            }
        }
    }
}

/// Sends a closing reason, then closes. Errors are moot at this point.
async fn close_with(session: &mut Session, reason: &str) {
    let _ = session
        .send(&Message::Shutdown {
            reason: reason.to_string(),
        })
        .await;
    session.shutdown().await;
}

/// Refusal before seating: the client is told it was turned away and why.
async fn reject_and_close(session: &mut Session, reason: &str) {
    let _ = session.send(&Message::Reject).await;
    close_with(session, reason).await;
}

// =========================================================================
// Room
// =========================================================================

struct MatchRoom {
    /// Per-player clock budget in milliseconds; negative until the first
    /// joiner's preferences land.
    move_time_millis: i64,
    start_fen: Option<String>,
    in_game: bool,
    seats: Seats,
}

impl MatchRoom {
    fn new() -> Self {
        Self {
            move_time_millis: -1,
            start_fen: None,
            in_game: false,
            seats: Seats::default(),
        }
    }
}

/// Shared handle to one match room.
///
/// Cheap to clone; every connection handler that routed a player here
/// holds one, and the registry holds one more.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: String,
    state: Arc<Mutex<MatchRoom>>,
    registry: RoomRegistry,
}

impl RoomHandle {
    pub(crate) fn new(room_id: String, registry: RoomRegistry) -> Self {
        Self {
            room_id,
            state: Arc::new(Mutex::new(MatchRoom::new())),
            registry,
        }
    }

    /// The id the clients asked for, verbatim.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Whether two handles refer to the same underlying room.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Number of currently seated players.
    pub async fn occupancy(&self) -> usize {
        let room = self.state.lock().await;
        usize::from(room.seats.occupied(Color::White))
            + usize::from(room.seats.occupied(Color::Black))
    }

    /// Seats a player, introducing them to anyone already seated.
    ///
    /// On any `Err` the session has already been notified and closed.
    /// The first player into an empty room fixes the room's clock budget
    /// and starting position from `prefs`; later joiners' preferences
    /// are ignored.
    pub async fn try_add_player(
        &self,
        mut session: Session,
        prefs: JoinPrefs,
    ) -> Result<JoinOutcome, RoomError> {
        let mut room = self.state.lock().await;

        if room.in_game {
            tracing::info!(
                room_id = %self.room_id,
                user = %session.user_name(),
                "join refused, game in progress"
            );
            reject_and_close(&mut session, "Game already in progress").await;
            return Err(RoomError::GameInProgress(self.room_id.clone()));
        }

        // A seat whose connection has died does not block a newcomer.
        if room.seats.occupied(Color::White) && room.seats.occupied(Color::Black) {
            let stale = [Color::White, Color::Black]
                .into_iter()
                .find(|&c| !room.seats.is_live(c));
            match stale {
                Some(color) => room.seats.evict(color, false, "").await,
                None => {
                    tracing::info!(
                        room_id = %self.room_id,
                        user = %session.user_name(),
                        "join refused, room full"
                    );
                    reject_and_close(&mut session, "Room is full").await;
                    return Err(RoomError::RoomFull(self.room_id.clone()));
                }
            }
        }

        if room.seats.is_empty() {
            if room.move_time_millis < 0 {
                room.move_time_millis = prefs.preferred_clock_millis;
            }
            if room.start_fen.is_none() {
                room.start_fen = Some(if prefs.start_fen.is_empty() {
                    DEFAULT_START_FEN.to_string()
                } else {
                    prefs.start_fen.clone()
                });
            }
        }

        let color = if !room.seats.occupied(Color::White) {
            Color::White
        } else {
            Color::Black
        };
        let peer = color.other();
        let joiner_name = session.user_name().to_string();
        *room.seats.seat_mut(color) = Some(session);

        let Some(peer_name) = room.seats.seat(peer).map(|s| s.user_name().to_string()) else {
            tracing::info!(
                room_id = %self.room_id,
                user = %joiner_name,
                %color,
                "first player seated"
            );
            return Ok(JoinOutcome {
                color,
                ready_to_start: false,
            });
        };

        // Introduce the newcomer to the seated player, who may veto.
        let peer_reply = match room.seats.seat_mut(peer).as_mut() {
            None => None,
            Some(peer_session) => {
                let intro = Message::PlayerJoined {
                    user_name: joiner_name.clone(),
                };
                match peer_session.send(&intro).await {
                    Err(_) => None,
                    Ok(()) => timeout(ACK_TIMEOUT, peer_session.next_message())
                        .await
                        .ok()
                        .flatten(),
                }
            }
        };
        match peer_reply {
            Some(Message::Ack) => {}
            Some(Message::Reject) => {
                tracing::info!(
                    room_id = %self.room_id,
                    user = %joiner_name,
                    "seated player rejected the newcomer"
                );
                if let Some(mut joiner) = room.seats.seat_mut(color).take() {
                    reject_and_close(&mut joiner, "Rejected by opponent").await;
                }
                return Err(RoomError::JoinRejected(self.room_id.clone()));
            }
            other => {
                // The seated player is broken; the newcomer keeps the room.
                let why = match other {
                    Some(_) => "Unknown packet. Expected Ack",
                    None => "Connection lost",
                };
                if let Some(mut old) = room.seats.seat_mut(peer).take() {
                    close_with(&mut old, why).await;
                }
                tracing::info!(
                    room_id = %self.room_id,
                    user = %joiner_name,
                    %color,
                    "stale seat replaced by new joiner"
                );
                return Ok(JoinOutcome {
                    color,
                    ready_to_start: false,
                });
            }
        }

        // And the seated player to the newcomer, who must acknowledge.
        let joiner_reply = match room.seats.seat_mut(color).as_mut() {
            None => None,
            Some(joiner) => {
                let intro = Message::PlayerJoined {
                    user_name: peer_name,
                };
                match joiner.send(&intro).await {
                    Err(_) => None,
                    Ok(()) => timeout(ACK_TIMEOUT, joiner.next_message())
                        .await
                        .ok()
                        .flatten(),
                }
            }
        };
        match joiner_reply {
            Some(Message::Ack) => {
                tracing::info!(
                    room_id = %self.room_id,
                    user = %joiner_name,
                    %color,
                    "second player seated, room full"
                );
                Ok(JoinOutcome {
                    color,
                    ready_to_start: true,
                })
            }
            _ => {
                // The peer was told someone joined; walk that back.
                room.seats.evict(color, true, "Unresponsive client").await;
                self.reap(&mut room).await;
                Err(RoomError::JoinFailed(self.room_id.clone()))
            }
        }
    }

    /// Runs one full game if both seats hold live players.
    ///
    /// Resolves to nothing: every outcome (finish, timeout, disconnect)
    /// is delivered to the players over their own connections, and the
    /// room tears itself down afterwards.
    pub async fn try_start_new_game(&self) {
        let (mut seats, budget_millis, start_fen) = {
            let mut room = self.state.lock().await;
            if room.in_game {
                return;
            }
            if !room.seats.is_live(Color::White) || !room.seats.is_live(Color::Black) {
                return;
            }
            room.in_game = true;
            let seats = std::mem::take(&mut room.seats);
            let fen = room
                .start_fen
                .clone()
                .unwrap_or_else(|| DEFAULT_START_FEN.to_string());
            (seats, room.move_time_millis, fen)
        };

        tracing::info!(
            room_id = %self.room_id,
            budget_millis,
            "game starting"
        );
        run_match(&mut seats, budget_millis, &start_fen).await;
        tracing::info!(room_id = %self.room_id, "game over");

        let mut room = self.state.lock().await;
        room.in_game = false;
        room.seats = seats;
        self.reap(&mut room).await;
    }

    /// Evicts the player with the given session id, if seated here.
    pub async fn remove_player(&self, session_id: &str, notify: bool, reason: &str) {
        let mut room = self.state.lock().await;
        let found = [Color::White, Color::Black].into_iter().find(|&c| {
            room.seats
                .seat(c)
                .is_some_and(|s| s.session_id() == session_id)
        });
        if let Some(color) = found {
            room.seats.evict(color, notify, reason).await;
            self.reap(&mut room).await;
        }
    }

    /// Drops the room from the registry once nobody is seated.
    async fn reap(&self, room: &mut MatchRoom) {
        if room.seats.is_empty() && !room.in_game {
            self.registry.remove(&self.room_id).await;
        }
    }
}

// =========================================================================
// Game loop
// =========================================================================

/// What ended the mover's turn.
enum Turn {
    Frame(Option<Message>),
    Deadline,
}

/// Plays one game to completion, consuming the seats.
///
/// Both players are walked through get-ready and game-start, then moves
/// are relayed back and forth. The mover's clock runs while the room
/// waits on their socket; with a positive budget the wait is raced
/// against the mover's remaining time.
async fn run_match(seats: &mut Seats, budget_millis: i64, start_fen: &str) {
    for color in [Color::White, Color::Black] {
        if let Some(session) = seats.seat_mut(color).as_mut() {
            session.reset_clock();
        }
    }

    for color in [Color::White, Color::Black] {
        let prep = Message::GetReady {
            is_white: color.is_white(),
            clock_time_millis: budget_millis,
            game_start_fen: start_fen.to_string(),
        };
        let sent = match seats.seat_mut(color).as_mut() {
            Some(session) => session.send(&prep).await.is_ok(),
            None => false,
        };
        if !sent {
            seats.evict(color, false, "").await;
            return;
        }
    }

    for color in [Color::White, Color::Black] {
        // The wait is bounded: a player that went quiet after GetReady
        // must not pin the room forever.
        let reply = match seats.seat_mut(color).as_mut() {
            Some(session) => timeout(ACK_TIMEOUT, session.next_message()).await,
            None => Ok(None),
        };
        match reply {
            Ok(Some(Message::IsReady)) => {}
            Ok(None) | Ok(Some(Message::Shutdown { .. })) => {
                seats.evict(color, false, "").await;
                return;
            }
            Err(_) => {
                tracing::warn!(%color, "no ready confirmation in time");
                seats.evict(color, true, "Unresponsive client").await;
                return;
            }
            Ok(Some(other)) => {
                tracing::warn!(%color, frame = %other, "expected ready confirmation");
                seats.evict(color, true, "Unresponsive client").await;
                return;
            }
        }
    }

    for color in [Color::White, Color::Black] {
        let sent = match seats.seat_mut(color).as_mut() {
            Some(session) => session.send(&Message::GameStart).await.is_ok(),
            None => false,
        };
        if !sent {
            seats.evict(color, false, "").await;
            return;
        }
    }

    if let Some(white) = seats.seat_mut(Color::White).as_mut() {
        white.start_clock();
    }

    let mut to_move = Color::White;
    loop {
        let turn = {
            let Some(mover) = seats.seat_mut(to_move).as_mut() else {
                return;
            };
            if budget_millis > 0 {
                let remaining = budget_millis - mover.elapsed_millis();
                if remaining <= 0 {
                    Turn::Deadline
                } else {
                    tokio::select! {
                        msg = mover.next_message() => Turn::Frame(msg),
                        () = tokio::time::sleep(Duration::from_millis(remaining as u64)) => {
                            Turn::Deadline
                        }
                    }
                }
            } else {
                Turn::Frame(mover.next_message().await)
            }
        };

        match turn {
            Turn::Deadline => {
                tracing::info!(%to_move, "flag fell");
                if let Some(mover) = seats.seat_mut(to_move).as_mut() {
                    mover.pause_clock();
                    let _ = mover.send(&Message::Timeout { it_was_you: true }).await;
                }
                if let Some(other) = seats.seat_mut(to_move.other()).as_mut() {
                    let _ = other.send(&Message::Timeout { it_was_you: false }).await;
                }
                break;
            }
            Turn::Frame(None) => {
                // The mover's socket died. Dropping their seat lets the
                // eviction cascade break the news to the survivor, who
                // keeps their seat if they acknowledge.
                tracing::info!(%to_move, "player lost mid-game");
                seats.evict(to_move, false, "").await;
                return;
            }
            Turn::Frame(Some(Message::Shutdown { .. })) => {
                // An announced departure: close the quitter without
                // ceremony and tell the survivor directly.
                tracing::info!(%to_move, "player quit mid-game");
                if let Some(mut mover) = seats.seat_mut(to_move).take() {
                    mover.shutdown().await;
                }
                seats
                    .evict(to_move.other(), true, "Opponent connection lost")
                    .await;
                return;
            }
            Turn::Frame(Some(Message::Move { move_name, .. })) => {
                let mover_elapsed = {
                    let Some(mover) = seats.seat_mut(to_move).as_mut() else {
                        return;
                    };
                    mover.pause_clock();
                    mover.elapsed_millis()
                };
                let forwarded = {
                    let Some(other) = seats.seat_mut(to_move.other()).as_mut() else {
                        return;
                    };
                    let relayed = Message::Move {
                        move_name,
                        your_clock_elapsed: other.elapsed_millis(),
                        opponent_clock_elapsed: mover_elapsed,
                    };
                    match other.send(&relayed).await {
                        Ok(()) => {
                            other.start_clock();
                            true
                        }
                        Err(_) => false,
                    }
                };
                if !forwarded {
                    // The receiver is broken; the cascade tells the mover.
                    seats.evict(to_move.other(), false, "").await;
                    return;
                }
                to_move = to_move.other();
            }
            Turn::Frame(Some(Message::GameOver { reason })) => {
                if let Some(mover) = seats.seat_mut(to_move).as_mut() {
                    mover.pause_clock();
                }
                if let Some(other) = seats.seat_mut(to_move.other()).as_mut() {
                    let _ = other.send(&Message::GameOver { reason }).await;
                }
                break;
            }
            Turn::Frame(Some(other)) => {
                tracing::debug!(%to_move, frame = %other, "unexpected frame ignored");
            }
        }
    }

    seats.evict(Color::White, true, "Game Over").await;
    seats.evict(Color::Black, true, "Game Over").await;
}

// =========================================================================
// Tests
// =========================================================================
