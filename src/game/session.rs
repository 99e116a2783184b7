//! Single-player game session
//!
//! `Idle` ⇄ `Active` state machine over one card, one caller and one mark
//! set. Presentation side effects (announcements, animations) are published
//! as [`GameEvent`]s on a broadcast channel instead of being performed here.

use super::caller::NumberCaller;
use super::card::{generate_card, BingoCard, WinningLine};
use super::marks::MarkSet;
use super::types::CalledNumber;
use crate::errors::GameError;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Idle,
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Started {
        session_id: String,
    },
    NumberCalled {
        session_id: String,
        token: String,
        number: u8,
        /// How long a client should keep the call highlighted
        announce_for_ms: u64,
    },
    Reset {
        session_id: String,
    },
    CardReplaced {
        session_id: String,
    },
    PoolExhausted {
        session_id: String,
    },
}

/// Serialisable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: GameState,
    pub card: BingoCard,
    pub called_numbers: Vec<String>,
    pub current_number: Option<String>,
    pub remaining: usize,
    pub marked_numbers: Vec<u8>,
    pub has_bingo: bool,
    pub winning_lines: Vec<WinningLine>,
    pub created_at: DateTime<Utc>,
}

pub struct GameSession {
    id: String,
    state: GameState,
    card: BingoCard,
    caller: NumberCaller,
    marks: MarkSet,
    rng: StdRng,
    announce_for: Duration,
    events: broadcast::Sender<GameEvent>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl GameSession {
    pub fn new(id: impl Into<String>, mut rng: StdRng, announce_for: Duration) -> Self {
        let card = generate_card(&mut rng);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: id.into(),
            state: GameState::Idle,
            card,
            caller: NumberCaller::new(),
            marks: MarkSet::new(),
            rng,
            announce_for,
            events,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn card(&self) -> &BingoCard {
        &self.card
    }

    pub fn caller(&self) -> &NumberCaller {
        &self.caller
    }

    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: GameEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Idle → Active; starting an active game changes nothing
    pub fn start(&mut self) -> GameState {
        if self.state == GameState::Idle {
            self.state = GameState::Active;
            self.publish(GameEvent::Started {
                session_id: self.id.clone(),
            });
        }
        self.state
    }

    pub fn call_next(&mut self) -> Result<CalledNumber, GameError> {
        if self.state != GameState::Active {
            return Err(GameError::NotActive);
        }

        match self.caller.call_next(&mut self.rng) {
            Ok(called) => {
                self.publish(GameEvent::NumberCalled {
                    session_id: self.id.clone(),
                    token: called.token(),
                    number: called.number,
                    announce_for_ms: self.announce_for.as_millis() as u64,
                });
                Ok(called)
            }
            Err(e) => {
                if e == GameError::PoolExhausted {
                    self.publish(GameEvent::PoolExhausted {
                        session_id: self.id.clone(),
                    });
                }
                Err(e)
            }
        }
    }

    pub fn toggle_mark(&mut self, number: u8) -> Result<bool, GameError> {
        self.marks.toggle(number, &self.caller)
    }

    /// Back to Idle with an empty log and full pool; the card is kept
    pub fn reset(&mut self) {
        self.state = GameState::Idle;
        self.caller.reset();
        self.marks.clear();
        self.publish(GameEvent::Reset {
            session_id: self.id.clone(),
        });
    }

    /// Replace the card and clear marks; calls so far are kept
    pub fn generate_new_card(&mut self) -> &BingoCard {
        self.card = generate_card(&mut self.rng);
        self.marks.clear();
        self.publish(GameEvent::CardReplaced {
            session_id: self.id.clone(),
        });
        &self.card
    }

    fn called_set(&self) -> HashSet<u8> {
        self.caller.called_numbers().collect()
    }

    pub fn has_bingo(&self) -> bool {
        self.card.has_bingo(&self.called_set())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let called = self.called_set();
        let winning_lines = self.card.winning_lines(&called);
        SessionSnapshot {
            session_id: self.id.clone(),
            state: self.state,
            card: self.card,
            called_numbers: self.caller.tokens(),
            current_number: self.caller.current().map(|c| c.token()),
            remaining: self.caller.remaining(),
            marked_numbers: self.marks.iter().collect(),
            has_bingo: !winning_lines.is_empty(),
            winning_lines,
            created_at: self.created_at,
        }
    }
}
