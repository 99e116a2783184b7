//! Free-play bingo engine

pub mod caller;
pub mod card;
pub mod marks;
pub mod registry;
pub mod session;
pub mod types;

pub use caller::NumberCaller;
pub use card::{generate_card, BingoCard, WinningLine};
pub use marks::MarkSet;
pub use registry::SessionRegistry;
pub use session::{GameEvent, GameSession, GameState, SessionSnapshot};
pub use types::{CalledNumber, Letter};
