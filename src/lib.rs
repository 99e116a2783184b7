//! EthioBingo - Ethiopian Bingo Service
//!
//! Free-play 75-ball bingo (card generation, number calling, marking) plus the
//! staff side of a cartela business: wallet transactions confirmed by
//! one-time codes, role-based access and admin record managers, all over a
//! pluggable table store.

pub mod access;
pub mod admin;
pub mod api;
pub mod config;
pub mod errors;
pub mod game;
pub mod identity;
pub mod metrics;
pub mod store;
pub mod wallet;

pub use config::{BingoConfig, ConfigLoader};
pub use errors::{BingoError, BingoResult};
pub use store::{open_store, SharedStore, TableStore};
