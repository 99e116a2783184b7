//! Admin resource managers
//!
//! Every operation takes an [`AccessContext`](crate::access::AccessContext)
//! and checks the role it needs; mutations append an `admin_actions` row in
//! the same batch as the change itself.

pub mod accounts;
pub mod audit;
pub mod cartelas;
pub mod credits;
pub mod groups;
pub mod results;
pub mod stats;

pub use accounts::{AccountManager, AccountView, NewAccount, UserAccount, UserType};
pub use audit::AdminAction;
pub use cartelas::{CardStatus, Cartela, CartelaFilter, CartelaManager, VerificationResult};
pub use credits::{CreditLedger, CreditTransaction, CreditType, NewCredit};
pub use groups::{CartelaGroup, GroupManager, NewGroup};
pub use results::{GameResult, GameResultManager, NewGameResult, PublishOutcome, ResultStatus};
pub use stats::StatsOverview;
