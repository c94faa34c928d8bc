//! Session runtime: the [`Orchestrator`] turn loop and its supporting modules.
//!
//! - [`orchestrator::Orchestrator`]: the per-turn state machine. Start here.
//! - [`config::ChatConfig`]: model, sampling, retry and context-window
//!   settings, passed in at construction.
//! - [`events`]: [`EventHandler`] trait and [`TurnEvent`] enum for observing
//!   turns. Includes [`LoggingHandler`] and [`FnEventHandler`].
//! - [`ledger`]: [`CostLedger`] of per-call [`CostRecord`]s with stats.
//! - [`session`]: control [`Command`]s, conversation snapshots and stats.

pub mod config;
pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod session;

// Re-export commonly used items at the module level.
pub use config::ChatConfig;
pub use events::{CallPhase, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, TurnEvent};
pub use ledger::{CostLedger, CostRecord, LedgerStats, format_cost};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnSummary};
pub use session::{Command, ConversationSnapshot, ConversationStats, Session};
