//! Bounty Board - Winner assignment and prize distribution
//!
//! A marketplace backend where organizations post paid bounties, builders
//! submit work, and organizations select winners and record payouts. This
//! crate implements the winner subsystem: deciding who wins a bounty, at
//! what position, for what amount, and in what currency.
//!
//! # How it works
//!
//! 1. Organizations publish bounties with a prize schedule (the winnings
//!    table, keyed by finishing position) and an optional payout token
//! 2. Builders submit entries; reviewers approve them
//! 3. Owners, admins, and per-bounty curators assign positions one at a
//!    time (PATCH position) or announce the full slate at once
//! 4. Single-position assignment converts the prize to USD at a freshly
//!    fetched rate; a failed conversion aborts the whole operation
//! 5. A reset reverts every approved submission to an un-decided state
//!
//! # Invariants
//!
//! - At most one submission holds a given position within a bounty
//! - A submission is a winner iff its position is non-null; `is_winner`
//!   is derived and written in the same transaction
//! - Amounts are traceable to the winnings table, and a batch slate must
//!   sum to the prize pool

pub mod authz;
pub mod config;
pub mod error;
pub mod exchange;
pub mod models;
pub mod notify;
pub mod server;
pub mod storage;
pub mod winners;

pub use config::Config;
pub use error::ApiError;
pub use exchange::{HttpRateGateway, RateSource};
pub use models::{Bounty, BountyStatus, OrgRole, Submission, SubmissionStatus, Winnings};
pub use notify::{Notifier, NullNotifier, WebhookNotifier};
pub use storage::MarketStore;
