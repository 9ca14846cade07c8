//! Domain types for the bounty board
//!
//! A bounty carries an authoritative prize schedule (the winnings table,
//! keyed by finishing position) and an optional payout token. A submission
//! is a winner iff `position` is non-null; `is_winner` is a denormalized
//! cache of that fact and is written in the same transaction as `position`
//! on every mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organization role of a member, from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Owner => "OWNER",
            OrgRole::Admin => "ADMIN",
            OrgRole::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(OrgRole::Owner),
            "ADMIN" => Some(OrgRole::Admin),
            "MEMBER" => Some(OrgRole::Member),
            _ => None,
        }
    }
}

/// Bounty lifecycle. The winner subsystem only ever moves a bounty from
/// OPEN/REVIEWING to COMPLETED (via announcement); all other transitions
/// belong to out-of-scope editing flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BountyStatus {
    Open,
    Reviewing,
    Completed,
    Closed,
    Cancelled,
}

impl BountyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BountyStatus::Open => "OPEN",
            BountyStatus::Reviewing => "REVIEWING",
            BountyStatus::Completed => "COMPLETED",
            BountyStatus::Closed => "CLOSED",
            BountyStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(BountyStatus::Open),
            "REVIEWING" => Some(BountyStatus::Reviewing),
            "COMPLETED" => Some(BountyStatus::Completed),
            "CLOSED" => Some(BountyStatus::Closed),
            "CANCELLED" => Some(BountyStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether winners may still be announced for a bounty in this state.
    pub fn accepts_announcement(&self) -> bool {
        matches!(self, BountyStatus::Open | BountyStatus::Reviewing)
    }
}

/// Submission lifecycle, orthogonal to winner state. Position assignment
/// never mutates it; announcement and reset set it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    Spam,
    Withdrawn,
    Approved,
    Rejected,
    UnderReview,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Spam => "SPAM",
            SubmissionStatus::Withdrawn => "WITHDRAWN",
            SubmissionStatus::Approved => "APPROVED",
            SubmissionStatus::Rejected => "REJECTED",
            SubmissionStatus::UnderReview => "UNDER_REVIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUBMITTED" => Some(SubmissionStatus::Submitted),
            "SPAM" => Some(SubmissionStatus::Spam),
            "WITHDRAWN" => Some(SubmissionStatus::Withdrawn),
            "APPROVED" => Some(SubmissionStatus::Approved),
            "REJECTED" => Some(SubmissionStatus::Rejected),
            "UNDER_REVIEW" => Some(SubmissionStatus::UnderReview),
            _ => None,
        }
    }
}

/// Prize schedule: position number (serialized as a string key, e.g. "1")
/// mapped to the prize amount in the bounty's token.
pub type Winnings = BTreeMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounty {
    pub id: String,
    pub org_id: String,
    pub title: String,
    pub status: BountyStatus,
    pub token: Option<String>,
    pub total_amount: Option<f64>,
    pub winnings: Option<Winnings>,
    pub winners_announced_at: Option<DateTime<Utc>>,
}

impl Bounty {
    /// Prize amount for a finishing position, per the winnings table.
    pub fn prize_for(&self, position: u32) -> Option<f64> {
        self.winnings
            .as_ref()
            .and_then(|w| w.get(&position.to_string()))
            .copied()
    }

    /// Total prize pool: the winnings-table sum, or the bounty amount when
    /// no table is present.
    pub fn total_pool(&self) -> f64 {
        match &self.winnings {
            Some(w) if !w.is_empty() => w.values().sum(),
            _ => self.total_amount.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub bounty_id: String,
    pub user_id: String,
    pub status: SubmissionStatus,
    pub position: Option<u32>,
    pub winning_amount: Option<f64>,
    pub winning_amount_usd: Option<f64>,
    pub is_winner: bool,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
