//! Rehome plans: the BLOCK/REUSE/MOVE decision for moving or reusing a
//! payload between the warm and cold tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Which way a payload is being rehomed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RehomeDirection {
    /// Moving from the warm tier to the cold tier.
    Demote,
    /// Moving from the cold tier back to the warm tier.
    Promote,
}

/// The decision a rehome plan resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RehomeDecision {
    /// Refuse to proceed; `reasons` explains why. No mutation occurs.
    Block,
    /// A matching payload already exists on the target device; relocate
    /// torrents to reference it without copying bytes.
    Reuse,
    /// No matching payload exists on the target device; move the payload
    /// root there (rename if same device, verified copy-then-delete
    /// otherwise).
    Move,
}

/// A self-describing, versioned plan document: sufficient to replay without
/// re-querying the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RehomePlan {
    /// Schema version of this plan document.
    pub version: u32,
    /// Direction of the rehome.
    pub direction: RehomeDirection,
    /// Resolved decision.
    pub decision: RehomeDecision,
    /// Payload fingerprint this plan concerns.
    pub payload_hash: Option<String>,
    /// Infohashes of every torrent instance affected by this plan (the
    /// target payload's full sibling set).
    pub affected_torrents: Vec<String>,
    /// Source device.
    pub source_device_id: DeviceId,
    /// Canonical source path.
    pub source_path: String,
    /// Target device, once resolved (absent for BLOCK decisions that never
    /// reach target resolution).
    pub target_device_id: Option<DeviceId>,
    /// Canonical target path, once resolved.
    pub target_path: Option<String>,
    /// File count recorded at plan time, used as a post-apply checksum.
    pub file_count: i64,
    /// Total bytes recorded at plan time, used as a post-apply checksum.
    pub total_bytes: i64,
    /// Human-readable reasons; always non-empty for BLOCK decisions.
    pub reasons: Vec<String>,
    /// Always `true` for `Promote`; the "no blind copy" rule is absolute
    /// (spec §4.7, §9 Open Questions) but the field is reserved for a future
    /// relaxation.
    pub no_blind_copy: bool,
    /// When this plan was computed.
    pub created_at: DateTime<Utc>,
}

impl RehomePlan {
    /// Construct a BLOCK plan. Panics in debug builds if `reasons` is empty,
    /// since spec §8 invariant 5 requires every BLOCK decision to record at
    /// least one reason.
    #[must_use]
    pub fn block(
        direction: RehomeDirection,
        payload_hash: Option<String>,
        source_device_id: DeviceId,
        source_path: impl Into<String>,
        reasons: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        debug_assert!(
            !reasons.is_empty(),
            "BLOCK decisions must record at least one reason"
        );
        Self {
            version: 1,
            direction,
            decision: RehomeDecision::Block,
            payload_hash,
            affected_torrents: Vec::new(),
            source_device_id,
            source_path: source_path.into(),
            target_device_id: None,
            target_path: None,
            file_count: 0,
            total_bytes: 0,
            reasons,
            no_blind_copy: matches!(direction, RehomeDirection::Promote),
            created_at: now,
        }
    }

    /// Whether this plan is safe to apply (decision is not BLOCK).
    #[must_use]
    pub const fn is_applicable(&self) -> bool {
        !matches!(self.decision, RehomeDecision::Block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_plan_carries_reasons_and_no_blind_copy_for_promote() {
        let plan = RehomePlan::block(
            RehomeDirection::Promote,
            None,
            DeviceId(1),
            "warm/seeding/t",
            vec!["payload not present on target".to_string()],
            Utc::now(),
        );
        assert!(!plan.is_applicable());
        assert!(plan.no_blind_copy);
        assert_eq!(plan.reasons.len(), 1);
    }

    #[test]
    fn block_plan_demote_does_not_set_no_blind_copy() {
        let plan = RehomePlan::block(
            RehomeDirection::Demote,
            None,
            DeviceId(1),
            "warm/seeding/t",
            vec!["external consumer detected".to_string()],
            Utc::now(),
        );
        assert!(!plan.no_blind_copy);
    }
}
