//! Expiration status derivation.
//!
//! Per employee, a traffic-light status is computed from assignment expiry
//! dates and the gap between assigned and role-recommended equipment. This
//! is a pure read-time derivation recomputed on every call: nothing is
//! persisted, so there is no stored status to go stale.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PpeStatus {
    Red,
    Yellow,
    Green,
}

/// One PPE assignment as seen by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedPpe {
    pub id: Uuid,
    pub ppe_id: Uuid,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One role recommendation, optionally tagged with the risk it mitigates.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedPpe {
    pub ppe_id: Uuid,
    pub name: String,
    pub risk: Option<String>,
}

/// The derived state for one employee.
#[derive(Debug, Serialize)]
pub struct Evaluation {
    pub status: PpeStatus,
    pub has_expired: bool,
    pub has_expiring_soon: bool,
    pub missing: Vec<RecommendedPpe>,
    pub nearest_expires: Option<DateTime<Utc>>,
}

/// Per-status employee counts for the dashboard header.
#[derive(Debug, Default, Serialize)]
pub struct StatusCounts {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: PpeStatus) {
        match status {
            PpeStatus::Red => self.red += 1,
            PpeStatus::Yellow => self.yellow += 1,
            PpeStatus::Green => self.green += 1,
        }
    }
}

/// Evaluate one employee's assignments against their role's recommendations.
///
/// Precedence, highest first: red when anything has expired or any
/// recommended item is missing; yellow when something expires within the
/// threshold; green otherwise.
pub fn evaluate(
    assigned: &[AssignedPpe],
    recommended: &[RecommendedPpe],
    now: DateTime<Utc>,
    threshold_days: i64,
) -> Evaluation {
    let soon_cutoff = now + Duration::days(threshold_days);

    let has_expired = assigned
        .iter()
        .filter_map(|a| a.expires_at)
        .any(|expiry| expiry < now);

    // Already-expired assignments are not counted again as expiring soon
    let has_expiring_soon = assigned
        .iter()
        .filter_map(|a| a.expires_at)
        .any(|expiry| expiry >= now && expiry < soon_cutoff);

    let assigned_ids: Vec<Uuid> = assigned.iter().map(|a| a.ppe_id).collect();
    let mut missing: Vec<RecommendedPpe> = Vec::new();
    for item in recommended {
        if assigned_ids.contains(&item.ppe_id) {
            continue;
        }
        // A role may recommend the same item against several risks
        if missing.iter().any(|m| m.ppe_id == item.ppe_id) {
            continue;
        }
        missing.push(item.clone());
    }

    let nearest_expires = assigned.iter().filter_map(|a| a.expires_at).min();

    let status = if has_expired || !missing.is_empty() {
        PpeStatus::Red
    } else if has_expiring_soon {
        PpeStatus::Yellow
    } else {
        PpeStatus::Green
    };

    Evaluation {
        status,
        has_expired,
        has_expiring_soon,
        missing,
        nearest_expires,
    }
}
