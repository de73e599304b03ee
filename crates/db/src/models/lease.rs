//! Dispatch queue request and result types.

use std::time::Duration;

use serde::Serialize;
use ultitracker_core::annotation::{AnnotationType, OrderPolicy};
use ultitracker_core::error::CoreError;
use ultitracker_core::types::{GameId, ImgId, Timestamp};

/// Largest batch a single dispatch call may lease.
pub const MAX_BATCH_SIZE: u32 = 50;

/// Longest lease a single dispatch call may take out.
pub const MAX_LEASE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// A validated request for the next batch of images to annotate.
///
/// Construct with [`LeaseRequest::new`]; an existing value is always
/// within bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseRequest {
    game_ids: Vec<GameId>,
    annotation_type: AnnotationType,
    order: OrderPolicy,
    batch_size: u32,
    lease_duration: Duration,
}

impl LeaseRequest {
    pub fn new(
        game_ids: Vec<GameId>,
        annotation_type: AnnotationType,
        order: OrderPolicy,
        batch_size: u32,
        lease_duration: Duration,
    ) -> Result<Self, CoreError> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(CoreError::Validation(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }
        if lease_duration.is_zero() || lease_duration > MAX_LEASE_DURATION {
            return Err(CoreError::Validation(format!(
                "lease duration must be positive and at most {}s",
                MAX_LEASE_DURATION.as_secs()
            )));
        }

        let mut game_ids: Vec<GameId> = game_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        game_ids.sort();
        game_ids.dedup();

        Ok(Self {
            game_ids,
            annotation_type,
            order,
            batch_size,
            lease_duration,
        })
    }

    pub fn game_ids(&self) -> &[GameId] {
        &self.game_ids
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.annotation_type
    }

    pub fn order(&self) -> OrderPolicy {
        self.order
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Lease duration as a chrono delta, for timestamp arithmetic.
    pub fn lease_delta(&self) -> chrono::Duration {
        lease_delta(self.lease_duration)
    }
}

/// Convert a bounded lease duration to a chrono delta.
pub(crate) fn lease_delta(duration: Duration) -> chrono::Duration {
    // Bounded by MAX_LEASE_DURATION wherever it matters, so this never saturates.
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// An image leased to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeasedImage {
    pub img_id: ImgId,
    pub raw_path: String,
    pub frame_number: Option<i32>,
    pub lease_expires_at: Timestamp,
}

/// Dispatch state of one image for one annotation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LeaseState {
    /// Never sent, or the latest lease has lapsed.
    Available,
    /// Out with an annotator until the given instant.
    Leased { until: Timestamp },
    /// Annotated; never dispatched again for this type.
    Submitted,
}
