//! Annotation dispatch queue.
//!
//! Lease state lives entirely in the append-only `annotation_transaction`
//! log: a "sent" row is a lease that lapses `lease_duration` after its
//! timestamp, a "submitted" row retires the image for that annotation type.
//! There is no sweeper; expiry is a comparison at read time.
//!
//! Row locks on `img_location` cannot serialise two dispatchers, because the
//! conflicting state is an *absent* log row. Each dispatch therefore takes a
//! transaction-scoped advisory lock keyed by annotation type before reading
//! candidates, so concurrent calls for the same type run one after another
//! and the second one sees the first one's "sent" rows.

use std::cmp::Ordering;
use std::time::Duration;

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use ultitracker_core::annotation::{AnnotationType, OrderPolicy};
use ultitracker_core::types::{ImgId, Timestamp};

use crate::models::lease::{lease_delta, LeaseRequest, LeaseState, LeasedImage};

/// Base of the advisory lock ids used by dispatch, one per annotation type.
pub const DISPATCH_LOCK_BASE: i64 = 731_904_200;

/// Advisory lock id serialising dispatch for `annotation_type`.
pub fn lease_lock_id(annotation_type: AnnotationType) -> i64 {
    let offset = match annotation_type {
        AnnotationType::PlayerBbox => 0,
        AnnotationType::FieldLines => 1,
        AnnotationType::CameraAngle => 2,
    };
    DISPATCH_LOCK_BASE + offset
}

#[derive(Debug, FromRow)]
struct LeasedRow {
    img_id: ImgId,
    raw_path: String,
    frame_number: Option<i32>,
}

pub struct AnnotationQueueRepo;

impl AnnotationQueueRepo {
    /// Lease the next batch of eligible images.
    ///
    /// An image is eligible when it belongs to one of the requested games,
    /// has no "submitted" row for the type, has no "sent" row newer than
    /// `now - lease_duration`, and (for every type but `camera_angle`)
    /// carries a valid camera-angle label. Up to `batch_size` of them are
    /// taken in the requested order and a "sent" row stamped `now` is
    /// written for each, all in one transaction.
    ///
    /// Returns fewer images than requested, possibly none, when the pool is
    /// short. Sequential batches come back in `(frame_number, img_id)` order.
    pub async fn lease_next(
        pool: &PgPool,
        request: &LeaseRequest,
        now: Timestamp,
    ) -> Result<Vec<LeasedImage>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let leased = Self::lease_next_in(&mut tx, request, now).await?;
        tx.commit().await?;
        Ok(leased)
    }

    /// [`lease_next`](Self::lease_next) inside a caller-owned transaction.
    ///
    /// The "sent" rows and the dispatch lock last until the caller commits.
    /// Dropping the transaction instead withdraws every lease in the batch.
    pub async fn lease_next_in(
        tx: &mut Transaction<'_, Postgres>,
        request: &LeaseRequest,
        now: Timestamp,
    ) -> Result<Vec<LeasedImage>, sqlx::Error> {
        if request.game_ids().is_empty() {
            return Ok(Vec::new());
        }

        let annotation_type = request.annotation_type();
        let cutoff = now - request.lease_delta();
        let expires_at = now + request.lease_delta();

        let camera_gate = if annotation_type.requires_valid_camera_angle() {
            "AND EXISTS (
                SELECT 1 FROM camera_angle ca
                WHERE ca.img_id = i.img_id AND ca.is_valid
            )"
        } else {
            ""
        };
        let order_by = match request.order() {
            OrderPolicy::Sequential => "i.frame_number ASC NULLS LAST, i.img_id ASC",
            OrderPolicy::Random => "random()",
        };

        let query = format!(
            "WITH candidates AS MATERIALIZED (
                SELECT i.img_id, i.img_raw_path, i.frame_number
                FROM img_location i
                WHERE i.game_id = ANY($1)
                  AND NOT EXISTS (
                      SELECT 1 FROM annotation_transaction t
                      WHERE t.img_id = i.img_id
                        AND t.table_ref = $2::annotation_table
                        AND (t.action = 'submitted'
                             OR (t.action = 'sent' AND t.timestamp > $3))
                  )
                  {camera_gate}
                ORDER BY {order_by}
                LIMIT $4
             ),
             leased AS (
                INSERT INTO annotation_transaction (img_id, timestamp, table_ref, action)
                SELECT img_id, $5::timestamptz, $2::annotation_table, 'sent'::annotation_action
                FROM candidates
                RETURNING img_id
             )
             SELECT c.img_id, c.img_raw_path AS raw_path, c.frame_number
             FROM candidates c
             JOIN leased l ON l.img_id = c.img_id"
        );

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lease_lock_id(annotation_type))
            .execute(&mut **tx)
            .await?;

        let mut rows = sqlx::query_as::<_, LeasedRow>(&query)
            .bind(request.game_ids())
            .bind(annotation_type.as_str())
            .bind(cutoff)
            .bind(i64::from(request.batch_size()))
            .bind(now)
            .fetch_all(&mut **tx)
            .await?;

        if request.order() == OrderPolicy::Sequential {
            rows.sort_by(|a, b| {
                compare_frames(a.frame_number, b.frame_number).then_with(|| a.img_id.cmp(&b.img_id))
            });
        }

        if rows.is_empty() {
            tracing::debug!(
                annotation_type = %annotation_type,
                games = request.game_ids().len(),
                "No images eligible for dispatch",
            );
        } else {
            tracing::info!(
                annotation_type = %annotation_type,
                order = %request.order(),
                leased = rows.len(),
                expires_at = %expires_at,
                "Leased images for annotation",
            );
        }

        Ok(rows
            .into_iter()
            .map(|row| LeasedImage {
                img_id: row.img_id,
                raw_path: row.raw_path,
                frame_number: row.frame_number,
                lease_expires_at: expires_at,
            })
            .collect())
    }

    /// Current dispatch state of one image for one annotation type.
    pub async fn lease_state(
        pool: &PgPool,
        img_id: &str,
        annotation_type: AnnotationType,
        lease_duration: Duration,
        now: Timestamp,
    ) -> Result<LeaseState, sqlx::Error> {
        let (submitted, last_sent): (Option<bool>, Option<Timestamp>) = sqlx::query_as(
            "SELECT bool_or(action = 'submitted'),
                    max(timestamp) FILTER (WHERE action = 'sent')
             FROM annotation_transaction
             WHERE img_id = $1 AND table_ref = $2::annotation_table",
        )
        .bind(img_id)
        .bind(annotation_type.as_str())
        .fetch_one(pool)
        .await?;

        if submitted.unwrap_or(false) {
            return Ok(LeaseState::Submitted);
        }

        Ok(match last_sent {
            Some(sent_at) => {
                let until = sent_at + lease_delta(lease_duration);
                if until > now {
                    LeaseState::Leased { until }
                } else {
                    LeaseState::Available
                }
            }
            None => LeaseState::Available,
        })
    }
}

/// Ascending frame order with unnumbered frames last.
fn compare_frames(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_ids_are_distinct_per_type() {
        let mut ids: Vec<i64> = AnnotationType::ALL.iter().map(|t| lease_lock_id(*t)).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), AnnotationType::ALL.len());
    }

    #[test]
    fn unnumbered_frames_sort_last() {
        let mut frames = vec![None, Some(3), Some(1), None, Some(2)];
        frames.sort_by(|a, b| compare_frames(*a, *b));
        assert_eq!(frames, vec![Some(1), Some(2), Some(3), None, None]);
    }
}
