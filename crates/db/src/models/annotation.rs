//! Annotation payload rows and the transaction log.

use serde::Serialize;
use sqlx::FromRow;
use ultitracker_core::annotation::AnnotationType;
use ultitracker_core::types::{ImgId, Timestamp};

/// A row from the `annotation_transaction` log. Enum columns are read back
/// as text.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnnotationTransaction {
    pub img_id: ImgId,
    pub timestamp: Timestamp,
    pub table_ref: String,
    pub action: String,
}

/// A `player_bbox` row with the box flattened to its corners.
///
/// `(x1, y1)` is the lower-left corner and `(x2, y2)` the upper-right,
/// since stored boxes are normalised.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlayerBboxRow {
    pub img_id: ImgId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub player_id: Option<String>,
}

/// A `field_lines` row with the segment flattened to its endpoints.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FieldLineRow {
    pub img_id: ImgId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub line_id: String,
}

/// A `camera_angle` row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CameraAngleRow {
    pub img_id: ImgId,
    pub is_valid: bool,
}

/// Every row of one payload table. Serialises as a bare array.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnnotationRows {
    PlayerBbox(Vec<PlayerBboxRow>),
    FieldLines(Vec<FieldLineRow>),
    CameraAngle(Vec<CameraAngleRow>),
}

impl AnnotationRows {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            Self::PlayerBbox(_) => AnnotationType::PlayerBbox,
            Self::FieldLines(_) => AnnotationType::FieldLines,
            Self::CameraAngle(_) => AnnotationType::CameraAngle,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::PlayerBbox(rows) => rows.len(),
            Self::FieldLines(rows) => rows.len(),
            Self::CameraAngle(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a stored annotation.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub img_id: ImgId,
    pub annotation_type: AnnotationType,
    pub submitted_at: Timestamp,
    /// Payload rows written; zero for an empty box or line list.
    pub rows_written: usize,
}
