//! Annotation vocabulary and payload validation.
//!
//! Every annotation type maps to exactly one payload table and one payload
//! variant. Payloads arrive as loosely-shaped JSON from the annotator UI and
//! are turned into an [`AnnotationPayload`] here, before anything touches the
//! database, so that a rejected payload can never produce a partial write.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of boxes or line segments accepted for a single image.
pub const MAX_ITEMS_PER_IMAGE: usize = 100;

/// Maximum length of a free-form player identifier.
pub const MAX_PLAYER_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Annotation type
// ---------------------------------------------------------------------------

/// The kind of label being collected for an image.
///
/// The snake_case name doubles as the payload table name and as the
/// `table_ref` value recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    PlayerBbox,
    FieldLines,
    CameraAngle,
}

/// All valid annotation type strings.
const VALID_ANNOTATION_TYPES: &[&str] = &["player_bbox", "field_lines", "camera_angle"];

impl AnnotationType {
    /// Every annotation type, in catalog order.
    pub const ALL: [AnnotationType; 3] = [Self::PlayerBbox, Self::FieldLines, Self::CameraAngle];

    /// Return the annotation type as its snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerBbox => "player_bbox",
            Self::FieldLines => "field_lines",
            Self::CameraAngle => "camera_angle",
        }
    }

    /// Parse an annotation type from its name.
    ///
    /// `gameplay_state` is accepted as the legacy name of `camera_angle`.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "player_bbox" => Ok(Self::PlayerBbox),
            "field_lines" => Ok(Self::FieldLines),
            "camera_angle" | "gameplay_state" => Ok(Self::CameraAngle),
            other => Err(CoreError::Validation(format!(
                "Invalid annotation type '{other}'. Must be one of: {}",
                VALID_ANNOTATION_TYPES.join(", ")
            ))),
        }
    }

    /// Name of the table holding this type's payload rows.
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }

    /// Whether images must carry a valid camera-angle label before they can
    /// be dispatched for this type.
    ///
    /// Geometric labels only make sense on frames whose camera angle was
    /// judged usable, so every type except `camera_angle` itself is gated.
    pub fn requires_valid_camera_angle(&self) -> bool {
        !matches!(self, Self::CameraAngle)
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transaction action
// ---------------------------------------------------------------------------

/// Action recorded in the annotation transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationAction {
    /// The image was leased to an annotator.
    Sent,
    /// An annotation was stored; the image is done for this type.
    Submitted,
}

impl AnnotationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Submitted => "submitted",
        }
    }
}

// ---------------------------------------------------------------------------
// Order policy
// ---------------------------------------------------------------------------

/// How eligible images are ordered before a batch is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    /// Unpredictable shuffle of the candidate pool.
    Random,
    /// Ascending frame number within the requested games.
    Sequential,
}

impl OrderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Sequential => "sequential",
        }
    }

    /// Parse an order policy from its name or its numeric code
    /// (`0` = random, `1` = sequential, as sent by older clients).
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "random" | "0" => Ok(Self::Random),
            "sequential" | "1" => Ok(Self::Sequential),
            other => Err(CoreError::Validation(format!(
                "Invalid order type '{other}'. Must be one of: random, sequential"
            ))),
        }
    }
}

impl fmt::Display for OrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Image encoding
// ---------------------------------------------------------------------------

/// Encoding of an extracted frame in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImgEncoding {
    Jpeg,
    Png,
    Tiff,
}

impl ImgEncoding {
    pub const ALL: [ImgEncoding; 3] = [Self::Jpeg, Self::Png, Self::Tiff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }
}

// ---------------------------------------------------------------------------
// Field line roles
// ---------------------------------------------------------------------------

/// The fixed set of field lines an annotator can trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineId {
    TopSideline,
    LeftBackEndzone,
    LeftFrontEndzone,
    RightFrontEndzone,
    RightBackEndzone,
    BottomSideline,
}

impl LineId {
    pub const ALL: [LineId; 6] = [
        Self::TopSideline,
        Self::LeftBackEndzone,
        Self::LeftFrontEndzone,
        Self::RightFrontEndzone,
        Self::RightBackEndzone,
        Self::BottomSideline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopSideline => "top_sideline",
            Self::LeftBackEndzone => "left_back_endzone",
            Self::LeftFrontEndzone => "left_front_endzone",
            Self::RightFrontEndzone => "right_front_endzone",
            Self::RightBackEndzone => "right_back_endzone",
            Self::BottomSideline => "bottom_sideline",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|line| line.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid line_id '{s}'. Must be one of: {}",
                    Self::ALL.map(|l| l.as_str()).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Payload items
// ---------------------------------------------------------------------------

/// A player bounding box in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub player_id: Option<String>,
}

/// A traced field line in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub line_id: LineId,
}

/// A validated annotation, one variant per annotation type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationPayload {
    PlayerBboxes(Vec<BoundingBox>),
    FieldLines(Vec<LineSegment>),
    CameraAngle { is_valid: bool },
}

impl AnnotationPayload {
    /// Parse and validate a raw JSON payload for `annotation_type`.
    ///
    /// Accepted shapes:
    /// - `player_bbox`: `{"bboxes": [..]}` or a bare array of boxes
    /// - `field_lines`: `{"line_coords": [..]}` or a bare array of segments
    /// - `camera_angle`: `{"is_valid": bool}` or a bare boolean
    ///
    /// An `img_id` embedded in an object payload must equal `img_id`.
    pub fn parse(
        annotation_type: AnnotationType,
        img_id: &str,
        raw: &serde_json::Value,
    ) -> Result<Self, CoreError> {
        if let Some(embedded) = raw.get("img_id") {
            if embedded.as_str() != Some(img_id) {
                return Err(CoreError::Validation(format!(
                    "payload img_id {embedded} does not match target image '{img_id}'"
                )));
            }
        }

        let payload = match annotation_type {
            AnnotationType::PlayerBbox => {
                let items = items_field(raw, "bboxes")?;
                Self::PlayerBboxes(deserialize_items(items, "bboxes")?)
            }
            AnnotationType::FieldLines => {
                let items = items_field(raw, "line_coords")?;
                Self::FieldLines(deserialize_items(items, "line_coords")?)
            }
            AnnotationType::CameraAngle => {
                let flag = match raw {
                    serde_json::Value::Bool(b) => Some(*b),
                    serde_json::Value::Object(obj) => {
                        obj.get("is_valid").and_then(serde_json::Value::as_bool)
                    }
                    _ => None,
                };
                let is_valid = flag.ok_or_else(|| {
                    CoreError::Validation(
                        "camera_angle payload must be a boolean or {\"is_valid\": bool}"
                            .to_string(),
                    )
                })?;
                Self::CameraAngle { is_valid }
            }
        };

        payload.validate()?;
        Ok(payload)
    }

    /// The annotation type this payload belongs to.
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            Self::PlayerBboxes(_) => AnnotationType::PlayerBbox,
            Self::FieldLines(_) => AnnotationType::FieldLines,
            Self::CameraAngle { .. } => AnnotationType::CameraAngle,
        }
    }

    /// Number of payload rows this annotation produces.
    pub fn row_count(&self) -> usize {
        match self {
            Self::PlayerBboxes(boxes) => boxes.len(),
            Self::FieldLines(lines) => lines.len(),
            Self::CameraAngle { .. } => 1,
        }
    }

    /// An empty box or line list is a legitimate terminal answer
    /// ("nothing visible") that stores no payload rows.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Check semantic constraints that the JSON shape alone cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::PlayerBboxes(boxes) => {
                validate_item_count(boxes.len(), "bboxes")?;
                for (i, b) in boxes.iter().enumerate() {
                    validate_point(b.x1, b.y1, &format!("bboxes[{i}]"))?;
                    validate_point(b.x2, b.y2, &format!("bboxes[{i}]"))?;
                    if b.x1 == b.x2 || b.y1 == b.y2 {
                        return Err(CoreError::Validation(format!(
                            "bboxes[{i}] has zero width or height"
                        )));
                    }
                    if let Some(player_id) = &b.player_id {
                        if player_id.len() > MAX_PLAYER_ID_LEN {
                            return Err(CoreError::Validation(format!(
                                "bboxes[{i}].player_id exceeds {MAX_PLAYER_ID_LEN} characters"
                            )));
                        }
                    }
                }
                Ok(())
            }
            Self::FieldLines(lines) => {
                validate_item_count(lines.len(), "line_coords")?;
                let mut seen = HashSet::new();
                for (i, line) in lines.iter().enumerate() {
                    validate_point(line.x1, line.y1, &format!("line_coords[{i}]"))?;
                    validate_point(line.x2, line.y2, &format!("line_coords[{i}]"))?;
                    if line.x1 == line.x2 && line.y1 == line.y2 {
                        return Err(CoreError::Validation(format!(
                            "line_coords[{i}] has identical endpoints"
                        )));
                    }
                    if !seen.insert(line.line_id) {
                        return Err(CoreError::Validation(format!(
                            "line_coords[{i}] repeats line_id '{}'",
                            line.line_id.as_str()
                        )));
                    }
                }
                Ok(())
            }
            Self::CameraAngle { .. } => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Extract the item array from either `{"<key>": [...]}` or a bare array.
fn items_field<'a>(
    raw: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, CoreError> {
    match raw {
        serde_json::Value::Array(_) => Ok(raw),
        serde_json::Value::Object(obj) => obj.get(key).ok_or_else(|| {
            CoreError::Validation(format!("payload is missing required key '{key}'"))
        }),
        _ => Err(CoreError::Validation(format!(
            "payload must be an array or an object with '{key}'"
        ))),
    }
}

fn deserialize_items<T: for<'de> Deserialize<'de>>(
    items: &serde_json::Value,
    key: &str,
) -> Result<Vec<T>, CoreError> {
    if !items.is_array() {
        return Err(CoreError::Validation(format!("'{key}' must be a JSON array")));
    }
    serde_json::from_value(items.clone())
        .map_err(|e| CoreError::Validation(format!("invalid '{key}': {e}")))
}

fn validate_item_count(len: usize, key: &str) -> Result<(), CoreError> {
    if len > MAX_ITEMS_PER_IMAGE {
        return Err(CoreError::Validation(format!(
            "'{key}' has {len} elements, maximum is {MAX_ITEMS_PER_IMAGE}"
        )));
    }
    Ok(())
}

fn validate_point(x: f64, y: f64, label: &str) -> Result<(), CoreError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(CoreError::Validation(format!(
            "{label} coordinates must be finite numbers"
        )));
    }
    if x < 0.0 || y < 0.0 {
        return Err(CoreError::Validation(format!(
            "{label} coordinates must be non-negative, got ({x}, {y})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
