//! Schema catalog: table declarations, DDL, and creation order.
//!
//! Tables are created at startup rather than through migration files. The
//! order in [`INITIALIZATION_ORDER`] follows foreign-key dependencies, and
//! each enum type is created immediately before the first table using it.
//! Creation is idempotent: "already exists" failures are skipped, anything
//! else aborts startup.

use ultitracker_core::annotation::{
    AnnotationAction, AnnotationType, ImgEncoding, LineId,
};
use ultitracker_core::naming::validate_schema_name;

use crate::error::DbError;
use crate::DbPool;

/// SQLSTATE `duplicate_schema`.
const DUPLICATE_SCHEMA: &str = "42P06";
/// SQLSTATE `duplicate_table` (also raised for duplicate indexes).
const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE `duplicate_object` (raised for duplicate types).
const DUPLICATE_OBJECT: &str = "42710";

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Every table in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    Users,
    GameMetadata,
    AuthorizationScheme,
    ImgLocation,
    PlayerBbox,
    FieldLines,
    CameraAngle,
    AnnotationTransaction,
}

/// Creation order; each table only references tables earlier in the list.
pub const INITIALIZATION_ORDER: [TableId; 8] = [
    TableId::Users,
    TableId::GameMetadata,
    TableId::AuthorizationScheme,
    TableId::ImgLocation,
    TableId::PlayerBbox,
    TableId::FieldLines,
    TableId::CameraAngle,
    TableId::AnnotationTransaction,
];

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Boolean,
    Integer,
    Jsonb,
    Timestamp,
    /// A catalog enum type, by type name.
    Enum(&'static str),
    /// PostgreSQL `box`.
    Box,
    /// PostgreSQL `lseg`.
    LineSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub id: TableId,
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef { name, column_type }
}

const USERS: TableDef = TableDef {
    id: TableId::Users,
    name: "users",
    columns: &[
        col("user_id", ColumnType::Text),
        col("username", ColumnType::Text),
        col("email", ColumnType::Text),
        col("full_name", ColumnType::Text),
        col("salted_password", ColumnType::Text),
        col("disabled", ColumnType::Boolean),
    ],
};

const GAME_METADATA: TableDef = TableDef {
    id: TableId::GameMetadata,
    name: "game_metadata",
    columns: &[
        col("game_id", ColumnType::Text),
        col("data", ColumnType::Jsonb),
        col("thumbnail_key", ColumnType::Text),
        col("video_key", ColumnType::Text),
    ],
};

const AUTHORIZATION_SCHEME: TableDef = TableDef {
    id: TableId::AuthorizationScheme,
    name: "authorization_scheme",
    columns: &[
        col("game_id", ColumnType::Text),
        col("user_id", ColumnType::Text),
    ],
};

const IMG_LOCATION: TableDef = TableDef {
    id: TableId::ImgLocation,
    name: "img_location",
    columns: &[
        col("img_id", ColumnType::Text),
        col("img_raw_path", ColumnType::Text),
        col("img_type", ColumnType::Enum("img_encoding")),
        col("img_metadata", ColumnType::Jsonb),
        col("game_id", ColumnType::Text),
        col("frame_number", ColumnType::Integer),
    ],
};

const PLAYER_BBOX: TableDef = TableDef {
    id: TableId::PlayerBbox,
    name: "player_bbox",
    columns: &[
        col("img_id", ColumnType::Text),
        col("bbox", ColumnType::Box),
        col("player_id", ColumnType::Text),
    ],
};

const FIELD_LINES: TableDef = TableDef {
    id: TableId::FieldLines,
    name: "field_lines",
    columns: &[
        col("img_id", ColumnType::Text),
        col("line_coords", ColumnType::LineSegment),
        col("line_type", ColumnType::Enum("line_id")),
    ],
};

const CAMERA_ANGLE: TableDef = TableDef {
    id: TableId::CameraAngle,
    name: "camera_angle",
    columns: &[
        col("img_id", ColumnType::Text),
        col("is_valid", ColumnType::Boolean),
    ],
};

const ANNOTATION_TRANSACTION: TableDef = TableDef {
    id: TableId::AnnotationTransaction,
    name: "annotation_transaction",
    columns: &[
        col("img_id", ColumnType::Text),
        col("timestamp", ColumnType::Timestamp),
        col("table_ref", ColumnType::Enum("annotation_table")),
        col("action", ColumnType::Enum("annotation_action")),
    ],
};

impl TableId {
    /// The static declaration for this table.
    pub fn def(self) -> &'static TableDef {
        match self {
            Self::Users => &USERS,
            Self::GameMetadata => &GAME_METADATA,
            Self::AuthorizationScheme => &AUTHORIZATION_SCHEME,
            Self::ImgLocation => &IMG_LOCATION,
            Self::PlayerBbox => &PLAYER_BBOX,
            Self::FieldLines => &FIELD_LINES,
            Self::CameraAngle => &CAMERA_ANGLE,
            Self::AnnotationTransaction => &ANNOTATION_TRANSACTION,
        }
    }

    /// Unqualified table name.
    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// The payload table for an annotation type.
    pub fn for_annotation(annotation_type: AnnotationType) -> Self {
        match annotation_type {
            AnnotationType::PlayerBbox => Self::PlayerBbox,
            AnnotationType::FieldLines => Self::FieldLines,
            AnnotationType::CameraAngle => Self::CameraAngle,
        }
    }
}

impl TableDef {
    /// `schema.table`.
    pub fn qualified_name(&self, schema: &str) -> String {
        format!("{schema}.{}", self.name)
    }

    /// Comma-separated column names in declaration order.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// DDL for this table, preceded by any enum type it introduces and
    /// followed by its indexes.
    pub fn create_statements(&self, schema: &str) -> Vec<String> {
        let s = schema;
        match self.id {
            TableId::Users => vec![format!(
                "CREATE TABLE {s}.users (
                    user_id TEXT NOT NULL,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL,
                    full_name TEXT NOT NULL,
                    salted_password TEXT NOT NULL,
                    disabled BOOLEAN NOT NULL DEFAULT false,
                    PRIMARY KEY (user_id),
                    CONSTRAINT uq_users_username UNIQUE (username)
                )"
            )],
            TableId::GameMetadata => vec![format!(
                "CREATE TABLE {s}.game_metadata (
                    game_id TEXT NOT NULL,
                    data JSONB NOT NULL,
                    thumbnail_key TEXT,
                    video_key TEXT,
                    PRIMARY KEY (game_id)
                )"
            )],
            TableId::AuthorizationScheme => vec![format!(
                "CREATE TABLE {s}.authorization_scheme (
                    game_id TEXT NOT NULL REFERENCES {s}.game_metadata(game_id),
                    user_id TEXT NOT NULL REFERENCES {s}.users(user_id),
                    PRIMARY KEY (game_id, user_id)
                )"
            )],
            TableId::ImgLocation => vec![
                create_enum_statement(s, "img_encoding", &ImgEncoding::ALL.map(|e| e.as_str())),
                format!(
                    "CREATE TABLE {s}.img_location (
                        img_id TEXT NOT NULL,
                        img_raw_path TEXT NOT NULL,
                        img_type {s}.img_encoding NOT NULL,
                        img_metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                        game_id TEXT REFERENCES {s}.game_metadata(game_id),
                        frame_number INTEGER,
                        PRIMARY KEY (img_id)
                    )"
                ),
                format!(
                    "CREATE INDEX idx_img_location_game_frame \
                     ON {s}.img_location (game_id, frame_number)"
                ),
            ],
            TableId::PlayerBbox => vec![
                format!(
                    "CREATE TABLE {s}.player_bbox (
                        img_id TEXT NOT NULL REFERENCES {s}.img_location(img_id),
                        bbox BOX NOT NULL,
                        player_id TEXT
                    )"
                ),
                format!("CREATE INDEX idx_player_bbox_img ON {s}.player_bbox (img_id)"),
            ],
            TableId::FieldLines => vec![
                create_enum_statement(
                    s,
                    "line_id",
                    &LineId::ALL.map(|l| l.as_str()),
                ),
                format!(
                    "CREATE TABLE {s}.field_lines (
                        img_id TEXT NOT NULL REFERENCES {s}.img_location(img_id),
                        line_coords LSEG NOT NULL,
                        line_type {s}.line_id NOT NULL,
                        PRIMARY KEY (img_id, line_type)
                    )"
                ),
            ],
            TableId::CameraAngle => vec![format!(
                "CREATE TABLE {s}.camera_angle (
                    img_id TEXT NOT NULL REFERENCES {s}.img_location(img_id),
                    is_valid BOOLEAN NOT NULL,
                    PRIMARY KEY (img_id)
                )"
            )],
            TableId::AnnotationTransaction => vec![
                create_enum_statement(
                    s,
                    "annotation_table",
                    &AnnotationType::ALL.map(|t| t.as_str()),
                ),
                create_enum_statement(
                    s,
                    "annotation_action",
                    &[AnnotationAction::Sent.as_str(), AnnotationAction::Submitted.as_str()],
                ),
                format!(
                    "CREATE TABLE {s}.annotation_transaction (
                        img_id TEXT NOT NULL REFERENCES {s}.img_location(img_id),
                        timestamp TIMESTAMPTZ NOT NULL,
                        table_ref {s}.annotation_table NOT NULL,
                        action {s}.annotation_action NOT NULL,
                        PRIMARY KEY (img_id, timestamp, table_ref, action)
                    )"
                ),
                format!(
                    "CREATE INDEX idx_annotation_transaction_lookup \
                     ON {s}.annotation_transaction (table_ref, img_id, timestamp DESC)"
                ),
                // At most one completion per (image, annotation type).
                format!(
                    "CREATE UNIQUE INDEX uq_annotation_transaction_submitted \
                     ON {s}.annotation_transaction (img_id, table_ref) \
                     WHERE action = 'submitted'"
                ),
            ],
        }
    }

    /// DDL removing this table.
    pub fn drop_statement(&self, schema: &str) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified_name(schema))
    }
}

/// Enum types owned by the catalog, dropped after the tables.
pub const ENUM_TYPES: [&str; 4] = ["img_encoding", "line_id", "annotation_table", "annotation_action"];

fn create_enum_statement(schema: &str, type_name: &str, values: &[&str]) -> String {
    let labels = values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TYPE {schema}.{type_name} AS ENUM ({labels})")
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Create the schema and every catalog table in dependency order.
///
/// Statements run one at a time so that an existing enum type does not
/// prevent the table after it from being created.
pub async fn initialize(pool: &DbPool, schema: &str) -> Result<(), DbError> {
    validate_schema_name(schema).map_err(|e| DbError::Config(e.to_string()))?;

    run_idempotent(pool, schema, &format!("CREATE SCHEMA {schema}")).await?;

    for table in INITIALIZATION_ORDER {
        let def = table.def();
        for statement in def.create_statements(schema) {
            run_idempotent(pool, &def.qualified_name(schema), &statement).await?;
        }
        tracing::info!(table = %def.qualified_name(schema), "Table initialised");
    }

    Ok(())
}

/// Drop every catalog table and enum type in one atomic batch.
pub async fn drop_all(pool: &DbPool, schema: &str) -> Result<(), DbError> {
    validate_schema_name(schema).map_err(|e| DbError::Config(e.to_string()))?;

    let mut statements: Vec<String> = INITIALIZATION_ORDER
        .iter()
        .rev()
        .map(|t| t.def().drop_statement(schema))
        .collect();
    statements.extend(
        ENUM_TYPES
            .iter()
            .map(|ty| format!("DROP TYPE IF EXISTS {schema}.{ty}")),
    );

    crate::execute(pool, &statements).await?;
    tracing::info!(schema, "Catalog tables dropped");
    Ok(())
}

async fn run_idempotent(pool: &DbPool, object: &str, statement: &str) -> Result<(), DbError> {
    match crate::execute(pool, &[statement]).await {
        Ok(_) => Ok(()),
        Err(e) if is_already_exists(&e) => {
            tracing::debug!(object, "Already exists, skipping");
            Ok(())
        }
        Err(e) => Err(DbError::Integrity {
            object: object.to_string(),
            source: e,
        }),
    }
}

fn is_already_exists(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some(DUPLICATE_SCHEMA | DUPLICATE_TABLE | DUPLICATE_OBJECT)
        ),
        _ => false,
    }
}
