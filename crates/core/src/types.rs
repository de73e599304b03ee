/// Image identifiers are opaque text keys assigned by the frame extractor.
pub type ImgId = String;

/// Game identifiers are opaque text keys assigned at upload.
pub type GameId = String;

/// User identifiers are opaque text keys (UUID strings) assigned at registration.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
