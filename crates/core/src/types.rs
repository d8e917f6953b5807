/// Primary key type shared by every persisted entity (`BIGSERIAL`).
pub type DbId = i64;

/// UTC timestamp used for `created_at` / `updated_at` / `reviewed_at` columns.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
