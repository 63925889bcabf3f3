use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    /// Salted argon2 hash, never serialized into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: u8,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
