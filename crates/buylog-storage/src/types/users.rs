//! User types.

use chrono::{DateTime, Utc};

use super::UserId;

/// User record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub credential_hash: String, // opaque; hashing happens outside the store
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a user
#[derive(Clone, Debug)]
pub struct CreateUserParams {
    pub login: String,
    pub credential_hash: String,
}
