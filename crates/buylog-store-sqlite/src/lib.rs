//! SQLite implementation of [`buylog_storage::Store`].
//!
//! Timestamps are stored as unix milliseconds. Constraint violations are mapped onto
//! the uniform [`StoreError`]: unique violations become `AlreadyExists`, foreign key
//! violations (unknown user) become `NotFound`.

use std::str::FromStr;

use buylog_storage::{
    CreateUserParams, GroupId, GroupMember, Invite, InviteId, Store, StoreError, User, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A second connection would see a different in-memory database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(backend)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;
        Self::migrate(pool).await
    }

    /// Open (and create if missing) the database at `url`, e.g. `sqlite://buylog.db`.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(backend)?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await.map_err(backend)?;
        tracing::debug!("sqlite store migrated");
        Ok(Self { pool })
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Error mapping for statements that insert or move rows.
fn write_err(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        Some(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => backend(e),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp: {ms}")))
}

type UserRow = (i64, String, String, i64);

fn user_from_row((id, login, credential_hash, created_at): UserRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId(id),
        login,
        credential_hash,
        created_at: from_millis(created_at)?,
    })
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ──────────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO users(login, credential_hash, created_at) VALUES(?,?,?) RETURNING id",
        )
        .bind(&params.login)
        .bind(&params.credential_hash)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(UserId(id))
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, credential_hash, created_at FROM users WHERE id=?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        user_from_row(row)
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, credential_hash, created_at FROM users WHERE login=?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;
        user_from_row(row)
    }

    // ───────────────────────────── Group memberships ──────────────────────

    async fn load_all_group_memberships(&self) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT group_id, user_id, position FROM group_members ORDER BY group_id, position",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (group_id, user_id, position) in rows {
            let position = u32::try_from(position).map_err(backend)?;
            out.push(GroupMember {
                group_id: GroupId(group_id),
                user_id: UserId(user_id),
                position,
            });
        }
        Ok(out)
    }

    async fn create_group(&self, founder: &UserId) -> Result<GroupId, StoreError> {
        let (group_id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO group_members(group_id, user_id, position)
             VALUES((SELECT COALESCE(MAX(group_id), 0) + 1 FROM group_members), ?, 1)
             RETURNING group_id",
        )
        .bind(founder.0)
        .fetch_one(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(GroupId(group_id))
    }

    async fn insert_membership(&self, member: &GroupMember) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO group_members(group_id, user_id, position) VALUES(?,?,?)")
            .bind(member.group_id.0)
            .bind(member.user_id.0)
            .bind(member.position as i64)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn update_membership_position(&self, member: &GroupMember) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE group_members SET position=? WHERE group_id=? AND user_id=?")
                .bind(member.position as i64)
                .bind(member.group_id.0)
                .bind(member.user_id.0)
                .execute(&self.pool)
                .await
                .map_err(write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_membership(&self, user_id: &UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM group_members WHERE user_id=?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_memberships_for_group(&self, group_id: &GroupId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id=?")
            .bind(group_id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn count_members_in_group(&self, group_id: &GroupId) -> Result<u64, StoreError> {
        let (count,) =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM group_members WHERE group_id=?")
                .bind(group_id.0)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        u64::try_from(count).map_err(backend)
    }

    // ───────────────────────────── Invites ────────────────────────────────

    async fn load_all_invites(&self) -> Result<Vec<Invite>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT id, from_user_id, to_user_id, created_at FROM invites ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, from, to, created_at) in rows {
            out.push(Invite {
                id: InviteId(id),
                from_user_id: UserId(from),
                to_user_id: UserId(to),
                created_at: from_millis(created_at)?,
            });
        }
        Ok(out)
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<InviteId, StoreError> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO invites(id, from_user_id, to_user_id, created_at)
             VALUES(?,?,?,?) RETURNING id",
        )
        .bind(invite.id.0)
        .bind(invite.from_user_id.0)
        .bind(invite.to_user_id.0)
        .bind(invite.created_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(InviteId(id))
    }

    async fn delete_invite(&self, invite_id: &InviteId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM invites WHERE id=?")
            .bind(invite_id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_invites_between(&self, a: &UserId, b: &UserId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM invites
             WHERE (from_user_id=? AND to_user_id=?) OR (from_user_id=? AND to_user_id=?)",
        )
        .bind(a.0)
        .bind(b.0)
        .bind(b.0)
        .bind(a.0)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn delete_invites_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM invites WHERE created_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}
