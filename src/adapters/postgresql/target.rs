//! Target platform stored in PostgreSQL
//!
//! Every `create_*` runs in one transaction that inserts the entity and its
//! `legacy_references` row, so a back reference never outlives a failed
//! insert. Constraint violations surface as `TargetError::Validation`; every
//! other database failure is transient.

use super::client::PgClient;
use crate::adapters::target::upload::{content_checksum, original_filename, stored_file_name};
use crate::adapters::target::{validation, CursorStorage, TargetRepository, TargetResult};
use crate::core::state::cursor::{BatchCursor, StageStatus};
use crate::domain::entities::{
    CategoryAttrs, CreatedTopic, GroupAttrs, LikeAttrs, PostAttrs, PostRecord,
    PrivateMessageAttrs, SubscriptionAttrs, TopicAttrs, Upload, UserAttrs, UserName,
};
use crate::domain::errors::TargetError;
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::{EntityMapping, PostLocation};
use crate::domain::stage::Stage;
use crate::domain::{MigrationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;

/// Schema applied by [`PostgresTarget::ensure_schema`]
pub const SCHEMA_SQL: &str = include_str!("../../../migrations/001_target_schema.sql");

const ARCHETYPE_REGULAR: &str = "regular";
const ARCHETYPE_PRIVATE: &str = "private_message";

pub struct PostgresTarget {
    client: Arc<PgClient>,
    base_url: String,
    uploads_path: PathBuf,
}

impl PostgresTarget {
    pub fn new(client: Arc<PgClient>, base_url: impl Into<String>, uploads_path: PathBuf) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            uploads_path,
        }
    }

    /// Creates missing tables and indexes
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Database` if the schema script fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client.apply_schema(SCHEMA_SQL).await
    }

    pub fn client(&self) -> &PgClient {
        &self.client
    }

    async fn connection(&self) -> TargetResult<deadpool_postgres::Object> {
        self.client
            .get()
            .await
            .map_err(|e| TargetError::ConnectionFailed(e.to_string()))
    }

    fn post_url(&self, topic_id: TargetId, post_number: i32) -> String {
        format!("{}/t/{topic_id}/{post_number}", self.base_url)
    }

    fn location(&self, post_id: TargetId, topic_id: TargetId, user_id: TargetId, post_number: i32) -> PostLocation {
        PostLocation {
            post_id,
            topic_id,
            user_id,
            post_number,
            url: self.post_url(topic_id, post_number),
        }
    }
}

/// Maps constraint violations to validation errors
fn db_error(e: tokio_postgres::Error) -> TargetError {
    let message = e
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string());
    match e.code() {
        Some(code)
            if *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION
                || *code == SqlState::CHECK_VIOLATION =>
        {
            TargetError::validation(message)
        }
        _ => TargetError::QueryFailed(message),
    }
}

fn state_error(e: tokio_postgres::Error) -> MigrationError {
    MigrationError::State(format!("Cursor storage failed: {e}"))
}

fn target_id(row: &Row, column: &str) -> TargetId {
    TargetId::new(row.get::<_, i64>(column))
}

async fn insert_reference(
    tx: &tokio_postgres::Transaction<'_>,
    entity_type: EntityType,
    legacy_id: &LegacyId,
    target_id: TargetId,
) -> TargetResult<()> {
    tx.execute(
        "INSERT INTO legacy_references (entity_type, legacy_id, target_id) VALUES ($1, $2, $3)",
        &[&entity_type.as_str(), &legacy_id.as_str(), &target_id.get()],
    )
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Reserves the next post number of a topic and inserts the post
async fn append_post(
    tx: &tokio_postgres::Transaction<'_>,
    topic_id: TargetId,
    user_id: TargetId,
    raw: &str,
    reply_to_post_number: Option<i32>,
    created_at: Option<DateTime<Utc>>,
) -> TargetResult<(TargetId, i32)> {
    let row = tx
        .query_one(
            "UPDATE topics SET highest_post_number = highest_post_number + 1 \
             WHERE id = $1 RETURNING highest_post_number",
            &[&topic_id.get()],
        )
        .await
        .map_err(db_error)?;
    let post_number: i32 = row.get("highest_post_number");

    let row = tx
        .query_one(
            "INSERT INTO posts (topic_id, user_id, post_number, raw, reply_to_post_number, created_at) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW())) RETURNING id",
            &[
                &topic_id.get(),
                &user_id.get(),
                &post_number,
                &raw,
                &reply_to_post_number,
                &created_at,
            ],
        )
        .await
        .map_err(db_error)?;
    Ok((target_id(&row, "id"), post_number))
}

async fn topic_archetype(
    tx: &tokio_postgres::Transaction<'_>,
    topic_id: TargetId,
) -> TargetResult<String> {
    tx.query_opt("SELECT archetype FROM topics WHERE id = $1", &[&topic_id.get()])
        .await
        .map_err(db_error)?
        .map(|row| row.get("archetype"))
        .ok_or_else(|| TargetError::validation(format!("topic {topic_id} does not exist")))
}

fn upload_from_row(row: &Row) -> Upload {
    Upload {
        id: target_id(row, "id"),
        owner_id: target_id(row, "user_id"),
        original_filename: row.get("original_filename"),
        sha256: row.get("sha256"),
        filesize: row.get::<_, i64>("filesize").max(0) as u64,
        url: row.get("url"),
    }
}

#[async_trait]
impl TargetRepository for PostgresTarget {
    fn name(&self) -> &str {
        "postgresql"
    }

    async fn create_group(&self, attrs: &GroupAttrs) -> TargetResult<TargetId> {
        validation::validate_group(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO groups (name, full_name) VALUES ($1, $2) RETURNING id",
                &[&attrs.name, &attrs.full_name],
            )
            .await
            .map_err(db_error)?;
        let id = target_id(&row, "id");
        insert_reference(&tx, EntityType::Group, &attrs.legacy_id, id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(id)
    }

    async fn create_user(&self, attrs: &UserAttrs) -> TargetResult<TargetId> {
        validation::validate_user(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO users (username, legacy_username, email, name, created_at) \
                 VALUES ($1, $2, $3, $4, COALESCE($5, NOW())) RETURNING id",
                &[
                    &attrs.username,
                    &attrs.legacy_username,
                    &attrs.email,
                    &attrs.name,
                    &attrs.created_at,
                ],
            )
            .await
            .map_err(db_error)?;
        let id = target_id(&row, "id");
        insert_reference(&tx, EntityType::User, &attrs.legacy_id, id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(id)
    }

    async fn create_category(&self, attrs: &CategoryAttrs) -> TargetResult<TargetId> {
        validation::validate_category(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO categories (name, description, parent_id, position) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[
                    &attrs.name,
                    &attrs.description,
                    &attrs.parent_id.map(TargetId::get),
                    &attrs.position,
                ],
            )
            .await
            .map_err(db_error)?;
        let id = target_id(&row, "id");
        insert_reference(&tx, EntityType::Category, &attrs.legacy_id, id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(id)
    }

    async fn create_topic(&self, attrs: &TopicAttrs) -> TargetResult<CreatedTopic> {
        validation::validate_topic(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO topics (title, category_id, user_id, archetype, created_at) \
                 VALUES ($1, $2, $3, $4, COALESCE($5, NOW())) RETURNING id",
                &[
                    &attrs.title,
                    &attrs.category_id.get(),
                    &attrs.user_id.get(),
                    &ARCHETYPE_REGULAR,
                    &attrs.created_at,
                ],
            )
            .await
            .map_err(db_error)?;
        let topic_id = target_id(&row, "id");
        let (post_id, post_number) =
            append_post(&tx, topic_id, attrs.user_id, &attrs.raw, None, attrs.created_at).await?;

        insert_reference(&tx, EntityType::Topic, &attrs.legacy_id, topic_id).await?;
        if let Some(first_post_legacy_id) = &attrs.first_post_legacy_id {
            insert_reference(&tx, EntityType::Post, first_post_legacy_id, post_id).await?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(CreatedTopic {
            topic_id,
            first_post: self.location(post_id, topic_id, attrs.user_id, post_number),
        })
    }

    async fn create_post(&self, attrs: &PostAttrs) -> TargetResult<PostLocation> {
        validation::validate_post(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        if topic_archetype(&tx, attrs.topic_id).await? == ARCHETYPE_PRIVATE {
            return Err(TargetError::validation(format!(
                "topic {} is a private conversation",
                attrs.topic_id
            )));
        }
        let (post_id, post_number) = append_post(
            &tx,
            attrs.topic_id,
            attrs.user_id,
            &attrs.raw,
            attrs.reply_to_post_number,
            attrs.created_at,
        )
        .await?;
        insert_reference(&tx, EntityType::Post, &attrs.legacy_id, post_id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(self.location(post_id, attrs.topic_id, attrs.user_id, post_number))
    }

    async fn create_like(&self, attrs: &LikeAttrs) -> TargetResult<TargetId> {
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO post_likes (post_id, user_id, created_at) \
                 VALUES ($1, $2, COALESCE($3, NOW())) RETURNING id",
                &[&attrs.post_id.get(), &attrs.user_id.get(), &attrs.created_at],
            )
            .await
            .map_err(db_error)?;
        let id = target_id(&row, "id");
        insert_reference(&tx, EntityType::Like, &attrs.legacy_id, id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(id)
    }

    async fn create_subscription(&self, attrs: &SubscriptionAttrs) -> TargetResult<TargetId> {
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;
        let row = tx
            .query_one(
                "INSERT INTO topic_subscriptions (topic_id, user_id) VALUES ($1, $2) RETURNING id",
                &[&attrs.topic_id.get(), &attrs.user_id.get()],
            )
            .await
            .map_err(db_error)?;
        let id = target_id(&row, "id");
        insert_reference(&tx, EntityType::Subscription, &attrs.legacy_id, id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(id)
    }

    async fn create_private_message(
        &self,
        attrs: &PrivateMessageAttrs,
    ) -> TargetResult<PostLocation> {
        validation::validate_private_message(attrs)?;
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_error)?;

        let existing_topic = match attrs.reply_to {
            Some(reply_to) => tx
                .query_opt(
                    "SELECT p.topic_id FROM posts p JOIN topics t ON t.id = p.topic_id \
                     WHERE p.id = $1 AND t.archetype = $2",
                    &[&reply_to.get(), &ARCHETYPE_PRIVATE],
                )
                .await
                .map_err(db_error)?
                .map(|row| target_id(&row, "topic_id")),
            None => None,
        };

        let topic_id = match existing_topic {
            Some(topic_id) => topic_id,
            None => {
                let row = tx
                    .query_one(
                        "INSERT INTO topics (title, user_id, archetype, created_at) \
                         VALUES ($1, $2, $3, COALESCE($4, NOW())) RETURNING id",
                        &[
                            &attrs.title,
                            &attrs.user_id.get(),
                            &ARCHETYPE_PRIVATE,
                            &attrs.created_at,
                        ],
                    )
                    .await
                    .map_err(db_error)?;
                let topic_id = target_id(&row, "id");
                let mut participants = vec![attrs.user_id];
                participants.extend(attrs.recipient_ids.iter().copied());
                participants.sort();
                participants.dedup();
                for participant in participants {
                    tx.execute(
                        "INSERT INTO topic_allowed_users (topic_id, user_id) VALUES ($1, $2) \
                         ON CONFLICT DO NOTHING",
                        &[&topic_id.get(), &participant.get()],
                    )
                    .await
                    .map_err(db_error)?;
                }
                topic_id
            }
        };

        let (post_id, post_number) =
            append_post(&tx, topic_id, attrs.user_id, &attrs.raw, None, attrs.created_at).await?;
        insert_reference(&tx, EntityType::PrivateMessage, &attrs.legacy_id, post_id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(self.location(post_id, topic_id, attrs.user_id, post_number))
    }

    async fn find_by_legacy_id(
        &self,
        entity_type: EntityType,
        legacy_id: &LegacyId,
    ) -> TargetResult<Option<TargetId>> {
        let conn = self.connection().await?;
        let row = conn
            .query_opt(
                "SELECT target_id FROM legacy_references WHERE entity_type = $1 AND legacy_id = $2",
                &[&entity_type.as_str(), &legacy_id.as_str()],
            )
            .await
            .map_err(db_error)?;
        Ok(row.map(|row| target_id(&row, "target_id")))
    }

    async fn find_user_by_email(&self, email: &str) -> TargetResult<Option<TargetId>> {
        let conn = self.connection().await?;
        let row = conn
            .query_opt(
                "SELECT id FROM users WHERE LOWER(email) = LOWER($1)",
                &[&email.trim()],
            )
            .await
            .map_err(db_error)?;
        Ok(row.map(|row| target_id(&row, "id")))
    }

    async fn record_legacy_reference(&self, mapping: &EntityMapping) -> TargetResult<()> {
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO legacy_references (entity_type, legacy_id, target_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
            &[
                &mapping.entity_type.as_str(),
                &mapping.legacy_id.as_str(),
                &mapping.target_id.get(),
            ],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn record_user_alias(&self, user_id: TargetId, alias: &str) -> TargetResult<()> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Ok(());
        }
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO user_aliases (user_id, alias) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&user_id.get(), &alias],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_mappings(
        &self,
        entity_type: EntityType,
        after: Option<&LegacyId>,
        limit: usize,
    ) -> TargetResult<Vec<EntityMapping>> {
        let conn = self.connection().await?;
        let rows = match after {
            Some(after) => {
                conn.query(
                    "SELECT legacy_id, target_id FROM legacy_references \
                     WHERE entity_type = $1 AND legacy_id > $2 ORDER BY legacy_id LIMIT $3",
                    &[&entity_type.as_str(), &after.as_str(), &(limit as i64)],
                )
                .await
            }
            None => {
                conn.query(
                    "SELECT legacy_id, target_id FROM legacy_references \
                     WHERE entity_type = $1 ORDER BY legacy_id LIMIT $2",
                    &[&entity_type.as_str(), &(limit as i64)],
                )
                .await
            }
        }
        .map_err(db_error)?;
        rows.iter()
            .map(|row| {
                let legacy_id = LegacyId::new(row.get::<_, String>("legacy_id"))
                    .map_err(TargetError::QueryFailed)?;
                Ok(EntityMapping::new(entity_type, legacy_id, target_id(row, "target_id")))
            })
            .collect()
    }

    async fn load_post_locations(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostLocation>> {
        let conn = self.connection().await?;
        let after = after.map_or(0, TargetId::get);
        let rows = conn
            .query(
                "SELECT id, topic_id, user_id, post_number FROM posts WHERE id > $1 \
                 ORDER BY id LIMIT $2",
                &[&after, &(limit as i64)],
            )
            .await
            .map_err(db_error)?;
        Ok(rows
            .iter()
            .map(|row| {
                self.location(
                    target_id(row, "id"),
                    target_id(row, "topic_id"),
                    target_id(row, "user_id"),
                    row.get("post_number"),
                )
            })
            .collect())
    }

    async fn load_user_names(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<UserName>> {
        let conn = self.connection().await?;
        let after = after.map_or(0, TargetId::get);
        let rows = conn
            .query(
                "SELECT u.id, u.username, u.legacy_username, \
                 ARRAY(SELECT a.alias FROM user_aliases a WHERE a.user_id = u.id ORDER BY a.id) \
                 AS aliases \
                 FROM users u WHERE u.id > $1 ORDER BY u.id LIMIT $2",
                &[&after, &(limit as i64)],
            )
            .await
            .map_err(db_error)?;
        Ok(rows
            .iter()
            .map(|row| UserName {
                user_id: target_id(row, "id"),
                username: row.get("username"),
                legacy_username: row.get("legacy_username"),
                aliases: row.get("aliases"),
            })
            .collect())
    }

    async fn find_post(&self, post_id: TargetId) -> TargetResult<Option<PostRecord>> {
        let conn = self.connection().await?;
        let row = conn
            .query_opt("SELECT raw FROM posts WHERE id = $1", &[&post_id.get()])
            .await
            .map_err(db_error)?;
        Ok(row.map(|row| PostRecord {
            post_id,
            raw: row.get("raw"),
        }))
    }

    async fn scan_posts(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostRecord>> {
        let conn = self.connection().await?;
        let after = after.map_or(0, TargetId::get);
        let rows = conn
            .query(
                "SELECT id, raw FROM posts WHERE id > $1 ORDER BY id LIMIT $2",
                &[&after, &(limit as i64)],
            )
            .await
            .map_err(db_error)?;
        Ok(rows
            .iter()
            .map(|row| PostRecord {
                post_id: target_id(row, "id"),
                raw: row.get("raw"),
            })
            .collect())
    }

    async fn update_post_raw(&self, post_id: TargetId, raw: &str) -> TargetResult<()> {
        let conn = self.connection().await?;
        let updated = conn
            .execute("UPDATE posts SET raw = $2 WHERE id = $1", &[&post_id.get(), &raw])
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(TargetError::NotFound(format!("post {post_id}")));
        }
        Ok(())
    }

    async fn store_upload(
        &self,
        owner_id: TargetId,
        path: &Path,
        filename: &str,
    ) -> TargetResult<Option<Upload>> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TargetError::Storage(format!("{}: {e}", path.display()))),
        };
        let checksum = content_checksum(&data);

        let conn = self.connection().await?;
        if let Some(row) = conn
            .query_opt("SELECT * FROM uploads WHERE sha256 = $1", &[&checksum])
            .await
            .map_err(db_error)?
        {
            return Ok(Some(upload_from_row(&row)));
        }

        let original = original_filename(path, filename);
        let stored = stored_file_name(&checksum, &original);
        tokio::fs::create_dir_all(&self.uploads_path)
            .await
            .map_err(|e| TargetError::Storage(format!("{}: {e}", self.uploads_path.display())))?;
        let destination = self.uploads_path.join(&stored);
        tokio::fs::write(&destination, &data)
            .await
            .map_err(|e| TargetError::Storage(format!("{}: {e}", destination.display())))?;

        let url = format!("{}/uploads/{stored}", self.base_url);
        let row = conn
            .query_one(
                "INSERT INTO uploads (user_id, original_filename, sha256, filesize, url) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (sha256) DO UPDATE SET sha256 = EXCLUDED.sha256 RETURNING *",
                &[
                    &owner_id.get(),
                    &original,
                    &checksum,
                    &(data.len() as i64),
                    &url,
                ],
            )
            .await
            .map_err(db_error)?;
        Ok(Some(upload_from_row(&row)))
    }

    async fn find_upload(&self, upload_id: TargetId) -> TargetResult<Option<Upload>> {
        let conn = self.connection().await?;
        let row = conn
            .query_opt("SELECT * FROM uploads WHERE id = $1", &[&upload_id.get()])
            .await
            .map_err(db_error)?;
        Ok(row.as_ref().map(upload_from_row))
    }

    async fn tag_topic(&self, topic_id: TargetId, tags: &[String]) -> TargetResult<()> {
        let conn = self.connection().await?;
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }
            conn.execute(
                "INSERT INTO topic_tags (topic_id, tag) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                &[&topic_id.get(), &tag],
            )
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn register_permalink(
        &self,
        path: &str,
        entity_type: EntityType,
        target_id: TargetId,
    ) -> TargetResult<()> {
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO permalinks (path, entity_type, target_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
            &[&path, &entity_type.as_str(), &target_id.get()],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn set_user_avatar(&self, user_id: TargetId, upload_id: TargetId) -> TargetResult<()> {
        let conn = self.connection().await?;
        let updated = conn
            .execute(
                "UPDATE users SET avatar_upload_id = $2 WHERE id = $1",
                &[&user_id.get(), &upload_id.get()],
            )
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(TargetError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn add_group_member(&self, group_id: TargetId, user_id: TargetId) -> TargetResult<()> {
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO group_users (group_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&group_id.get(), &user_id.get()],
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn entity_counts(&self) -> TargetResult<BTreeMap<EntityType, u64>> {
        let conn = self.connection().await?;
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT COUNT(*) FROM groups) AS groups, \
                   (SELECT COUNT(*) FROM users) AS users, \
                   (SELECT COUNT(*) FROM categories) AS categories, \
                   (SELECT COUNT(*) FROM topics WHERE archetype = 'regular') AS topics, \
                   (SELECT COUNT(*) FROM posts p JOIN topics t ON t.id = p.topic_id \
                      WHERE t.archetype = 'regular') AS posts, \
                   (SELECT COUNT(*) FROM uploads) AS attachments, \
                   (SELECT COUNT(*) FROM post_likes) AS likes, \
                   (SELECT COUNT(*) FROM topic_subscriptions) AS subscriptions, \
                   (SELECT COUNT(*) FROM posts p JOIN topics t ON t.id = p.topic_id \
                      WHERE t.archetype = 'private_message') AS private_messages",
                &[],
            )
            .await
            .map_err(db_error)?;

        let columns = [
            (EntityType::Group, "groups"),
            (EntityType::User, "users"),
            (EntityType::Category, "categories"),
            (EntityType::Topic, "topics"),
            (EntityType::Post, "posts"),
            (EntityType::Attachment, "attachments"),
            (EntityType::Like, "likes"),
            (EntityType::Subscription, "subscriptions"),
            (EntityType::PrivateMessage, "private_messages"),
        ];
        Ok(columns
            .into_iter()
            .map(|(entity_type, column)| (entity_type, row.get::<_, i64>(column).max(0) as u64))
            .collect())
    }
}

fn cursor_from_row(row: &Row) -> Result<BatchCursor> {
    let stage: String = row.get("stage");
    let status: String = row.get("status");
    Ok(BatchCursor {
        stage: stage.parse::<Stage>().map_err(MigrationError::State)?,
        last_key: row.get("last_key"),
        rows_processed: row.get::<_, i64>("rows_processed").max(0) as u64,
        status: status.parse::<StageStatus>().map_err(MigrationError::State)?,
        run_id: row.get("run_id"),
        started_at: row.get("started_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl CursorStorage for PostgresTarget {
    async fn load_cursor(&self, stage: Stage) -> Result<Option<BatchCursor>> {
        let conn = self
            .client
            .get()
            .await
            .map_err(|e| MigrationError::Database(e.to_string()))?;
        let row = conn
            .query_opt("SELECT * FROM import_cursors WHERE stage = $1", &[&stage.as_str()])
            .await
            .map_err(state_error)?;
        row.as_ref().map(cursor_from_row).transpose()
    }

    async fn save_cursor(&self, cursor: &BatchCursor) -> Result<()> {
        let conn = self
            .client
            .get()
            .await
            .map_err(|e| MigrationError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO import_cursors \
               (stage, last_key, rows_processed, status, run_id, started_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (stage) DO UPDATE SET \
               last_key = EXCLUDED.last_key, \
               rows_processed = EXCLUDED.rows_processed, \
               status = EXCLUDED.status, \
               run_id = EXCLUDED.run_id, \
               started_at = EXCLUDED.started_at, \
               updated_at = EXCLUDED.updated_at",
            &[
                &cursor.stage.as_str(),
                &cursor.last_key,
                &(cursor.rows_processed as i64),
                &cursor.status.as_str(),
                &cursor.run_id,
                &cursor.started_at,
                &cursor.updated_at,
            ],
        )
        .await
        .map_err(state_error)?;
        Ok(())
    }

    async fn load_all_cursors(&self) -> Result<Vec<BatchCursor>> {
        let conn = self
            .client
            .get()
            .await
            .map_err(|e| MigrationError::Database(e.to_string()))?;
        let rows = conn
            .query("SELECT * FROM import_cursors ORDER BY stage", &[])
            .await
            .map_err(state_error)?;
        rows.iter().map(cursor_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::postgresql::client::PoolOptions;
    use crate::config::secret_string;

    fn target(base_url: &str) -> PostgresTarget {
        let client = PgClient::connect(
            &secret_string("postgresql://ferry@127.0.0.1:1/forum".to_string()),
            &PoolOptions {
                max_connections: 1,
                connection_timeout_seconds: 1,
                statement_timeout_seconds: 0,
                ssl_mode: "disable".to_string(),
            },
        )
        .unwrap();
        PostgresTarget::new(Arc::new(client), base_url, PathBuf::from("./uploads"))
    }

    #[tokio::test]
    async fn test_post_url_uses_base_without_trailing_slash() {
        let target = target("https://forum.example.com/");
        assert_eq!(
            target.post_url(TargetId::new(7), 3),
            "https://forum.example.com/t/7/3"
        );
    }

    #[test]
    fn test_schema_defines_reference_and_cursor_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS legacy_references"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS import_cursors"));
        assert!(SCHEMA_SQL.contains("PRIMARY KEY (entity_type, legacy_id)"));
    }
}
