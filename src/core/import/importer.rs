//! Entity importers
//!
//! Every stage imports its rows through the same contract:
//!
//! 1. a row whose legacy id is already mapped is skipped as already imported
//! 2. every foreign key is resolved through the identity map; an unresolved
//!    required key skips the row with a missing parent issue
//! 3. canonical attributes are built, free text goes through the transform
//!    pipeline and the inline resolution pass
//! 4. the entity is persisted; a rejection skips the row with a validation
//!    issue, any other failure with a transient I/O issue
//! 5. the mapping is recorded and the post-commit hooks run
//!
//! Only step 3 and 4 differ between entity types.

use super::hooks::{CommittedEntity, HookContext, HookRegistry};
use crate::adapters::target::validation::MAX_USERNAME_LENGTH;
use crate::adapters::target::TargetRepository;
use crate::core::identity::{email_key, IdentityMap, TopicLocator};
use crate::core::resolve::{
    scan, ReferenceOrigin, ReferenceResolver, ResolveContext, ResolvePass, Token,
    UnresolvedReference,
};
use crate::core::transform::TransformPipeline;
use crate::domain::entities::{
    CategoryAttrs, GroupAttrs, LikeAttrs, PostAttrs, PrivateMessageAttrs, SubscriptionAttrs,
    TopicAttrs, Upload, UserAttrs,
};
use crate::domain::errors::{RowIssue, TargetError};
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::{EntityMapping, PostLocation};
use crate::domain::row::SourceRow;
use crate::domain::stage::Stage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// How a missing foreign key affects the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyPolicy {
    /// The column must be set and mapped
    Required,
    /// An empty column is fine, a set one must be mapped
    RequiredIfPresent,
    /// Unmapped references are dropped
    Optional,
}

/// Foreign key column of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub entity_type: EntityType,
    pub policy: ForeignKeyPolicy,
}

impl ForeignKey {
    const fn new(field: &'static str, entity_type: EntityType, policy: ForeignKeyPolicy) -> Self {
        Self {
            field,
            entity_type,
            policy,
        }
    }
}

use ForeignKeyPolicy::{Optional, Required, RequiredIfPresent};

const CATEGORY_KEYS: &[ForeignKey] = &[ForeignKey::new(
    "parent_id",
    EntityType::Category,
    RequiredIfPresent,
)];
const TOPIC_KEYS: &[ForeignKey] = &[
    ForeignKey::new("category_id", EntityType::Category, Required),
    ForeignKey::new("user_id", EntityType::User, Required),
];
const POST_KEYS: &[ForeignKey] = &[
    ForeignKey::new("topic_id", EntityType::Topic, Required),
    ForeignKey::new("user_id", EntityType::User, Required),
    ForeignKey::new("reply_to_id", EntityType::Post, Optional),
];
const ATTACHMENT_KEYS: &[ForeignKey] = &[
    ForeignKey::new("post_id", EntityType::Post, Required),
    ForeignKey::new("user_id", EntityType::User, Optional),
];
const LIKE_KEYS: &[ForeignKey] = &[
    ForeignKey::new("post_id", EntityType::Post, Required),
    ForeignKey::new("user_id", EntityType::User, Required),
];
const SUBSCRIPTION_KEYS: &[ForeignKey] = &[
    ForeignKey::new("topic_id", EntityType::Topic, Required),
    ForeignKey::new("user_id", EntityType::User, Required),
];
const PRIVATE_MESSAGE_KEYS: &[ForeignKey] = &[
    ForeignKey::new("user_id", EntityType::User, Required),
    ForeignKey::new("reply_to_id", EntityType::PrivateMessage, Optional),
];

/// Foreign key columns of a stage
///
/// Private message recipients are a list and are resolved by the importer.
pub fn foreign_keys(stage: Stage) -> &'static [ForeignKey] {
    match stage {
        Stage::Groups | Stage::Users => &[],
        Stage::Categories => CATEGORY_KEYS,
        Stage::Topics => TOPIC_KEYS,
        Stage::Posts => POST_KEYS,
        Stage::Attachments => ATTACHMENT_KEYS,
        Stage::Likes => LIKE_KEYS,
        Stage::Subscriptions => SUBSCRIPTION_KEYS,
        Stage::PrivateMessages => PRIVATE_MESSAGE_KEYS,
    }
}

/// Foreign keys of a row resolved to target ids
#[derive(Debug, Clone)]
pub struct ResolvedRefs {
    entity_type: EntityType,
    legacy_id: LegacyId,
    ids: HashMap<&'static str, TargetId>,
}

impl ResolvedRefs {
    pub fn get(&self, field: &str) -> Option<TargetId> {
        self.ids.get(field).copied()
    }

    pub fn required(&self, field: &str) -> Result<TargetId, RowIssue> {
        self.get(field)
            .ok_or_else(|| RowIssue::missing_field(self.entity_type, &self.legacy_id, field))
    }
}

/// Resolves every foreign key of a row through the identity map
pub fn resolve_foreign_keys(
    stage: Stage,
    row: &SourceRow,
    identity: &IdentityMap,
) -> Result<ResolvedRefs, RowIssue> {
    let entity_type = stage.entity_type();
    let mut ids = HashMap::new();

    for key in foreign_keys(stage) {
        let Some(legacy) = row.legacy_ref(key.field) else {
            if key.policy == Required {
                return Err(RowIssue::missing_field(entity_type, &row.legacy_id, key.field));
            }
            continue;
        };
        match identity.lookup(key.entity_type, &legacy) {
            Some(target_id) => {
                ids.insert(key.field, target_id);
            }
            None if key.policy == Optional => {
                tracing::debug!(
                    entity_type = %entity_type,
                    legacy_id = %row.legacy_id,
                    field = key.field,
                    reference = %legacy,
                    "Optional reference not mapped, dropped"
                );
            }
            None => {
                return Err(RowIssue::missing_parent(
                    entity_type,
                    &row.legacy_id,
                    key.entity_type,
                    &legacy,
                ));
            }
        }
    }

    Ok(ResolvedRefs {
        entity_type,
        legacy_id: row.legacy_id.clone(),
        ids,
    })
}

/// Target username derived from a legacy name
///
/// Whitespace becomes `_` and characters outside `[A-Za-z0-9_.-]` are
/// dropped. A name with nothing left falls back to `user<legacy id>`.
pub fn normalize_username(legacy_name: &str, legacy_id: &LegacyId) -> String {
    let mut username = String::new();
    for c in legacy_name.trim().chars() {
        if c.is_whitespace() {
            if !username.ends_with('_') {
                username.push('_');
            }
        } else if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            username.push(c);
        }
    }
    let username: String = username
        .trim_matches(|c| matches!(c, '_' | '.' | '-'))
        .chars()
        .take(MAX_USERNAME_LENGTH)
        .collect();
    if username.is_empty() {
        format!("user{legacy_id}")
    } else {
        username
    }
}

/// Identity state owned by one migration run
#[derive(Debug, Default)]
pub struct RunState {
    pub identity: IdentityMap,
    pub locator: TopicLocator,
    /// Final references left unresolved by the inline pass
    pub unresolved: Vec<UnresolvedReference>,
    /// Deferrable references left for the global pass
    pub pending_references: usize,
}

impl RunState {
    pub fn new(identity: IdentityMap, locator: TopicLocator) -> Self {
        Self {
            identity,
            locator,
            ..Self::default()
        }
    }
}

/// Terminal state of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Imported {
        entity: CommittedEntity,
        hook_failures: usize,
    },
    AlreadyImported,
    Skipped(RowIssue),
}

/// Importer behaviour switches
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Map users sharing an email onto one target user
    pub merge_users_by_email: bool,
    /// Directory attachment paths are relative to
    pub attachments_path: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge_users_by_email: true,
            attachments_path: None,
        }
    }
}

/// What persisting a row produced
struct Persisted {
    target_id: TargetId,
    location: Option<PostLocation>,
    /// Extra mappings committed with the entity
    aliases: Vec<EntityMapping>,
    /// Names the entity can be referenced by
    names: Vec<String>,
    display_name: Option<String>,
    natural_key: Option<String>,
    merged: bool,
    unresolved: Vec<UnresolvedReference>,
    pending: usize,
}

impl Persisted {
    fn new(target_id: TargetId) -> Self {
        Self {
            target_id,
            location: None,
            aliases: Vec::new(),
            names: Vec::new(),
            display_name: None,
            natural_key: None,
            merged: false,
            unresolved: Vec::new(),
            pending: 0,
        }
    }

    fn at(location: PostLocation) -> Self {
        let mut persisted = Self::new(location.post_id);
        persisted.location = Some(location);
        persisted
    }

    fn with_content(mut self, content: ResolvedContent) -> Self {
        self.unresolved = content.unresolved;
        self.pending = content.pending;
        self
    }
}

/// Free text after transformation and inline resolution
struct ResolvedContent {
    raw: String,
    unresolved: Vec<UnresolvedReference>,
    pending: usize,
}

/// Imports rows of every stage into the target
pub struct EntityImporter {
    target: Arc<dyn TargetRepository>,
    pipeline: TransformPipeline,
    resolver: ReferenceResolver,
    hooks: HookRegistry,
    options: ImportOptions,
}

impl EntityImporter {
    pub fn new(
        target: Arc<dyn TargetRepository>,
        pipeline: TransformPipeline,
        hooks: HookRegistry,
        options: ImportOptions,
    ) -> Self {
        Self {
            target,
            pipeline,
            resolver: ReferenceResolver::new(),
            hooks,
            options,
        }
    }

    pub fn target(&self) -> &dyn TargetRepository {
        self.target.as_ref()
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Imports one row of a stage
    pub async fn import_row(&self, stage: Stage, row: &SourceRow, state: &mut RunState) -> RowOutcome {
        let entity_type = stage.entity_type();
        if state.identity.exists(entity_type, &row.legacy_id) {
            return RowOutcome::AlreadyImported;
        }

        let refs = match resolve_foreign_keys(stage, row, &state.identity) {
            Ok(refs) => refs,
            Err(issue) => return RowOutcome::Skipped(issue),
        };

        let persisted = match stage {
            Stage::Groups => self.import_group(row).await,
            Stage::Users => self.import_user(row, state).await,
            Stage::Categories => self.import_category(row, &refs).await,
            Stage::Topics => self.import_topic(row, &refs, state).await,
            Stage::Posts => self.import_post(row, &refs, state).await,
            Stage::Attachments => self.import_attachment(row, &refs, state).await,
            Stage::Likes => self.import_like(row, &refs).await,
            Stage::Subscriptions => self.import_subscription(row, &refs).await,
            Stage::PrivateMessages => self.import_private_message(row, &refs, state).await,
        };
        let persisted = match persisted {
            Ok(persisted) => persisted,
            Err(issue) => return RowOutcome::Skipped(issue),
        };

        let entity = self.commit(entity_type, row, persisted, state);
        let ctx = HookContext {
            target: self.target.as_ref(),
            identity: &state.identity,
        };
        let hook_failures = self.hooks.run(&ctx, &entity, row).await;
        RowOutcome::Imported {
            entity,
            hook_failures,
        }
    }

    /// Records the mapping and everything derived from a persisted row
    fn commit(
        &self,
        entity_type: EntityType,
        row: &SourceRow,
        persisted: Persisted,
        state: &mut RunState,
    ) -> CommittedEntity {
        let target_id = persisted.target_id;
        state
            .identity
            .record(entity_type, row.legacy_id.clone(), target_id);
        for alias in &persisted.aliases {
            state.identity.record_mapping(alias);
        }
        for name in &persisted.names {
            state.identity.record_name(entity_type, name, target_id);
        }
        if let Some(display_name) = &persisted.display_name {
            state
                .identity
                .set_display_name(entity_type, target_id, display_name);
        }
        if let Some(key) = &persisted.natural_key {
            state.identity.record_natural_key(entity_type, key, target_id);
        }
        if let Some(location) = &persisted.location {
            state.locator.record(location.clone());
        }
        state.pending_references += persisted.pending;
        state.unresolved.extend(persisted.unresolved);

        CommittedEntity {
            entity_type,
            legacy_id: row.legacy_id.clone(),
            target_id,
            location: persisted.location,
            merged: persisted.merged,
        }
    }

    /// Runs a content column through the pipeline and the inline pass
    async fn content(
        &self,
        entity_type: EntityType,
        row: &SourceRow,
        field: &str,
        state: &RunState,
    ) -> ResolvedContent {
        let transformed = self.pipeline.apply(&row.text(field));
        let ctx = ResolveContext {
            identity: &state.identity,
            locator: &state.locator,
            target: self.target.as_ref(),
        };
        let origin = ReferenceOrigin::Row {
            entity_type,
            legacy_id: row.legacy_id.clone(),
        };
        let resolution = self
            .resolver
            .resolve(ctx, &transformed, ResolvePass::Inline, &origin)
            .await;
        ResolvedContent {
            raw: resolution.content,
            unresolved: resolution.unresolved,
            pending: resolution.pending,
        }
    }

    async fn import_group(&self, row: &SourceRow) -> Result<Persisted, RowIssue> {
        let attrs = GroupAttrs {
            legacy_id: row.legacy_id.clone(),
            name: row.text("name").trim().to_string(),
            full_name: row.string("full_name"),
        };
        let group_id = self
            .target
            .create_group(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Group, &row.legacy_id, &e))?;
        Ok(Persisted::new(group_id))
    }

    async fn import_user(&self, row: &SourceRow, state: &RunState) -> Result<Persisted, RowIssue> {
        let fail = |e: TargetError| RowIssue::from_target_error(EntityType::User, &row.legacy_id, &e);
        let legacy_username = row.string("username");
        let email = row.string("email");
        let natural_key = email.as_deref().and_then(email_key);

        if self.options.merge_users_by_email {
            if let Some(key) = &natural_key {
                let existing = match state.identity.lookup_natural_key(EntityType::User, key) {
                    Some(user_id) => Some(user_id),
                    None => self.target.find_user_by_email(key).await.map_err(fail)?,
                };
                if let Some(user_id) = existing {
                    // Alias before back reference, a mapped row is never revisited
                    if let Some(alias) = &legacy_username {
                        self.target
                            .record_user_alias(user_id, alias)
                            .await
                            .map_err(fail)?;
                    }
                    let mapping = EntityMapping::new(EntityType::User, row.legacy_id.clone(), user_id);
                    self.target
                        .record_legacy_reference(&mapping)
                        .await
                        .map_err(fail)?;
                    tracing::debug!(
                        legacy_id = %row.legacy_id,
                        user_id = %user_id,
                        "Merged user by email"
                    );
                    let mut persisted = Persisted::new(user_id);
                    persisted.names.extend(legacy_username);
                    persisted.natural_key = natural_key;
                    persisted.merged = true;
                    return Ok(persisted);
                }
            }
        }

        let source_name = legacy_username
            .clone()
            .or_else(|| row.string("name"))
            .unwrap_or_default();
        let attrs = UserAttrs {
            legacy_id: row.legacy_id.clone(),
            username: normalize_username(&source_name, &row.legacy_id),
            legacy_username: legacy_username.clone(),
            email,
            name: row.string("name"),
            created_at: row.timestamp("created_at"),
        };
        let user_id = self.target.create_user(&attrs).await.map_err(fail)?;

        let mut persisted = Persisted::new(user_id);
        persisted.names.push(attrs.username.clone());
        persisted.names.extend(legacy_username);
        persisted.display_name = Some(attrs.username);
        persisted.natural_key = natural_key;
        Ok(persisted)
    }

    async fn import_category(&self, row: &SourceRow, refs: &ResolvedRefs) -> Result<Persisted, RowIssue> {
        let attrs = CategoryAttrs {
            legacy_id: row.legacy_id.clone(),
            name: row.text("name").trim().to_string(),
            description: row.string("description"),
            parent_id: refs.get("parent_id"),
            position: row.i64("position"),
        };
        let category_id = self
            .target
            .create_category(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Category, &row.legacy_id, &e))?;
        Ok(Persisted::new(category_id))
    }

    async fn import_topic(
        &self,
        row: &SourceRow,
        refs: &ResolvedRefs,
        state: &RunState,
    ) -> Result<Persisted, RowIssue> {
        let content = self.content(EntityType::Topic, row, "body", state).await;
        let first_post_legacy_id = row.legacy_ref("first_post_id");
        let attrs = TopicAttrs {
            legacy_id: row.legacy_id.clone(),
            title: row.text("title").trim().to_string(),
            category_id: refs.required("category_id")?,
            user_id: refs.required("user_id")?,
            raw: content.raw.clone(),
            first_post_legacy_id: first_post_legacy_id.clone(),
            created_at: row.timestamp("created_at"),
        };
        let created = self
            .target
            .create_topic(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Topic, &row.legacy_id, &e))?;

        let mut persisted = Persisted::new(created.topic_id).with_content(content);
        if let Some(first_post) = first_post_legacy_id {
            persisted.aliases.push(EntityMapping::new(
                EntityType::Post,
                first_post,
                created.first_post.post_id,
            ));
        }
        persisted.location = Some(created.first_post);
        Ok(persisted)
    }

    async fn import_post(
        &self,
        row: &SourceRow,
        refs: &ResolvedRefs,
        state: &RunState,
    ) -> Result<Persisted, RowIssue> {
        let topic_id = refs.required("topic_id")?;
        let reply_to_post_number = refs
            .get("reply_to_id")
            .and_then(|reply_to| state.locator.post_number_in(reply_to, topic_id));
        let content = self.content(EntityType::Post, row, "body", state).await;
        let attrs = PostAttrs {
            legacy_id: row.legacy_id.clone(),
            topic_id,
            user_id: refs.required("user_id")?,
            raw: content.raw.clone(),
            reply_to_post_number,
            created_at: row.timestamp("created_at"),
        };
        let location = self
            .target
            .create_post(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Post, &row.legacy_id, &e))?;
        Ok(Persisted::at(location).with_content(content))
    }

    /// Stores the file, embeds it in its post and records the reference
    ///
    /// Uploads are deduplicated by content, so a retried row reuses the
    /// upload stored by an earlier attempt.
    async fn import_attachment(
        &self,
        row: &SourceRow,
        refs: &ResolvedRefs,
        state: &RunState,
    ) -> Result<Persisted, RowIssue> {
        let legacy_id = &row.legacy_id;
        let fail = |e: TargetError| RowIssue::from_target_error(EntityType::Attachment, legacy_id, &e);

        let post_id = refs.required("post_id")?;
        let owner_id = refs
            .get("user_id")
            .or_else(|| state.locator.get(post_id).map(|location| location.user_id))
            .ok_or_else(|| RowIssue::missing_field(EntityType::Attachment, legacy_id, "user_id"))?;
        let relative = row.str("path").ok_or_else(|| {
            RowIssue::validation(EntityType::Attachment, legacy_id, "attachment path is empty")
        })?;
        let path = match &self.options.attachments_path {
            Some(base) => base.join(relative),
            None => PathBuf::from(relative),
        };

        let upload = self
            .target
            .store_upload(owner_id, &path, row.str("filename").unwrap_or_default())
            .await
            .map_err(fail)?
            .ok_or_else(|| {
                RowIssue::transient(
                    EntityType::Attachment,
                    Some(legacy_id),
                    format!("attachment file {} not found", path.display()),
                )
            })?;

        let embedded = self.embed_attachment(legacy_id, post_id, &upload).await?;

        self.target
            .record_legacy_reference(&EntityMapping::new(
                EntityType::Attachment,
                legacy_id.clone(),
                upload.id,
            ))
            .await
            .map_err(|e| {
                let detail = if embedded {
                    format!(
                        "post {post_id} already embeds upload {}, recording the attachment failed: {e}",
                        upload.id
                    )
                } else {
                    format!("recording the attachment failed: {e}")
                };
                RowIssue::transient(EntityType::Attachment, Some(legacy_id), detail)
            })?;
        Ok(Persisted::new(upload.id))
    }

    /// Appends upload markup to a post that does not reference it yet
    ///
    /// A post carrying an attachment token is left to the global pass. The
    /// append is skipped when the post already shows the upload, so a retried
    /// row never embeds it twice. Returns whether the post was rewritten.
    async fn embed_attachment(
        &self,
        legacy_id: &LegacyId,
        post_id: TargetId,
        upload: &Upload,
    ) -> Result<bool, RowIssue> {
        let fail = |e: TargetError| RowIssue::from_target_error(EntityType::Attachment, legacy_id, &e);
        let post = self
            .target
            .find_post(post_id)
            .await
            .map_err(fail)?
            .ok_or_else(|| {
                RowIssue::validation(
                    EntityType::Attachment,
                    legacy_id,
                    format!("post {post_id} does not exist"),
                )
            })?;

        let has_token = scan(&post.raw).iter().any(|located| {
            matches!(&located.token, Token::Attachment { attachment_id } if attachment_id == legacy_id.as_str())
        });
        if has_token || post.raw.contains(&upload.url) {
            return Ok(false);
        }

        let markup = self.target.render_reference_markup(upload);
        let raw = if post.raw.trim().is_empty() {
            markup
        } else {
            format!("{}\n\n{markup}", post.raw.trim_end())
        };
        self.target
            .update_post_raw(post_id, &raw)
            .await
            .map_err(fail)?;
        Ok(true)
    }

    async fn import_like(&self, row: &SourceRow, refs: &ResolvedRefs) -> Result<Persisted, RowIssue> {
        let attrs = LikeAttrs {
            legacy_id: row.legacy_id.clone(),
            post_id: refs.required("post_id")?,
            user_id: refs.required("user_id")?,
            created_at: row.timestamp("created_at"),
        };
        let like_id = self
            .target
            .create_like(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Like, &row.legacy_id, &e))?;
        Ok(Persisted::new(like_id))
    }

    async fn import_subscription(
        &self,
        row: &SourceRow,
        refs: &ResolvedRefs,
    ) -> Result<Persisted, RowIssue> {
        let attrs = SubscriptionAttrs {
            legacy_id: row.legacy_id.clone(),
            topic_id: refs.required("topic_id")?,
            user_id: refs.required("user_id")?,
        };
        let subscription_id = self
            .target
            .create_subscription(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(EntityType::Subscription, &row.legacy_id, &e))?;
        Ok(Persisted::new(subscription_id))
    }

    async fn import_private_message(
        &self,
        row: &SourceRow,
        refs: &ResolvedRefs,
        state: &RunState,
    ) -> Result<Persisted, RowIssue> {
        let entity_type = EntityType::PrivateMessage;
        let legacy_recipients = row.legacy_refs("recipient_ids");
        let Some(first_recipient) = legacy_recipients.first() else {
            return Err(RowIssue::missing_field(entity_type, &row.legacy_id, "recipient_ids"));
        };

        let mut recipient_ids = Vec::new();
        for legacy in &legacy_recipients {
            match state.identity.lookup(EntityType::User, legacy) {
                Some(user_id) if !recipient_ids.contains(&user_id) => recipient_ids.push(user_id),
                Some(_) => {}
                None => tracing::debug!(
                    legacy_id = %row.legacy_id,
                    recipient = %legacy,
                    "Recipient not mapped, dropped"
                ),
            }
        }
        if recipient_ids.is_empty() {
            return Err(RowIssue::missing_parent(
                entity_type,
                &row.legacy_id,
                EntityType::User,
                first_recipient,
            ));
        }

        let content = self.content(entity_type, row, "body", state).await;
        let attrs = PrivateMessageAttrs {
            legacy_id: row.legacy_id.clone(),
            title: row.text("title").trim().to_string(),
            user_id: refs.required("user_id")?,
            recipient_ids,
            raw: content.raw.clone(),
            reply_to: refs.get("reply_to_id"),
            created_at: row.timestamp("created_at"),
        };
        let location = self
            .target
            .create_private_message(&attrs)
            .await
            .map_err(|e| RowIssue::from_target_error(entity_type, &row.legacy_id, &e))?;
        Ok(Persisted::at(location).with_content(content))
    }
}
