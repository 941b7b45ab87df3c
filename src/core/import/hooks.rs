//! Post-commit hooks
//!
//! A hook runs after an entity and its mapping have been committed. It
//! receives the committed entity together with the source row and may create
//! side entities on the target. A failing hook is logged and counted; the
//! row stays imported.

use crate::adapters::target::TargetRepository;
use crate::config::HooksConfig;
use crate::core::identity::IdentityMap;
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::PostLocation;
use crate::domain::row::SourceRow;
use crate::domain::{MigrationError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// Entity that has just been persisted and mapped
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedEntity {
    pub entity_type: EntityType,
    pub legacy_id: LegacyId,
    pub target_id: TargetId,
    /// Location of the entity when it is a post
    pub location: Option<PostLocation>,
    /// Mapped onto an existing entity by a natural key
    pub merged: bool,
}

/// What a hook may use while it runs
pub struct HookContext<'a> {
    pub target: &'a dyn TargetRepository,
    pub identity: &'a IdentityMap,
}

#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &str;

    fn applies_to(&self, entity_type: EntityType) -> bool;

    async fn after_commit(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> Result<()>;
}

/// Ordered set of hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn PostCommitHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in hooks enabled in configuration
    pub fn from_config(config: &HooksConfig, avatars_path: Option<PathBuf>) -> Self {
        let mut registry = Self::new();
        if config.tags {
            registry.register(TagHook);
        }
        if config.permalinks {
            registry.register(PermalinkHook::new(
                config.topic_permalink.clone(),
                config.post_permalink.clone(),
                config.category_permalink.clone(),
            ));
        }
        if config.avatars {
            registry.register(AvatarHook::new(avatars_path));
        }
        if config.group_membership {
            registry.register(GroupMembershipHook);
        }
        registry
    }

    pub fn register(&mut self, hook: impl PostCommitHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every applicable hook and returns the number of failures
    pub async fn run(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> usize {
        let mut failures = 0;
        for hook in self
            .hooks
            .iter()
            .filter(|hook| hook.applies_to(entity.entity_type))
        {
            if let Err(e) = hook.after_commit(ctx, entity, row).await {
                tracing::warn!(
                    hook = hook.name(),
                    entity_type = %entity.entity_type,
                    legacy_id = %entity.legacy_id,
                    error = %e,
                    "Post-commit hook failed"
                );
                failures += 1;
            }
        }
        failures
    }
}

/// Assigns the row's `tags` to an imported topic
pub struct TagHook;

#[async_trait]
impl PostCommitHook for TagHook {
    fn name(&self) -> &str {
        "tags"
    }

    fn applies_to(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::Topic
    }

    async fn after_commit(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> Result<()> {
        let mut tags: Vec<String> = Vec::new();
        for tag in row.string_list("tags") {
            let tag = tag.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        if tags.is_empty() {
            return Ok(());
        }
        ctx.target.tag_topic(entity.target_id, &tags).await?;
        Ok(())
    }
}

/// Registers the legacy URL of a topic, post or category as a permalink
///
/// The URL comes from the row's `legacy_url` field or, when absent, from the
/// template configured for the entity type with `{id}` replaced by the
/// legacy id.
pub struct PermalinkHook {
    topic_template: Option<String>,
    post_template: Option<String>,
    category_template: Option<String>,
}

impl PermalinkHook {
    pub fn new(
        topic_template: Option<String>,
        post_template: Option<String>,
        category_template: Option<String>,
    ) -> Self {
        Self {
            topic_template,
            post_template,
            category_template,
        }
    }

    fn template(&self, entity_type: EntityType) -> Option<&str> {
        match entity_type {
            EntityType::Topic => self.topic_template.as_deref(),
            EntityType::Post => self.post_template.as_deref(),
            EntityType::Category => self.category_template.as_deref(),
            _ => None,
        }
    }
}

#[async_trait]
impl PostCommitHook for PermalinkHook {
    fn name(&self) -> &str {
        "permalinks"
    }

    fn applies_to(&self, entity_type: EntityType) -> bool {
        matches!(
            entity_type,
            EntityType::Topic | EntityType::Post | EntityType::Category
        )
    }

    async fn after_commit(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> Result<()> {
        let legacy_url = match row.str("legacy_url") {
            Some(url) => url.to_string(),
            None => match self.template(entity.entity_type) {
                Some(template) => template.replace("{id}", entity.legacy_id.as_str()),
                None => return Ok(()),
            },
        };
        let path = normalize_permalink(&legacy_url).ok_or_else(|| {
            MigrationError::Validation(format!("Invalid legacy URL '{legacy_url}'"))
        })?;
        ctx.target
            .register_permalink(&path, entity.entity_type, entity.target_id)
            .await?;
        Ok(())
    }
}

/// Path and query of a legacy URL without the leading slash
///
/// Accepts absolute URLs and paths relative to the legacy site root.
pub fn normalize_permalink(legacy_url: &str) -> Option<String> {
    let legacy_url = legacy_url.trim();
    let url = match Url::parse(legacy_url) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let root = Url::parse("http://legacy.invalid/").ok()?;
            root.join(legacy_url).ok()?
        }
        Err(_) => return None,
    };
    let mut path = url.path().trim_start_matches('/').to_string();
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    (!path.is_empty()).then_some(path)
}

/// Imports the row's `avatar_path` as the user's avatar
///
/// A legacy account merged into an existing user keeps that user's avatar.
pub struct AvatarHook {
    avatars_path: Option<PathBuf>,
}

impl AvatarHook {
    pub fn new(avatars_path: Option<PathBuf>) -> Self {
        Self { avatars_path }
    }
}

#[async_trait]
impl PostCommitHook for AvatarHook {
    fn name(&self) -> &str {
        "avatars"
    }

    fn applies_to(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::User
    }

    async fn after_commit(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> Result<()> {
        if entity.merged {
            return Ok(());
        }
        let Some(relative) = row.str("avatar_path") else {
            return Ok(());
        };
        let path = match &self.avatars_path {
            Some(base) => base.join(relative),
            None => PathBuf::from(relative),
        };
        let upload = ctx
            .target
            .store_upload(entity.target_id, &path, "")
            .await?
            .ok_or_else(|| {
                MigrationError::Io(format!("Avatar file {} not found", path.display()))
            })?;
        ctx.target
            .set_user_avatar(entity.target_id, upload.id)
            .await?;
        Ok(())
    }
}

/// Adds an imported user to the groups named by the row's `group_ids`
pub struct GroupMembershipHook;

#[async_trait]
impl PostCommitHook for GroupMembershipHook {
    fn name(&self) -> &str {
        "group_membership"
    }

    fn applies_to(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::User
    }

    async fn after_commit(
        &self,
        ctx: &HookContext<'_>,
        entity: &CommittedEntity,
        row: &SourceRow,
    ) -> Result<()> {
        let mut legacy_groups = row.legacy_refs("group_ids");
        legacy_groups.extend(row.legacy_ref("group_id"));

        let mut first_error = None;
        for legacy_group in legacy_groups {
            let Some(group_id) = ctx.identity.lookup(EntityType::Group, &legacy_group) else {
                tracing::debug!(
                    user_id = %entity.target_id,
                    legacy_group = %legacy_group,
                    "Group not mapped, membership ignored"
                );
                continue;
            };
            if let Err(e) = ctx.target.add_group_member(group_id, entity.target_id).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
