//! In-memory target repository
//!
//! Keeps every entity in process memory behind a mutex. It enforces the
//! validation rules of the real target (blank fields, unique usernames and
//! emails, unique back references) so importer behaviour can be exercised
//! without a database.

use super::upload::{content_checksum, original_filename, stored_file_name};
use super::validation;
use super::{CursorStorage, TargetRepository, TargetResult};
use crate::core::state::cursor::BatchCursor;
use crate::domain::entities::{
    CategoryAttrs, CreatedTopic, GroupAttrs, LikeAttrs, PostAttrs, PostRecord,
    PrivateMessageAttrs, SubscriptionAttrs, TopicAttrs, Upload, UserAttrs, UserName,
};
use crate::domain::errors::TargetError;
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::{EntityMapping, PostLocation};
use crate::domain::stage::Stage;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryUser {
    pub username: String,
    pub legacy_username: Option<String>,
    pub email: Option<String>,
    pub avatar_upload_id: Option<TargetId>,
    /// Legacy names of merged accounts
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTopic {
    pub title: String,
    pub category_id: Option<TargetId>,
    pub user_id: TargetId,
    pub tags: Vec<String>,
    /// Participants when the topic is a private conversation
    pub participants: Option<Vec<TargetId>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPost {
    pub topic_id: TargetId,
    pub user_id: TargetId,
    pub raw: String,
    pub post_number: i32,
    pub reply_to_post_number: Option<i32>,
    pub private_message: bool,
}

#[derive(Debug, Default)]
struct State {
    sequences: HashMap<&'static str, i64>,
    groups: BTreeMap<TargetId, GroupAttrs>,
    users: BTreeMap<TargetId, MemoryUser>,
    categories: BTreeMap<TargetId, CategoryAttrs>,
    topics: BTreeMap<TargetId, MemoryTopic>,
    posts: BTreeMap<TargetId, MemoryPost>,
    likes: BTreeSet<(TargetId, TargetId)>,
    like_ids: BTreeMap<TargetId, (TargetId, TargetId)>,
    subscriptions: BTreeMap<TargetId, (TargetId, TargetId)>,
    uploads: BTreeMap<TargetId, Upload>,
    uploads_by_checksum: HashMap<String, TargetId>,
    references: BTreeMap<(EntityType, LegacyId), TargetId>,
    permalinks: BTreeMap<String, (EntityType, TargetId)>,
    group_members: BTreeSet<(TargetId, TargetId)>,
    cursors: BTreeMap<Stage, BatchCursor>,
    failing: HashSet<(EntityType, LegacyId)>,
    failing_references: HashSet<(EntityType, LegacyId)>,
    create_calls: u64,
}

impl State {
    fn next_id(&mut self, table: &'static str) -> TargetId {
        let next = self.sequences.entry(table).or_insert(0);
        *next += 1;
        TargetId::new(*next)
    }

    /// Common preconditions of every create call
    fn begin_create(&mut self, entity_type: EntityType, legacy_id: &LegacyId) -> TargetResult<()> {
        self.create_calls += 1;
        if self.failing.remove(&(entity_type, legacy_id.clone())) {
            return Err(TargetError::QueryFailed(format!(
                "simulated failure creating {entity_type} {legacy_id}"
            )));
        }
        if self.references.contains_key(&(entity_type, legacy_id.clone())) {
            return Err(TargetError::validation(format!(
                "legacy {entity_type} {legacy_id} has already been imported"
            )));
        }
        Ok(())
    }

    fn reference(&mut self, entity_type: EntityType, legacy_id: &LegacyId, target_id: TargetId) {
        self.references
            .insert((entity_type, legacy_id.clone()), target_id);
    }

    fn append_post(
        &mut self,
        base_url: &str,
        topic_id: TargetId,
        user_id: TargetId,
        raw: &str,
        reply_to_post_number: Option<i32>,
        private_message: bool,
    ) -> PostLocation {
        let post_number = self
            .posts
            .values()
            .filter(|post| post.topic_id == topic_id)
            .count() as i32
            + 1;
        let post_id = self.next_id("posts");
        self.posts.insert(
            post_id,
            MemoryPost {
                topic_id,
                user_id,
                raw: raw.to_string(),
                post_number,
                reply_to_post_number,
                private_message,
            },
        );
        PostLocation {
            post_id,
            topic_id,
            user_id,
            post_number,
            url: post_url(base_url, topic_id, post_number),
        }
    }

    fn require_user(&self, user_id: TargetId) -> TargetResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(TargetError::validation(format!("user {user_id} does not exist")))
        }
    }

    fn require_topic(&self, topic_id: TargetId) -> TargetResult<&MemoryTopic> {
        self.topics
            .get(&topic_id)
            .ok_or_else(|| TargetError::validation(format!("topic {topic_id} does not exist")))
    }
}

fn post_url(base_url: &str, topic_id: TargetId, post_number: i32) -> String {
    format!("{}/t/{topic_id}/{post_number}", base_url.trim_end_matches('/'))
}

/// Target repository held in memory
#[derive(Debug, Default)]
pub struct MemoryTarget {
    base_url: String,
    state: Mutex<State>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix for post and upload URLs
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-operation
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next create of a legacy entity fail with a transient error
    pub fn fail_next_create(&self, entity_type: EntityType, legacy_id: LegacyId) {
        self.state().failing.insert((entity_type, legacy_id));
    }

    /// Makes the next extra back reference of a legacy entity fail with a
    /// transient error
    pub fn fail_next_reference(&self, entity_type: EntityType, legacy_id: LegacyId) {
        self.state().failing_references.insert((entity_type, legacy_id));
    }

    /// Number of create calls received, including rejected ones
    pub fn create_calls(&self) -> u64 {
        self.state().create_calls
    }

    pub fn user(&self, user_id: TargetId) -> Option<MemoryUser> {
        self.state().users.get(&user_id).cloned()
    }

    pub fn topic(&self, topic_id: TargetId) -> Option<MemoryTopic> {
        self.state().topics.get(&topic_id).cloned()
    }

    pub fn post(&self, post_id: TargetId) -> Option<MemoryPost> {
        self.state().posts.get(&post_id).cloned()
    }

    /// Post addressed by the legacy id of its source row
    pub fn post_by_legacy_id(&self, entity_type: EntityType, legacy_id: &LegacyId) -> Option<MemoryPost> {
        let state = self.state();
        let post_id = state.references.get(&(entity_type, legacy_id.clone()))?;
        state.posts.get(post_id).cloned()
    }

    /// Every persisted back reference in key order
    pub fn references(&self) -> Vec<EntityMapping> {
        self.state()
            .references
            .iter()
            .map(|((entity_type, legacy_id), target_id)| {
                EntityMapping::new(*entity_type, legacy_id.clone(), *target_id)
            })
            .collect()
    }

    /// Raw content of every post keyed by its back references
    pub fn post_raws(&self) -> BTreeMap<(EntityType, LegacyId), String> {
        let state = self.state();
        state
            .references
            .iter()
            .filter(|((entity_type, _), _)| {
                matches!(entity_type, EntityType::Post | EntityType::PrivateMessage)
            })
            .filter_map(|(key, post_id)| {
                state.posts.get(post_id).map(|post| (key.clone(), post.raw.clone()))
            })
            .collect()
    }

    pub fn permalinks(&self) -> BTreeMap<String, (EntityType, TargetId)> {
        self.state().permalinks.clone()
    }

    pub fn group_members(&self) -> BTreeSet<(TargetId, TargetId)> {
        self.state().group_members.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.state().uploads.len()
    }
}

#[async_trait]
impl TargetRepository for MemoryTarget {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_group(&self, attrs: &GroupAttrs) -> TargetResult<TargetId> {
        validation::validate_group(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::Group, &attrs.legacy_id)?;
        if state
            .groups
            .values()
            .any(|group| group.name.eq_ignore_ascii_case(&attrs.name))
        {
            return Err(TargetError::validation(format!(
                "group name '{}' is already taken",
                attrs.name
            )));
        }
        let id = state.next_id("groups");
        state.groups.insert(id, attrs.clone());
        state.reference(EntityType::Group, &attrs.legacy_id, id);
        Ok(id)
    }

    async fn create_user(&self, attrs: &UserAttrs) -> TargetResult<TargetId> {
        validation::validate_user(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::User, &attrs.legacy_id)?;

        let mut reasons = Vec::new();
        if state
            .users
            .values()
            .any(|user| user.username.eq_ignore_ascii_case(&attrs.username))
        {
            reasons.push(format!("username '{}' is already taken", attrs.username));
        }
        if let Some(email) = &attrs.email {
            if state.users.values().any(|user| {
                user.email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
            }) {
                reasons.push(format!("email '{email}' is already taken"));
            }
        }
        if !reasons.is_empty() {
            return Err(TargetError::Validation(reasons));
        }

        let id = state.next_id("users");
        state.users.insert(
            id,
            MemoryUser {
                username: attrs.username.clone(),
                legacy_username: attrs.legacy_username.clone(),
                email: attrs.email.clone(),
                avatar_upload_id: None,
                aliases: Vec::new(),
            },
        );
        state.reference(EntityType::User, &attrs.legacy_id, id);
        Ok(id)
    }

    async fn create_category(&self, attrs: &CategoryAttrs) -> TargetResult<TargetId> {
        validation::validate_category(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::Category, &attrs.legacy_id)?;
        if let Some(parent_id) = attrs.parent_id {
            if !state.categories.contains_key(&parent_id) {
                return Err(TargetError::validation(format!(
                    "parent category {parent_id} does not exist"
                )));
            }
        }
        let id = state.next_id("categories");
        state.categories.insert(id, attrs.clone());
        state.reference(EntityType::Category, &attrs.legacy_id, id);
        Ok(id)
    }

    async fn create_topic(&self, attrs: &TopicAttrs) -> TargetResult<CreatedTopic> {
        validation::validate_topic(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::Topic, &attrs.legacy_id)?;
        if let Some(first_post) = &attrs.first_post_legacy_id {
            if state
                .references
                .contains_key(&(EntityType::Post, first_post.clone()))
            {
                return Err(TargetError::validation(format!(
                    "legacy post {first_post} has already been imported"
                )));
            }
        }
        state.require_user(attrs.user_id)?;
        if !state.categories.contains_key(&attrs.category_id) {
            return Err(TargetError::validation(format!(
                "category {} does not exist",
                attrs.category_id
            )));
        }

        let topic_id = state.next_id("topics");
        state.topics.insert(
            topic_id,
            MemoryTopic {
                title: attrs.title.clone(),
                category_id: Some(attrs.category_id),
                user_id: attrs.user_id,
                tags: Vec::new(),
                participants: None,
            },
        );
        let first_post = state.append_post(
            &self.base_url,
            topic_id,
            attrs.user_id,
            &attrs.raw,
            None,
            false,
        );
        state.reference(EntityType::Topic, &attrs.legacy_id, topic_id);
        if let Some(first_post_legacy_id) = &attrs.first_post_legacy_id {
            state.reference(EntityType::Post, first_post_legacy_id, first_post.post_id);
        }
        Ok(CreatedTopic {
            topic_id,
            first_post,
        })
    }

    async fn create_post(&self, attrs: &PostAttrs) -> TargetResult<PostLocation> {
        validation::validate_post(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::Post, &attrs.legacy_id)?;
        state.require_user(attrs.user_id)?;
        if state.require_topic(attrs.topic_id)?.participants.is_some() {
            return Err(TargetError::validation(format!(
                "topic {} is a private conversation",
                attrs.topic_id
            )));
        }
        let location = state.append_post(
            &self.base_url,
            attrs.topic_id,
            attrs.user_id,
            &attrs.raw,
            attrs.reply_to_post_number,
            false,
        );
        state.reference(EntityType::Post, &attrs.legacy_id, location.post_id);
        Ok(location)
    }

    async fn create_like(&self, attrs: &LikeAttrs) -> TargetResult<TargetId> {
        let mut state = self.state();
        state.begin_create(EntityType::Like, &attrs.legacy_id)?;
        state.require_user(attrs.user_id)?;
        if !state.posts.contains_key(&attrs.post_id) {
            return Err(TargetError::validation(format!(
                "post {} does not exist",
                attrs.post_id
            )));
        }
        if !state.likes.insert((attrs.post_id, attrs.user_id)) {
            return Err(TargetError::validation(format!(
                "user {} already liked post {}",
                attrs.user_id, attrs.post_id
            )));
        }
        let id = state.next_id("likes");
        state.like_ids.insert(id, (attrs.post_id, attrs.user_id));
        state.reference(EntityType::Like, &attrs.legacy_id, id);
        Ok(id)
    }

    async fn create_subscription(&self, attrs: &SubscriptionAttrs) -> TargetResult<TargetId> {
        let mut state = self.state();
        state.begin_create(EntityType::Subscription, &attrs.legacy_id)?;
        state.require_user(attrs.user_id)?;
        state.require_topic(attrs.topic_id)?;
        if state
            .subscriptions
            .values()
            .any(|existing| *existing == (attrs.topic_id, attrs.user_id))
        {
            return Err(TargetError::validation(format!(
                "user {} is already watching topic {}",
                attrs.user_id, attrs.topic_id
            )));
        }
        let id = state.next_id("subscriptions");
        state
            .subscriptions
            .insert(id, (attrs.topic_id, attrs.user_id));
        state.reference(EntityType::Subscription, &attrs.legacy_id, id);
        Ok(id)
    }

    async fn create_private_message(
        &self,
        attrs: &PrivateMessageAttrs,
    ) -> TargetResult<PostLocation> {
        validation::validate_private_message(attrs)?;
        let mut state = self.state();
        state.begin_create(EntityType::PrivateMessage, &attrs.legacy_id)?;
        state.require_user(attrs.user_id)?;
        for recipient in &attrs.recipient_ids {
            state.require_user(*recipient)?;
        }

        let existing_topic = match attrs.reply_to {
            Some(reply_to) => state
                .posts
                .get(&reply_to)
                .filter(|post| post.private_message)
                .map(|post| post.topic_id),
            None => None,
        };
        let topic_id = match existing_topic {
            Some(topic_id) => topic_id,
            None => {
                let mut participants = vec![attrs.user_id];
                participants.extend(attrs.recipient_ids.iter().copied());
                participants.sort();
                participants.dedup();
                let topic_id = state.next_id("topics");
                state.topics.insert(
                    topic_id,
                    MemoryTopic {
                        title: attrs.title.clone(),
                        category_id: None,
                        user_id: attrs.user_id,
                        tags: Vec::new(),
                        participants: Some(participants),
                    },
                );
                topic_id
            }
        };

        let location = state.append_post(
            &self.base_url,
            topic_id,
            attrs.user_id,
            &attrs.raw,
            None,
            true,
        );
        state.reference(EntityType::PrivateMessage, &attrs.legacy_id, location.post_id);
        Ok(location)
    }

    async fn find_by_legacy_id(
        &self,
        entity_type: EntityType,
        legacy_id: &LegacyId,
    ) -> TargetResult<Option<TargetId>> {
        Ok(self
            .state()
            .references
            .get(&(entity_type, legacy_id.clone()))
            .copied())
    }

    async fn find_user_by_email(&self, email: &str) -> TargetResult<Option<TargetId>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|(_, user)| {
                user.email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email.trim()))
            })
            .map(|(id, _)| *id))
    }

    async fn record_legacy_reference(&self, mapping: &EntityMapping) -> TargetResult<()> {
        let mut state = self.state();
        let key = (mapping.entity_type, mapping.legacy_id.clone());
        if state.failing_references.remove(&key) {
            return Err(TargetError::QueryFailed(format!(
                "simulated failure recording {} {}",
                mapping.entity_type, mapping.legacy_id
            )));
        }
        state.references.entry(key).or_insert(mapping.target_id);
        Ok(())
    }

    async fn record_user_alias(&self, user_id: TargetId, alias: &str) -> TargetResult<()> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| TargetError::NotFound(format!("user {user_id}")))?;
        let alias = alias.trim();
        if !alias.is_empty() && !user.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
            user.aliases.push(alias.to_string());
        }
        Ok(())
    }

    async fn load_mappings(
        &self,
        entity_type: EntityType,
        after: Option<&LegacyId>,
        limit: usize,
    ) -> TargetResult<Vec<EntityMapping>> {
        use std::ops::Bound;

        let state = self.state();
        let lower = match after {
            Some(after) => Bound::Excluded((entity_type, after.clone())),
            None => Bound::Unbounded,
        };
        Ok(state
            .references
            .range((lower, Bound::Unbounded))
            .skip_while(|((kind, _), _)| *kind < entity_type)
            .take_while(|((kind, _), _)| *kind == entity_type)
            .take(limit)
            .map(|((kind, legacy_id), target_id)| {
                EntityMapping::new(*kind, legacy_id.clone(), *target_id)
            })
            .collect())
    }

    async fn load_post_locations(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostLocation>> {
        use std::ops::Bound;

        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(self
            .state()
            .posts
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(post_id, post)| PostLocation {
                post_id: *post_id,
                topic_id: post.topic_id,
                user_id: post.user_id,
                post_number: post.post_number,
                url: post_url(&self.base_url, post.topic_id, post.post_number),
            })
            .collect())
    }

    async fn load_user_names(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<UserName>> {
        use std::ops::Bound;

        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(self
            .state()
            .users
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(user_id, user)| UserName {
                user_id: *user_id,
                username: user.username.clone(),
                legacy_username: user.legacy_username.clone(),
                aliases: user.aliases.clone(),
            })
            .collect())
    }

    async fn find_post(&self, post_id: TargetId) -> TargetResult<Option<PostRecord>> {
        Ok(self.state().posts.get(&post_id).map(|post| PostRecord {
            post_id,
            raw: post.raw.clone(),
        }))
    }

    async fn scan_posts(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostRecord>> {
        let state = self.state();
        let page = state
            .posts
            .iter()
            .filter(|(post_id, _)| after.map_or(true, |after| **post_id > after))
            .take(limit)
            .map(|(post_id, post)| PostRecord {
                post_id: *post_id,
                raw: post.raw.clone(),
            })
            .collect();
        Ok(page)
    }

    async fn update_post_raw(&self, post_id: TargetId, raw: &str) -> TargetResult<()> {
        let mut state = self.state();
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| TargetError::NotFound(format!("post {post_id}")))?;
        post.raw = raw.to_string();
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

        let mut state = self.state();
        if let Some(existing) = state
            .uploads_by_checksum
            .get(&checksum)
            .and_then(|id| state.uploads.get(id))
        {
            return Ok(Some(existing.clone()));
        }

        let original = original_filename(path, filename);
        let id = state.next_id("uploads");
        let upload = Upload {
            id,
            owner_id,
            url: format!(
                "{}/uploads/{}",
                self.base_url.trim_end_matches('/'),
                stored_file_name(&checksum, &original)
            ),
            original_filename: original,
            sha256: checksum.clone(),
            filesize: data.len() as u64,
        };
        state.uploads.insert(id, upload.clone());
        state.uploads_by_checksum.insert(checksum, id);
        Ok(Some(upload))
    }

    async fn find_upload(&self, upload_id: TargetId) -> TargetResult<Option<Upload>> {
        Ok(self.state().uploads.get(&upload_id).cloned())
    }

    async fn tag_topic(&self, topic_id: TargetId, tags: &[String]) -> TargetResult<()> {
        let mut state = self.state();
        let topic = state
            .topics
            .get_mut(&topic_id)
            .ok_or_else(|| TargetError::NotFound(format!("topic {topic_id}")))?;
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !topic.tags.contains(&tag) {
                topic.tags.push(tag);
            }
        }
        Ok(())
    }

    async fn register_permalink(
        &self,
        path: &str,
        entity_type: EntityType,
        target_id: TargetId,
    ) -> TargetResult<()> {
        self.state()
            .permalinks
            .entry(path.to_string())
            .or_insert((entity_type, target_id));
        Ok(())
    }

    async fn set_user_avatar(&self, user_id: TargetId, upload_id: TargetId) -> TargetResult<()> {
        let mut state = self.state();
        if !state.uploads.contains_key(&upload_id) {
            return Err(TargetError::NotFound(format!("upload {upload_id}")));
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| TargetError::NotFound(format!("user {user_id}")))?;
        user.avatar_upload_id = Some(upload_id);
        Ok(())
    }

    async fn add_group_member(&self, group_id: TargetId, user_id: TargetId) -> TargetResult<()> {
        let mut state = self.state();
        if !state.groups.contains_key(&group_id) {
            return Err(TargetError::NotFound(format!("group {group_id}")));
        }
        state.group_members.insert((group_id, user_id));
        Ok(())
    }

    async fn entity_counts(&self) -> TargetResult<BTreeMap<EntityType, u64>> {
        let state = self.state();
        let private_posts = state.posts.values().filter(|p| p.private_message).count();
        let public_topics = state
            .topics
            .values()
            .filter(|t| t.participants.is_none())
            .count();

        let mut counts = BTreeMap::new();
        counts.insert(EntityType::Group, state.groups.len() as u64);
        counts.insert(EntityType::User, state.users.len() as u64);
        counts.insert(EntityType::Category, state.categories.len() as u64);
        counts.insert(EntityType::Topic, public_topics as u64);
        counts.insert(
            EntityType::Post,
            (state.posts.len() - private_posts) as u64,
        );
        counts.insert(EntityType::Attachment, state.uploads.len() as u64);
        counts.insert(EntityType::Like, state.like_ids.len() as u64);
        counts.insert(EntityType::Subscription, state.subscriptions.len() as u64);
        counts.insert(EntityType::PrivateMessage, private_posts as u64);
        Ok(counts)
    }
}

#[async_trait]
impl CursorStorage for MemoryTarget {
    async fn load_cursor(&self, stage: Stage) -> Result<Option<BatchCursor>> {
        Ok(self.state().cursors.get(&stage).cloned())
    }

    async fn save_cursor(&self, cursor: &BatchCursor) -> Result<()> {
        self.state().cursors.insert(cursor.stage, cursor.clone());
        Ok(())
    }

    async fn load_all_cursors(&self) -> Result<Vec<BatchCursor>> {
        Ok(self.state().cursors.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn user(id: i64, username: &str, email: Option<&str>) -> UserAttrs {
        UserAttrs {
            legacy_id: LegacyId::from(id),
            username: username.to_string(),
            legacy_username: Some(username.to_string()),
            email: email.map(str::to_string),
            name: None,
            created_at: None,
        }
    }

    async fn seed_topic(target: &MemoryTarget) -> (TargetId, CreatedTopic) {
        let user_id = target.create_user(&user(1, "alice", None)).await.unwrap();
        let category_id = target
            .create_category(&CategoryAttrs {
                legacy_id: LegacyId::from(1),
                name: "General".to_string(),
                description: None,
                parent_id: None,
                position: None,
            })
            .await
            .unwrap();
        let topic = target
            .create_topic(&TopicAttrs {
                legacy_id: LegacyId::from(10),
                title: "Hi".to_string(),
                category_id,
                user_id,
                raw: "first".to_string(),
                first_post_legacy_id: Some(LegacyId::from(100)),
                created_at: None,
            })
            .await
            .unwrap();
        (user_id, topic)
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let target = MemoryTarget::new();
        target
            .create_user(&user(1, "alice", Some("a@x.com")))
            .await
            .unwrap();
        let err = target
            .create_user(&user(2, "Alice", Some("A@X.com")))
            .await
            .unwrap_err();
        match err {
            TargetError::Validation(reasons) => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            target.find_user_by_email("A@x.COM").await.unwrap(),
            Some(TargetId::new(1))
        );
    }

    #[tokio::test]
    async fn test_topic_creates_first_post_and_alias() {
        let target = MemoryTarget::new().with_base_url("https://forum.example.com/");
        let (_, topic) = seed_topic(&target).await;

        assert_eq!(topic.first_post.post_number, 1);
        assert_eq!(topic.first_post.url, "https://forum.example.com/t/1/1");
        assert_eq!(
            target
                .find_by_legacy_id(EntityType::Post, &LegacyId::from(100))
                .await
                .unwrap(),
            Some(topic.first_post.post_id)
        );
    }

    #[tokio::test]
    async fn test_post_numbers_increase_per_topic() {
        let target = MemoryTarget::new();
        let (user_id, topic) = seed_topic(&target).await;
        let reply = target
            .create_post(&PostAttrs {
                legacy_id: LegacyId::from(20),
                topic_id: topic.topic_id,
                user_id,
                raw: "reply".to_string(),
                reply_to_post_number: Some(1),
                created_at: None,
            })
            .await
            .unwrap();
        assert_eq!(reply.post_number, 2);

        let scanned = target.scan_posts(Some(topic.first_post.post_id), 10).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].raw, "reply");
    }

    #[tokio::test]
    async fn test_duplicate_legacy_reference_rejected() {
        let target = MemoryTarget::new();
        target.create_user(&user(1, "alice", None)).await.unwrap();
        let err = target.create_user(&user(1, "bob", None)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_simulated_failure_is_transient() {
        let target = MemoryTarget::new();
        target.fail_next_create(EntityType::User, LegacyId::from(1));
        let err = target.create_user(&user(1, "alice", None)).await.unwrap_err();
        assert!(!err.is_validation());
        assert!(target.create_user(&user(1, "alice", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_upload_deduplicates_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.png");
        let second = dir.path().join("b.png");
        for path in [&first, &second] {
            let mut file = std::fs::File::create(path).unwrap();
            file.write_all(b"same bytes").unwrap();
        }

        let target = MemoryTarget::new();
        let a = target
            .store_upload(TargetId::new(1), &first, "")
            .await
            .unwrap()
            .unwrap();
        let b = target
            .store_upload(TargetId::new(1), &second, "b.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.original_filename, "a.png");
        assert!(a.url.ends_with(".png"));
        assert_eq!(target.upload_count(), 1);

        let missing = target
            .store_upload(TargetId::new(1), &dir.path().join("missing.png"), "")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_private_message_reply_joins_conversation() {
        let target = MemoryTarget::new();
        let alice = target.create_user(&user(1, "alice", None)).await.unwrap();
        let bob = target.create_user(&user(2, "bob", None)).await.unwrap();

        let first = target
            .create_private_message(&PrivateMessageAttrs {
                legacy_id: LegacyId::from(1),
                title: "Hello".to_string(),
                user_id: alice,
                recipient_ids: vec![bob],
                raw: "hi bob".to_string(),
                reply_to: None,
                created_at: None,
            })
            .await
            .unwrap();
        let reply = target
            .create_private_message(&PrivateMessageAttrs {
                legacy_id: LegacyId::from(2),
                title: String::new(),
                user_id: bob,
                recipient_ids: vec![alice],
                raw: "hi alice".to_string(),
                reply_to: Some(first.post_id),
                created_at: None,
            })
            .await
            .unwrap();

        assert_eq!(reply.topic_id, first.topic_id);
        assert_eq!(reply.post_number, 2);
        let counts = target.entity_counts().await.unwrap();
        assert_eq!(counts[&EntityType::PrivateMessage], 2);
        assert_eq!(counts[&EntityType::Topic], 0);
    }

    #[tokio::test]
    async fn test_cursor_storage_round_trip() {
        let target = MemoryTarget::new();
        let mut cursor = BatchCursor::new(Stage::Posts);
        cursor.mark_started("run");
        cursor.advance(12, 3);
        target.save_cursor(&cursor).await.unwrap();

        let loaded = target.load_cursor(Stage::Posts).await.unwrap().unwrap();
        assert_eq!(loaded.last_key, Some(12));
        assert!(target.load_cursor(Stage::Users).await.unwrap().is_none());
        assert_eq!(target.load_all_cursors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mapping_pages_continue_after_last_key() {
        let target = MemoryTarget::new();
        for id in 2..=4 {
            target
                .create_user(&user(id, &format!("user{id}"), None))
                .await
                .unwrap();
        }
        seed_topic(&target).await;

        let first = target.load_mappings(EntityType::User, None, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let rest = target
            .load_mappings(EntityType::User, Some(&first[1].legacy_id), 2)
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|m| m.entity_type == EntityType::User));
        assert!(rest.iter().all(|m| m.legacy_id > first[1].legacy_id));

        let posts = target.load_post_locations(None, 10).await.unwrap();
        assert!(target
            .load_post_locations(Some(posts[0].post_id), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_user_alias_is_listed_with_names() {
        let target = MemoryTarget::new();
        let alice = target.create_user(&user(1, "alice", None)).await.unwrap();
        target.record_user_alias(alice, "alice_old").await.unwrap();
        target.record_user_alias(alice, "ALICE_OLD").await.unwrap();

        let names = target.load_user_names(None, 10).await.unwrap();
        assert_eq!(names[0].aliases, vec!["alice_old".to_string()]);
        assert!(target
            .load_user_names(Some(alice), 10)
            .await
            .unwrap()
            .is_empty());
        assert!(target
            .record_user_alias(TargetId::new(99), "ghost")
            .await
            .is_err());
    }
}
