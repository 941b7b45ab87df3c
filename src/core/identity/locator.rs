//! Topic locator
//!
//! In-memory index of where every persisted post lives, built incrementally
//! as posts are created. Quote and reply resolution read it instead of going
//! back to the source or target.

use crate::domain::ids::TargetId;
use crate::domain::mapping::PostLocation;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct TopicLocator {
    posts: HashMap<TargetId, PostLocation>,
    first_posts: HashMap<TargetId, TargetId>,
}

impl TopicLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a persisted post, keeping the first location recorded for it
    pub fn record(&mut self, location: PostLocation) {
        if self.posts.contains_key(&location.post_id) {
            return;
        }
        if location.post_number == 1 {
            self.first_posts
                .entry(location.topic_id)
                .or_insert(location.post_id);
        }
        self.posts.insert(location.post_id, location);
    }

    pub fn get(&self, post_id: TargetId) -> Option<&PostLocation> {
        self.posts.get(&post_id)
    }

    /// Canonical URL of a topic, taken from its first post
    pub fn topic_url(&self, topic_id: TargetId) -> Option<&str> {
        self.first_posts
            .get(&topic_id)
            .and_then(|post_id| self.posts.get(post_id))
            .map(|location| location.url.as_str())
    }

    /// Post number of `post_id` when it lives in `topic_id`
    pub fn post_number_in(&self, post_id: TargetId, topic_id: TargetId) -> Option<i32> {
        self.posts
            .get(&post_id)
            .filter(|location| location.topic_id == topic_id)
            .map(|location| location.post_number)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
