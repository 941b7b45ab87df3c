//! Attribute validation shared by target implementations

use super::TargetResult;
use crate::domain::entities::{
    CategoryAttrs, GroupAttrs, PostAttrs, PrivateMessageAttrs, TopicAttrs, UserAttrs,
};
use crate::domain::errors::TargetError;

/// Maximum username length accepted by the target
pub const MAX_USERNAME_LENGTH: usize = 60;

/// Maximum topic title length accepted by the target
pub const MAX_TITLE_LENGTH: usize = 255;

fn finish(reasons: Vec<String>) -> TargetResult<()> {
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(TargetError::Validation(reasons))
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn validate_group(attrs: &GroupAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if blank(&attrs.name) {
        reasons.push("group name is blank".to_string());
    }
    finish(reasons)
}

pub fn validate_user(attrs: &UserAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if blank(&attrs.username) {
        reasons.push("username is blank".to_string());
    } else if attrs.username.chars().count() > MAX_USERNAME_LENGTH {
        reasons.push(format!(
            "username is longer than {MAX_USERNAME_LENGTH} characters"
        ));
    }
    if let Some(email) = &attrs.email {
        if !email.contains('@') {
            reasons.push(format!("email '{email}' is invalid"));
        }
    }
    finish(reasons)
}

pub fn validate_category(attrs: &CategoryAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if blank(&attrs.name) {
        reasons.push("category name is blank".to_string());
    }
    finish(reasons)
}

pub fn validate_topic(attrs: &TopicAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if blank(&attrs.title) {
        reasons.push("title is blank".to_string());
    } else if attrs.title.chars().count() > MAX_TITLE_LENGTH {
        reasons.push(format!("title is longer than {MAX_TITLE_LENGTH} characters"));
    }
    if blank(&attrs.raw) {
        reasons.push("raw is blank".to_string());
    }
    finish(reasons)
}

pub fn validate_post(attrs: &PostAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if blank(&attrs.raw) {
        reasons.push("raw is blank".to_string());
    }
    finish(reasons)
}

pub fn validate_private_message(attrs: &PrivateMessageAttrs) -> TargetResult<()> {
    let mut reasons = Vec::new();
    if attrs.reply_to.is_none() && blank(&attrs.title) {
        reasons.push("title is blank".to_string());
    }
    if blank(&attrs.raw) {
        reasons.push("raw is blank".to_string());
    }
    if attrs.recipient_ids.is_empty() {
        reasons.push("message has no recipients".to_string());
    }
    finish(reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{LegacyId, TargetId};

    fn user(username: &str, email: Option<&str>) -> UserAttrs {
        UserAttrs {
            legacy_id: LegacyId::from(1),
            username: username.to_string(),
            legacy_username: None,
            email: email.map(str::to_string),
            name: None,
            created_at: None,
        }
    }

    #[test]
    fn test_user_validation() {
        assert!(validate_user(&user("alice", Some("a@x.com"))).is_ok());
        assert!(validate_user(&user("  ", None)).is_err());
        assert!(validate_user(&user("alice", Some("nope"))).is_err());
        assert!(validate_user(&user(&"x".repeat(61), None)).is_err());
    }

    #[test]
    fn test_topic_validation_collects_reasons() {
        let attrs = TopicAttrs {
            legacy_id: LegacyId::from(1),
            title: String::new(),
            category_id: TargetId::new(1),
            user_id: TargetId::new(1),
            raw: " ".to_string(),
            first_post_legacy_id: None,
            created_at: None,
        };
        match validate_topic(&attrs) {
            Err(TargetError::Validation(reasons)) => assert_eq!(reasons.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_private_message_reply_needs_no_title() {
        let attrs = PrivateMessageAttrs {
            legacy_id: LegacyId::from(3),
            title: String::new(),
            user_id: TargetId::new(1),
            recipient_ids: vec![TargetId::new(2)],
            raw: "hello".to_string(),
            reply_to: Some(TargetId::new(9)),
            created_at: None,
        };
        assert!(validate_private_message(&attrs).is_ok());
    }
}
