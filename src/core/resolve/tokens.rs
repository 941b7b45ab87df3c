//! Legacy reference tokens
//!
//! | Kind        | Legacy token                       |
//! |-------------|------------------------------------|
//! | Quote       | `[quote=AUTHOR;POSTID]`            |
//! | Post link   | `[post=POSTID]label[/post]`        |
//! | Thread link | `[thread=TOPICID]label[/thread]`   |
//! | Attachment  | `[attach]ID[/attach]`              |
//! | Mention     | `@legacyname`                      |
//!
//! Tokens inside fenced or inline code are never reported.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Kind of in-content reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Quote,
    PostLink,
    ThreadLink,
    Attachment,
    Mention,
}

impl ReferenceKind {
    /// Whether an unresolved token may still resolve in the global pass
    ///
    /// Mentions are final after the first pass: users are always imported
    /// before any content stage.
    pub fn is_deferrable(&self) -> bool {
        !matches!(self, ReferenceKind::Mention)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Quote => "quote",
            ReferenceKind::PostLink => "post_link",
            ReferenceKind::ThreadLink => "thread_link",
            ReferenceKind::Attachment => "attachment",
            ReferenceKind::Mention => "mention",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed reference token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Quote { author: String, post_id: String },
    PostLink { post_id: String, label: String },
    ThreadLink { topic_id: String, label: String },
    Attachment { attachment_id: String },
    Mention { name: String },
}

impl Token {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Token::Quote { .. } => ReferenceKind::Quote,
            Token::PostLink { .. } => ReferenceKind::PostLink,
            Token::ThreadLink { .. } => ReferenceKind::ThreadLink,
            Token::Attachment { .. } => ReferenceKind::Attachment,
            Token::Mention { .. } => ReferenceKind::Mention,
        }
    }

    /// Legacy key the token points at
    pub fn reference(&self) -> &str {
        match self {
            Token::Quote { post_id, .. } | Token::PostLink { post_id, .. } => post_id,
            Token::ThreadLink { topic_id, .. } => topic_id,
            Token::Attachment { attachment_id } => attachment_id,
            Token::Mention { name } => name,
        }
    }
}

/// Token found in content with its byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub range: Range<usize>,
    pub token: Token,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?is)(?P<quote>\[quote="?(?P<qauthor>[^;\]"]+?)"?;\s*(?P<qpost>\d+)\])"#,
            r"|(?P<post>\[post=(?P<pid>\d+)\](?P<plabel>.*?)\[/post\])",
            r"|(?P<thread>\[thread=(?P<tid>\d+)\](?P<tlabel>.*?)\[/thread\])",
            r"|(?P<attach>\[attach(?:=[^\]]*)?\]\s*(?P<aid>\d+)\s*\[/attach\])",
            r"|(?P<mention>@(?P<mname>\w(?:[\w.\-]*\w)?))",
        ))
        .expect("reference token pattern is valid")
    })
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```.*?```|`[^`\n]+`").expect("code span pattern is valid")
    })
}

/// Finds every reference token outside code, in content order
pub fn scan(text: &str) -> Vec<Located> {
    let mut found = Vec::new();
    let mut last = 0;
    for code in code_pattern().find_iter(text) {
        scan_prose(text, last..code.start(), &mut found);
        last = code.end();
    }
    scan_prose(text, last..text.len(), &mut found);
    found
}

/// Whether the content holds any token the global pass could rewrite
pub fn has_deferrable(text: &str) -> bool {
    let lower = text.to_lowercase();
    if !["[quote=", "[post=", "[thread=", "[attach"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return false;
    }
    scan(text).iter().any(|t| t.token.kind().is_deferrable())
}

fn scan_prose(text: &str, segment: Range<usize>, found: &mut Vec<Located>) {
    let prose = &text[segment.clone()];
    for caps in token_pattern().captures_iter(prose) {
        let Some(whole) = caps.get(0) else { continue };
        let range = (segment.start + whole.start())..(segment.start + whole.end());
        let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();

        let token = if caps.name("quote").is_some() {
            Token::Quote {
                author: group("qauthor").trim().to_string(),
                post_id: group("qpost"),
            }
        } else if caps.name("post").is_some() {
            Token::PostLink {
                post_id: group("pid"),
                label: group("plabel"),
            }
        } else if caps.name("thread").is_some() {
            Token::ThreadLink {
                topic_id: group("tid"),
                label: group("tlabel"),
            }
        } else if caps.name("attach").is_some() {
            Token::Attachment {
                attachment_id: group("aid"),
            }
        } else {
            // An @ glued to a word, another @ or a path is not a mention
            let glued = text[..range.start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '/' | '.' | '-'));
            if glued {
                continue;
            }
            Token::Mention {
                name: group("mname"),
            }
        };
        found.push(Located { range, token });
    }
}
