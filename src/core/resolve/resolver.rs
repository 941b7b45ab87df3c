//! Two-pass reference resolver
//!
//! Pass 1 runs inline while an entity is being imported and rewrites every
//! token whose target is already mapped, which covers all backward
//! references. Tokens that cannot be resolved yet are left verbatim in the
//! persisted content. Pass 2 runs once after every stage has completed,
//! re-scans the persisted posts for those residual tokens and rewrites the
//! ones that became resolvable. Whatever is still unresolved stays as the
//! original legacy text and is reported as an [`UnresolvedReference`].

use super::tokens::{scan, has_deferrable, ReferenceKind, Token};
use crate::adapters::target::TargetRepository;
use crate::core::identity::{IdentityMap, TopicLocator};
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::Result;
use serde::Serialize;
use std::fmt;

/// Which resolution pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePass {
    /// At transform time, before the entity is persisted
    Inline,
    /// After all stages, over persisted content
    Global,
}

/// Content carrying a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceOrigin {
    /// Source row being imported
    Row {
        entity_type: EntityType,
        legacy_id: LegacyId,
    },
    /// Persisted target post
    Post { post_id: TargetId },
}

impl fmt::Display for ReferenceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceOrigin::Row {
                entity_type,
                legacy_id,
            } => write!(f, "legacy {entity_type} {legacy_id}"),
            ReferenceOrigin::Post { post_id } => write!(f, "target post {post_id}"),
        }
    }
}

/// Reference left as legacy text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub kind: ReferenceKind,
    /// Legacy id or name the token points at
    pub reference: String,
    /// Original token text
    pub token: String,
    pub origin: ReferenceOrigin,
    pub pass: ResolvePass,
}

impl UnresolvedReference {
    /// Logs the reference as a warning
    pub fn log(&self) {
        tracing::warn!(
            kind = %self.kind,
            reference = %self.reference,
            origin = %self.origin,
            pass = ?self.pass,
            token = %self.token,
            "Unresolved reference left as original text"
        );
    }
}

/// Outcome of resolving one piece of content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub content: String,
    /// Tokens rewritten to their target form
    pub resolved: usize,
    /// Deferrable tokens left for the global pass
    pub pending: usize,
    /// Tokens that are final and could not be resolved
    pub unresolved: Vec<UnresolvedReference>,
}

impl Resolution {
    pub fn changed(&self) -> bool {
        self.resolved > 0
    }
}

/// Read-only view of the run state used for resolution
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub identity: &'a IdentityMap,
    pub locator: &'a TopicLocator,
    pub target: &'a dyn TargetRepository,
}

/// Summary of the global pass
#[derive(Debug, Clone, Default)]
pub struct GlobalPassReport {
    pub posts_scanned: usize,
    pub posts_rewritten: usize,
    pub resolved: usize,
    pub unresolved: Vec<UnresolvedReference>,
    /// Posts whose rewritten content could not be saved
    pub failed_updates: usize,
    pub interrupted: bool,
}

/// Rewrites legacy reference tokens using the identity map
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the tokens of one piece of content
    ///
    /// In the inline pass every token kind is attempted; unresolved mentions
    /// are final and reported, unresolved deferrable tokens are counted as
    /// pending. In the global pass mentions are left alone and every
    /// deferrable token still unresolved is reported.
    pub async fn resolve(
        &self,
        ctx: ResolveContext<'_>,
        content: &str,
        pass: ResolvePass,
        origin: &ReferenceOrigin,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let mut output = String::with_capacity(content.len());
        let mut last = 0;

        for located in scan(content) {
            let kind = located.token.kind();
            if pass == ResolvePass::Global && !kind.is_deferrable() {
                continue;
            }
            let original = &content[located.range.clone()];

            match self.rewrite(ctx, &located.token).await {
                Some(rewritten) => {
                    output.push_str(&content[last..located.range.start]);
                    output.push_str(&rewritten);
                    last = located.range.end;
                    resolution.resolved += 1;
                }
                None if pass == ResolvePass::Inline && kind.is_deferrable() => {
                    resolution.pending += 1;
                }
                None => {
                    let unresolved = UnresolvedReference {
                        kind,
                        reference: located.token.reference().to_string(),
                        token: original.to_string(),
                        origin: origin.clone(),
                        pass,
                    };
                    unresolved.log();
                    resolution.unresolved.push(unresolved);
                }
            }
        }

        output.push_str(&content[last..]);
        resolution.content = output;
        resolution
    }

    /// Target form of a token, or `None` when its target is not mapped
    async fn rewrite(&self, ctx: ResolveContext<'_>, token: &Token) -> Option<String> {
        match token {
            Token::Quote { author, post_id } => {
                let post = ctx
                    .identity
                    .lookup(EntityType::Post, &LegacyId::new(post_id.as_str()).ok()?)?;
                let location = ctx.locator.get(post)?;
                let username = self
                    .resolve_author(ctx, author)
                    .unwrap_or_else(|| author.clone());
                Some(format!(
                    "[quote=\"{username}, post:{}, topic:{}\"]",
                    location.post_number, location.topic_id
                ))
            }
            Token::PostLink { post_id, label } => {
                let post = ctx
                    .identity
                    .lookup(EntityType::Post, &LegacyId::new(post_id.as_str()).ok()?)?;
                let url = &ctx.locator.get(post)?.url;
                Some(markdown_link(label, url))
            }
            Token::ThreadLink { topic_id, label } => {
                let topic = ctx
                    .identity
                    .lookup(EntityType::Topic, &LegacyId::new(topic_id.as_str()).ok()?)?;
                let url = ctx.locator.topic_url(topic)?;
                Some(markdown_link(label, url))
            }
            Token::Attachment { attachment_id } => {
                let upload_id = ctx.identity.lookup(
                    EntityType::Attachment,
                    &LegacyId::new(attachment_id.as_str()).ok()?,
                )?;
                match ctx.target.find_upload(upload_id).await {
                    Ok(Some(upload)) => Some(ctx.target.render_reference_markup(&upload)),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(
                            upload_id = %upload_id,
                            error = %e,
                            "Failed to load upload for attachment reference"
                        );
                        None
                    }
                }
            }
            Token::Mention { name } => {
                let user = ctx.identity.resolve_name(EntityType::User, name)?;
                let username = ctx.identity.display_name(EntityType::User, user)?;
                Some(format!("@{username}"))
            }
        }
    }

    /// Username of a quote author
    ///
    /// A numeric author is tried as a user legacy id before being tried as
    /// a legacy username.
    fn resolve_author(&self, ctx: ResolveContext<'_>, author: &str) -> Option<String> {
        let by_id = author
            .parse::<i64>()
            .ok()
            .and_then(|id| ctx.identity.lookup(EntityType::User, &LegacyId::from(id)));
        let user = by_id.or_else(|| ctx.identity.resolve_name(EntityType::User, author))?;
        ctx.identity
            .display_name(EntityType::User, user)
            .map(str::to_string)
    }

    /// Re-scans every persisted post and rewrites residual tokens
    ///
    /// `should_stop` is checked between pages.
    pub async fn global_pass(
        &self,
        ctx: ResolveContext<'_>,
        page_size: usize,
        should_stop: &(dyn Fn() -> bool + Send + Sync),
    ) -> Result<GlobalPassReport> {
        let mut report = GlobalPassReport::default();
        let mut after: Option<TargetId> = None;

        tracing::info!("Starting global reference resolution pass");

        loop {
            if should_stop() {
                report.interrupted = true;
                break;
            }
            let page = ctx.target.scan_posts(after, page_size).await?;
            let Some(last) = page.last() else { break };
            after = Some(last.post_id);

            for post in &page {
                report.posts_scanned += 1;
                if !has_deferrable(&post.raw) {
                    continue;
                }
                let origin = ReferenceOrigin::Post {
                    post_id: post.post_id,
                };
                let resolution = self
                    .resolve(ctx, &post.raw, ResolvePass::Global, &origin)
                    .await;
                report.resolved += resolution.resolved;
                report.unresolved.extend(resolution.unresolved.iter().cloned());

                if resolution.changed() {
                    match ctx
                        .target
                        .update_post_raw(post.post_id, &resolution.content)
                        .await
                    {
                        Ok(()) => report.posts_rewritten += 1,
                        Err(e) => {
                            tracing::warn!(
                                post_id = %post.post_id,
                                error = %e,
                                "Failed to save resolved post content"
                            );
                            report.failed_updates += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            posts_scanned = report.posts_scanned,
            posts_rewritten = report.posts_rewritten,
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            "Global reference resolution pass finished"
        );

        Ok(report)
    }
}

fn markdown_link(label: &str, url: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        url.to_string()
    } else {
        format!("[{label}]({url})")
    }
}
