//! Composable async predicates gating commands and listeners.
//!
//! A [`Filter`] is a tree of `And` / `Or` / `Not` nodes over leaves. Each leaf
//! wraps a [`Predicate`]. Some leaves need the host (the staff set, the owner)
//! and start out *host-bound*: they carry a factory instead of a predicate and
//! must be resolved with [`Filter::bind`] before use. Binding walks the whole
//! tree once and yields a new, immutable tree; command construction does this.
//!
//! Evaluation is strictly left to right. `And` stops at the first `false`,
//! `Or` at the first `true`. Leaves share a [`FilterScope`] whose membership
//! cache lets later leaves reuse lookups made by earlier ones. A predicate
//! error counts as `false`.
//!
//! ```rust,ignore
//! use pylon_framework::filter::builtin::{admin_only, can_restrict, staff_only};
//!
//! let filter = staff_only() | (admin_only() & can_restrict());
//! ```

pub mod builtin;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use pylon_core::{ApiResult, BoxedClient, Chat, ChatId, ChatMember, PeerRef, Update, User};
use tower::BoxError;
use tracing::{debug, warn};

use crate::bot::Bot;

// ─── Predicate ───────────────────────────────────────────────────────────────

/// A single async check.
#[async_trait]
pub trait Predicate: Send + Sync + 'static {
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError>;
}

/// A [`Predicate`] over an async closure taking the scope by value.
pub struct PredicateFn<F>(F);

impl<F> PredicateFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Predicate for PredicateFn<F>
where
    F: Fn(FilterScope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError> {
        (self.0)(scope.clone()).await
    }
}

// ─── FilterScope ─────────────────────────────────────────────────────────────

/// What a predicate sees: the update, the client and a membership cache
/// shared across one evaluation.
#[derive(Clone)]
pub struct FilterScope {
    update: Update,
    client: BoxedClient,
    members: Arc<Mutex<HashMap<(ChatId, PeerRef), ChatMember>>>,
}

impl FilterScope {
    pub fn new(update: Update, client: BoxedClient) -> Self {
        Self {
            update,
            client,
            members: Arc::default(),
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    pub fn sender(&self) -> Option<&User> {
        self.update.sender()
    }

    pub fn chat(&self) -> Option<&Chat> {
        self.update.chat()
    }

    /// Membership of `user` in `chat_id`, fetched at most once per scope.
    pub async fn member(&self, chat_id: ChatId, user: PeerRef) -> ApiResult<ChatMember> {
        let key = (chat_id, user);
        if let Some(member) = self.members.lock().get(&key) {
            return Ok(member.clone());
        }
        let member = self.client.get_chat_member(chat_id, &key.1).await?;
        self.members.lock().insert(key, member.clone());
        Ok(member)
    }
}

// ─── Leaves ──────────────────────────────────────────────────────────────────

type BindFn = Arc<dyn Fn(&Bot) -> Arc<dyn Predicate> + Send + Sync>;

#[derive(Clone)]
enum LeafKind {
    Ready(Arc<dyn Predicate>),
    HostBound(BindFn),
}

/// A named predicate, possibly still waiting for the host.
#[derive(Clone)]
pub struct Leaf {
    name: Cow<'static, str>,
    kind: LeafKind,
}

impl Leaf {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.kind, LeafKind::Ready(_))
    }
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A predicate tree.
#[derive(Clone)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Leaf(Leaf),
}

impl Filter {
    /// A leaf over an existing predicate.
    pub fn leaf(name: impl Into<Cow<'static, str>>, predicate: impl Predicate) -> Self {
        Self::Leaf(Leaf {
            name: name.into(),
            kind: LeafKind::Ready(Arc::new(predicate)),
        })
    }

    /// A leaf over an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(FilterScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        Self::leaf(name, PredicateFn(f))
    }

    /// A leaf whose predicate is built from the host by [`bind`](Self::bind).
    pub fn host_bound<F, P>(name: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        F: Fn(&Bot) -> P + Send + Sync + 'static,
        P: Predicate,
    {
        Self::Leaf(Leaf {
            name: name.into(),
            kind: LeafKind::HostBound(Arc::new(move |bot: &Bot| -> Arc<dyn Predicate> {
                Arc::new(factory(bot))
            })),
        })
    }

    /// Conjunction of `filters`.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction of `filters`.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Resolves every host-bound leaf against `bot`, returning a new tree.
    pub fn bind(&self, bot: &Bot) -> Self {
        match self {
            Self::And(children) => Self::And(children.iter().map(|c| c.bind(bot)).collect()),
            Self::Or(children) => Self::Or(children.iter().map(|c| c.bind(bot)).collect()),
            Self::Not(child) => Self::Not(Box::new(child.bind(bot))),
            Self::Leaf(leaf) => match &leaf.kind {
                LeafKind::Ready(_) => Self::Leaf(leaf.clone()),
                LeafKind::HostBound(factory) => Self::Leaf(Leaf {
                    name: leaf.name.clone(),
                    kind: LeafKind::Ready(factory(bot)),
                }),
            },
        }
    }

    /// `true` when no host-bound leaf is left.
    pub fn is_bound(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.iter().all(Filter::is_bound),
            Self::Not(child) => child.is_bound(),
            Self::Leaf(leaf) => leaf.is_bound(),
        }
    }

    /// Evaluates the tree left to right with short-circuiting.
    pub fn evaluate<'a>(&'a self, scope: &'a FilterScope) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self {
                Self::And(children) => {
                    for child in children {
                        if !child.evaluate(scope).await {
                            return false;
                        }
                    }
                    true
                }
                Self::Or(children) => {
                    for child in children {
                        if child.evaluate(scope).await {
                            return true;
                        }
                    }
                    false
                }
                Self::Not(child) => !child.evaluate(scope).await,
                Self::Leaf(leaf) => match &leaf.kind {
                    LeafKind::Ready(predicate) => match predicate.check(scope).await {
                        Ok(result) => result,
                        Err(e) => {
                            debug!(filter = %leaf.name, error = %e, "Filter predicate failed");
                            false
                        }
                    },
                    LeafKind::HostBound(_) => {
                        warn!(filter = %leaf.name, "Host-bound filter evaluated before binding");
                        false
                    }
                },
            }
        })
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => f.debug_tuple("And").field(children).finish(),
            Self::Or(children) => f.debug_tuple("Or").field(children).finish(),
            Self::Not(child) => f.debug_tuple("Not").field(child).finish(),
            Self::Leaf(leaf) if leaf.is_bound() => write!(f, "{}", leaf.name),
            Self::Leaf(leaf) => write!(f, "{}(unbound)", leaf.name),
        }
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        match self {
            Self::And(mut children) => {
                children.push(rhs);
                Self::And(children)
            }
            lhs => Self::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        match self {
            Self::Or(mut children) => {
                children.push(rhs);
                Self::Or(children)
            }
            lhs => Self::Or(vec![lhs, rhs]),
        }
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}
