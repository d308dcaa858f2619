//! Commands and their handlers.
//!
//! A plugin describes each command with a [`CommandBuilder`]. The registry
//! turns it into a [`Command`] when the plugin loads: names are lowercased,
//! the parameter list is validated and the filter is bound to the host.
//!
//! # Tower Service Integration
//!
//! `Command` implements `tower::Service<Invocation>`, so middleware can wrap a
//! command the same way it wraps any other service:
//!
//! ```rust,ignore
//! use tower::{ServiceBuilder, ServiceExt};
//! use tower::util::MapErrLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(MapErrLayer::new(|e: CommandError| e.to_string()))
//!     .service(command.clone());
//! let reply = service.oneshot(Invocation::new(ctx, args)).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Service};
use tracing::{Instrument, debug_span};

use crate::bot::Bot;
use crate::context::Context;
use crate::convert::{Arguments, Param, validate_params};
use crate::error::{ArgumentError, CommandError};
use crate::filter::{Filter, FilterScope};
use crate::response::Response;

// ─── Replies ─────────────────────────────────────────────────────────────────

/// Handler return values the router knows how to answer with.
///
/// Text and [`Response`] values are sent through
/// [`Context::respond`]. `()` and `None` send nothing.
pub trait IntoReply {
    fn into_reply(self) -> Result<Option<Response>, BoxError>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        Ok(None)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        Ok(Some(Response::new(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        Ok(Some(Response::new(self)))
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        Ok(Some(self))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        self.map_or(Ok(None), IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        self.map_err(Into::into)?.into_reply()
    }
}

/// Type-erased command handler.
pub type CommandHandler = Arc<
    dyn Fn(Arc<Context>, Arguments) -> BoxFuture<'static, Result<Option<Response>, BoxError>>
        + Send
        + Sync,
>;

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Declaration of a command, before it is bound to a plugin.
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    filter: Option<Filter>,
    params: Vec<Param>,
    handler: Option<CommandHandler>,
}

impl CommandBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Gates the command. Host-bound leaves are bound when the command is
    /// built.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Sets the handler.
    ///
    /// ```rust,ignore
    /// Command::builder("echo")
    ///     .param(Param::rest("text"))
    ///     .handler(|_ctx, args| async move { args.get::<String>("text") });
    /// ```
    pub fn handler<F, Fut, R>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Context>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + 'static,
    {
        let handler: CommandHandler =
            Arc::new(move |ctx, args| f(ctx, args).map(R::into_reply).boxed());
        self.handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the declaration and binds it to `plugin` on `bot`.
    pub fn build(self, bot: &Bot, plugin: &str) -> Result<Command, ArgumentError> {
        let name = self.name.to_lowercase();
        let handler = self.handler.ok_or_else(|| {
            ArgumentError::BadArgument(format!("Command '{name}' has no handler"))
        })?;
        validate_params(&name, &self.params)?;

        let mut aliases: Vec<String> = Vec::with_capacity(self.aliases.len());
        for alias in self.aliases.iter().map(|a| a.to_lowercase()) {
            if alias != name && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        Ok(Command {
            inner: Arc::new(CommandInner {
                name,
                aliases,
                description: self.description,
                plugin: Arc::from(plugin),
                filter: self.filter.map(|f| f.bind(bot)),
                params: self.params,
                handler,
            }),
        })
    }
}

// ─── Command ─────────────────────────────────────────────────────────────────

struct CommandInner {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    plugin: Arc<str>,
    filter: Option<Filter>,
    params: Vec<Param>,
    handler: CommandHandler,
}

/// A registered command. Cheap to clone.
#[derive(Clone)]
pub struct Command {
    inner: Arc<CommandInner>,
}

impl Command {
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            filter: None,
            params: Vec::new(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.inner.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Name of the owning plugin.
    pub fn plugin(&self) -> &str {
        &self.inner.plugin
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.inner.filter.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.inner.params
    }

    /// The name followed by every alias.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name()).chain(self.inner.aliases.iter().map(String::as_str))
    }

    /// Evaluates the filter. A command without one always passes.
    pub async fn check(&self, scope: &FilterScope) -> bool {
        match &self.inner.filter {
            Some(filter) => filter.evaluate(scope).await,
            None => true,
        }
    }

    /// `true` when both handles point at the same registration.
    pub fn ptr_eq(&self, other: &Command) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.inner.name)
            .field("aliases", &self.inner.aliases)
            .field("plugin", &self.inner.plugin)
            .field("filter", &self.inner.filter)
            .field("params", &self.inner.params)
            .finish_non_exhaustive()
    }
}

/// One call of a command's handler.
pub struct Invocation {
    pub ctx: Arc<Context>,
    pub args: Arguments,
}

impl Invocation {
    pub fn new(ctx: Arc<Context>, args: Arguments) -> Self {
        Self { ctx, args }
    }
}

impl Service<Invocation> for Command {
    type Response = Option<Response>;
    type Error = CommandError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let inner = self.inner.clone();
        let span = debug_span!(
            "command",
            command = %inner.name,
            plugin = %inner.plugin,
            chat = invocation.ctx.chat().id,
        );

        Box::pin(
            async move {
                (inner.handler)(invocation.ctx, invocation.args)
                    .await
                    .map_err(|source| CommandError::Invoke {
                        command: inner.name.clone(),
                        plugin: inner.plugin.to_string(),
                        source,
                    })
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::parse_arguments;
    use crate::dispatcher::EventDispatcher;
    use crate::filter::builtin::staff_only;
    use crate::testing::{MockClient, group_chat, user};
    use pylon_core::Message;
    use tower::ServiceExt;

    fn bot(client: &Arc<MockClient>) -> (Arc<EventDispatcher>, Bot) {
        let events = EventDispatcher::new(client.clone());
        let bot = Bot::builder(client.clone()).build(&events);
        (events, bot)
    }

    #[test]
    fn replies_convert() {
        assert_eq!(().into_reply().unwrap(), None);
        assert_eq!("hi".into_reply().unwrap(), Some(Response::new("hi")));
        assert_eq!(None::<String>.into_reply().unwrap(), None);

        let ok: Result<String, BoxError> = Ok("x".into());
        assert_eq!(ok.into_reply().unwrap(), Some(Response::new("x")));
        let err: Result<(), std::io::Error> = Err(std::io::Error::other("disk"));
        assert_eq!(err.into_reply().unwrap_err().to_string(), "disk");
    }

    #[test]
    fn build_normalizes_and_binds() {
        let client = MockClient::new();
        let (_events, bot) = bot(&client);
        let command = Command::builder("Note")
            .aliases(["Save", "note", "save"])
            .filter(staff_only())
            .handler(|_, _| async {})
            .build(&bot, "Notes")
            .unwrap();

        assert_eq!(command.triggers().collect::<Vec<_>>(), vec!["note", "save"]);
        assert_eq!(command.plugin(), "Notes");
        assert!(command.filter().is_some_and(Filter::is_bound));
    }

    #[test]
    fn build_rejects_bad_declarations() {
        let client = MockClient::new();
        let (_events, bot) = bot(&client);

        let missing = Command::builder("x").build(&bot, "P");
        assert!(matches!(missing, Err(ArgumentError::BadArgument(_))));

        let variadic = Command::builder("purge")
            .param(Param::variadic("ids"))
            .handler(|_, _| async {})
            .build(&bot, "P");
        assert!(matches!(variadic, Err(ArgumentError::BadArgument(m)) if m.contains("'*ids' on 'purge'")));
    }

    #[tokio::test]
    async fn service_invokes_handler() {
        let client = MockClient::new();
        let (_events, bot) = bot(&client);
        let command = Command::builder("echo")
            .param(Param::rest("text"))
            .handler(|_, args: Arguments| async move { args.get::<String>("text") })
            .build(&bot, "Misc")
            .unwrap();

        let message = Message::new(1, group_chat())
            .from_user(user(1))
            .with_text("/echo hello there");
        let ctx = Arc::new(Context::new(bot.clone(), Arc::new(message), "echo", "echo"));
        let args = parse_arguments(&ctx, command.params()).await.unwrap();

        let reply = command.oneshot(Invocation::new(ctx, args)).await.unwrap();
        assert_eq!(reply, Some(Response::new("hello there")));
    }

    #[tokio::test]
    async fn handler_errors_name_the_command() {
        let client = MockClient::new();
        let (_events, bot) = bot(&client);
        let command = Command::builder("fail")
            .handler(|_, _| async { Err::<(), _>(std::io::Error::other("kaput")) })
            .build(&bot, "Broken")
            .unwrap();

        let message = Message::new(1, group_chat()).from_user(user(1)).with_text("/fail");
        let ctx = Arc::new(Context::new(bot.clone(), Arc::new(message), "fail", "fail"));
        let err = command
            .oneshot(Invocation::new(ctx, Arguments::default()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command 'fail' (from Broken) failed: kaput");
    }
}
