//! Command routing.
//!
//! [`CommandRouter`] turns a text message into a command invocation:
//!
//! 1. **Recognize**: the message is not sent via an inline bot, starts with
//!    the command prefix, and any `@mention` on the first token names us.
//!    The token is looked up (lowercased) in the registry.
//! 2. **Filter**: the command's filter tree is evaluated against the message.
//! 3. **Convert**: the tokens after the command become [`Arguments`].
//! 4. **Invoke**: the command is called as a `tower::Service`; a reply is sent
//!    through [`Context::respond`].
//! 5. **Notify**: the `command` event is dispatched, whether or not the
//!    handler succeeded.
//!
//! [`Arguments`]: crate::convert::Arguments

use std::sync::Arc;

use futures::future::BoxFuture;
use pylon_core::{HandlerId, HandlerRoute, Message, Update, UpdateHandler, UpdateKind};
use tower::ServiceExt;
use tracing::{debug, error, warn};

use crate::command::{Command, Invocation};
use crate::context::Context;
use crate::convert::parse_arguments;
use crate::dispatcher::{EventName, EventPayload};
use crate::error::CommandError;
use crate::filter::FilterScope;
use crate::manager::PluginManager;

/// Client handler group of the router. Runs before listener forwarding.
pub const ROUTER_GROUP: i32 = -1;

/// What [`CommandRouter::handle`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not addressed to a registered command.
    NotACommand,
    /// A command matched but its filter rejected the message.
    Filtered,
    Handled,
}

/// A recognized command and the token that named it.
#[derive(Debug, Clone)]
pub struct Recognized {
    pub command: Command,
    /// The typed trigger, prefix and mention stripped.
    pub invoker: String,
}

/// Routes command messages to their handlers.
#[derive(Debug)]
pub struct CommandRouter {
    manager: Arc<PluginManager>,
}

impl CommandRouter {
    pub fn new(manager: Arc<PluginManager>) -> Arc<Self> {
        Arc::new(Self { manager })
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// The command `message` invokes, if any.
    pub fn recognize(&self, message: &Message) -> Option<Recognized> {
        if message.via_bot.is_some() {
            return None;
        }
        let bot = self.manager.bot();
        let token = message.text.as_deref()?.split_whitespace().next()?;
        let token = token.strip_prefix(bot.settings().command_prefix.as_str())?;

        let trigger = match token.split_once('@') {
            Some((trigger, mention)) => {
                let ours = bot
                    .username()
                    .is_some_and(|username| username.eq_ignore_ascii_case(mention));
                if !ours {
                    return None;
                }
                trigger
            }
            None => token,
        };
        if trigger.is_empty() {
            return None;
        }

        let command = self.manager.command(trigger)?;
        Some(Recognized {
            command,
            invoker: trigger.to_string(),
        })
    }

    /// Routes one message.
    ///
    /// Handler, conversion and response errors are returned after the
    /// `command` event has been dispatched.
    pub async fn handle(&self, message: Arc<Message>) -> Result<RouteOutcome, CommandError> {
        self.route(message).await.map_err(|(_, e)| e)
    }

    async fn route(&self, message: Arc<Message>) -> Result<RouteOutcome, (Command, CommandError)> {
        let Some(Recognized { command, invoker }) = self.recognize(&message) else {
            return Ok(RouteOutcome::NotACommand);
        };
        let bot = self.manager.bot();

        let scope = FilterScope::new(Update::Message(message.clone()), bot.client().clone());
        if !command.check(&scope).await {
            debug!(command = command.name(), plugin = command.plugin(), "Command filtered");
            return Ok(RouteOutcome::Filtered);
        }

        let ctx = Arc::new(Context::new(
            bot.clone(),
            message.clone(),
            command.name(),
            &invoker,
        ));
        let result = invoke(&command, ctx).await;

        bot.dispatch(
            EventName::Command,
            EventPayload::Command {
                name: command.name().to_string(),
                message,
            },
        )
        .await;

        match result {
            Ok(()) => Ok(RouteOutcome::Handled),
            Err(e) => Err((command, e)),
        }
    }

    /// Registers the router on the platform client. Errors are logged
    /// against the owning plugin.
    ///
    /// The client only holds a weak reference; dropping the router makes the
    /// handler a no-op.
    pub fn install(self: &Arc<Self>) -> HandlerId {
        let weak = Arc::downgrade(self);
        let handler: UpdateHandler = Arc::new(move |update: Update| -> BoxFuture<'static, ()> {
            let weak = weak.clone();
            Box::pin(async move {
                let (Some(router), Update::Message(message)) = (weak.upgrade(), update) else {
                    return;
                };
                match router.route(message).await {
                    Ok(_) => {}
                    Err((command, e)) if e.is_not_modified() => {
                        warn!(plugin = command.plugin(), command = command.name(), "{e}");
                    }
                    Err((command, e)) => {
                        error!(
                            plugin = command.plugin(),
                            command = command.name(),
                            error = %e,
                            "Command failed"
                        );
                    }
                }
            })
        });
        self.manager
            .bot()
            .client()
            .add_handler(HandlerRoute::new(UpdateKind::Message, ROUTER_GROUP), handler)
    }
}

async fn invoke(command: &Command, ctx: Arc<Context>) -> Result<(), CommandError> {
    let args = parse_arguments(&ctx, command.params()).await?;
    let reply = command
        .clone()
        .oneshot(Invocation::new(ctx.clone(), args))
        .await?;
    if let Some(response) = reply {
        ctx.respond(response).await?;
    }
    Ok(())
}
