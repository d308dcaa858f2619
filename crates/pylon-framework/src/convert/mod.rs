//! Descriptor-directed argument conversion.
//!
//! A command declares its parameters as a list of [`Param`]s. At invocation
//! time [`parse_arguments`] walks that list against the context's
//! [`args`](crate::context::Context::args) and produces [`Arguments`]:
//!
//! - a positional parameter consumes one token;
//! - a keyword-rest parameter consumes everything left, joined by spaces, and
//!   ends the walk;
//! - a variadic parameter is rejected when the command is built.
//!
//! When a token fails to convert, the parameter's default is used. Without a
//! default, a failed boolean reads as [`Arg::None`] and any other failure is
//! returned. A converter returning the wrong shape of value
//! ([`ArgumentError::BadResult`]) always propagates.

mod entity;
mod param;
mod value;

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::error::ArgumentError;

pub use entity::{ChatConverter, ChatMemberConverter, UserConverter};
pub use param::{AsyncConvertFn, Conversion, ConvertFn, EntityType, Param, ParamKind};
pub use value::{Arg, Arguments, FromArg};

/// A conversion that needs the invocation context.
#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn convert(&self, ctx: &Context, token: &str) -> Result<Arg, ArgumentError>;
}

static USER_CONVERTER: UserConverter = UserConverter;
static CHAT_CONVERTER: ChatConverter = ChatConverter;
static MEMBER_CONVERTER: ChatMemberConverter = ChatMemberConverter;

/// The converter registered for an entity type.
pub fn converter_for(kind: EntityType) -> &'static dyn Converter {
    match kind {
        EntityType::User => &USER_CONVERTER,
        EntityType::Chat => &CHAT_CONVERTER,
        EntityType::ChatMember => &MEMBER_CONVERTER,
    }
}

const TRUE_WORDS: [&str; 5] = ["yes", "true", "enable", "on", "1"];
const FALSE_WORDS: [&str; 5] = ["no", "false", "disable", "off", "0"];

/// Parses the boolean vocabulary, case-insensitively.
pub fn parse_bool(token: &str) -> Result<bool, ArgumentError> {
    let lower = token.to_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Ok(true)
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Ok(false)
    } else {
        Err(ArgumentError::BadBool { token: lower })
    }
}

/// Checks a parameter list for shapes the converter cannot serve.
pub fn validate_params(command: &str, params: &[Param]) -> Result<(), ArgumentError> {
    let mut seen = HashSet::new();
    for (index, param) in params.iter().enumerate() {
        if !seen.insert(param.name.as_str()) {
            return Err(ArgumentError::BadArgument(format!(
                "Duplicate parameter '{}' on '{command}'",
                param.name
            )));
        }
        match param.kind {
            ParamKind::Variadic => return Err(ArgumentError::variadic(&param.name, command)),
            ParamKind::KeywordRest if index + 1 != params.len() => {
                return Err(ArgumentError::BadArgument(format!(
                    "Keyword-rest parameter '{}' must be last on '{command}'",
                    param.name
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Converts one token with `conversion`.
pub async fn convert(
    ctx: &Context,
    conversion: &Conversion,
    token: &str,
) -> Result<Arg, ArgumentError> {
    let conversion = conversion.effective();
    match conversion {
        Conversion::Raw => Ok(Arg::Str(token.to_string())),
        Conversion::Absent => Ok(Arg::None),
        Conversion::Bool => parse_bool(token).map(Arg::Bool),
        Conversion::Int => token
            .parse()
            .map(Arg::Int)
            .map_err(|e| ArgumentError::conversion(conversion.name(), e)),
        Conversion::Float => token
            .parse()
            .map(Arg::Float)
            .map_err(|e| ArgumentError::conversion(conversion.name(), e)),
        Conversion::Func(f) => f(token).map_err(|e| ArgumentError::conversion(conversion.name(), e)),
        Conversion::AsyncFunc(f) => f(token.to_string())
            .await
            .map_err(|e| ArgumentError::conversion(conversion.name(), e)),
        Conversion::Entity(kind) => converter_for(*kind).convert(ctx, token).await,
        // `effective` never stops on a union.
        Conversion::Union(_) => Ok(Arg::Str(token.to_string())),
    }
}

async fn transform(ctx: &Context, param: &Param, token: &str) -> Result<Arg, ArgumentError> {
    match convert(ctx, &param.conversion, token).await {
        Ok(value) => Ok(value),
        Err(err) if err.is_recoverable() => {
            debug!(param = %param.name, error = %err, "Argument conversion failed");
            match (&param.default, err) {
                (Some(default), _) => Ok(default.clone()),
                (None, ArgumentError::BadBool { .. }) => Ok(Arg::None),
                (None, err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

/// Converts the context's arguments according to `params`.
pub async fn parse_arguments(ctx: &Context, params: &[Param]) -> Result<Arguments, ArgumentError> {
    let tokens = ctx.args();
    let mut arguments = Arguments::default();
    let mut index = 0;

    for param in params {
        match param.kind {
            ParamKind::Positional => {
                let value = match tokens.get(index) {
                    Some(token) => transform(ctx, param, token).await?,
                    None => param.default.clone().unwrap_or(Arg::None),
                };
                arguments.push_positional(&param.name, value);
                index += 1;
            }
            ParamKind::KeywordRest => {
                let rest = tokens.get(index..).unwrap_or_default().join(" ");
                let rest = rest.trim();
                let value = match &param.default {
                    Some(default) if rest.is_empty() => default.clone(),
                    _ => Arg::Str(rest.to_string()),
                };
                arguments.insert_keyword(&param.name, value);
                break;
            }
            ParamKind::Variadic => {
                return Err(ArgumentError::variadic(&param.name, ctx.command()));
            }
        }
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Bot;
    use crate::dispatcher::EventDispatcher;
    use crate::testing::{MockClient, group_chat, user};
    use pylon_core::{
        ApiError, Chat, ChatType, Message, MessageEntity, PeerRef, ResolvedPeer, User,
    };
    use std::sync::Arc;
    use tower::BoxError;

    struct Fixture {
        client: Arc<MockClient>,
        _events: Arc<EventDispatcher>,
        bot: Bot,
    }

    impl Fixture {
        fn new() -> Self {
            let client = MockClient::new();
            let events = EventDispatcher::new(client.clone());
            let bot = Bot::builder(client.clone()).build(&events);
            Self {
                client,
                _events: events,
                bot,
            }
        }

        fn ctx(&self, text: &str) -> Context {
            self.ctx_with(Message::new(1, group_chat()).from_user(user(7)).with_text(text))
        }

        fn ctx_with(&self, message: Message) -> Context {
            Context::new(self.bot.clone(), Arc::new(message), "cmd", "cmd")
        }
    }

    #[tokio::test]
    async fn int_falls_back_to_default() {
        let fx = Fixture::new();
        let params = [Param::int("n").default(5)];

        let args = parse_arguments(&fx.ctx("/cmd"), &params).await.unwrap();
        assert_eq!(args.get::<i64>("n").unwrap(), 5);

        let args = parse_arguments(&fx.ctx("/cmd 7"), &params).await.unwrap();
        assert_eq!(args.get::<i64>("n").unwrap(), 7);

        let args = parse_arguments(&fx.ctx("/cmd abc"), &params).await.unwrap();
        assert_eq!(args.get::<i64>("n").unwrap(), 5);
    }

    #[tokio::test]
    async fn int_without_default_errors() {
        let fx = Fixture::new();
        let err = parse_arguments(&fx.ctx("/cmd abc"), &[Param::int("n")])
            .await
            .unwrap_err();
        assert!(matches!(err, ArgumentError::Conversion { ref converter, .. } if converter == "int"));
    }

    #[tokio::test]
    async fn missing_tokens_read_as_none() {
        let fx = Fixture::new();
        let params = [Param::raw("a"), Param::raw("b")];
        let args = parse_arguments(&fx.ctx("/cmd x"), &params).await.unwrap();
        assert_eq!(args.get::<String>("a").unwrap(), "x");
        assert_eq!(args.get::<Option<String>>("b").unwrap(), None);
    }

    #[test]
    fn bool_vocabulary() {
        for word in ["yes", "TRUE", "Enable", "on", "1"] {
            assert!(parse_bool(word).unwrap());
        }
        for word in ["no", "False", "DISABLE", "off", "0"] {
            assert!(!parse_bool(word).unwrap());
        }
        assert!(matches!(parse_bool("maybe"), Err(ArgumentError::BadBool { .. })));
    }

    #[tokio::test]
    async fn bad_bool_uses_default_or_none() {
        let fx = Fixture::new();
        let args = parse_arguments(
            &fx.ctx("/cmd maybe maybe"),
            &[Param::bool("a"), Param::bool("b").default(true)],
        )
        .await
        .unwrap();
        assert_eq!(args.arg("a"), Some(&Arg::None));
        assert!(args.get::<bool>("b").unwrap());
    }

    #[tokio::test]
    async fn rest_consumes_remaining_tokens() {
        let fx = Fixture::new();
        let params = [Param::raw("name"), Param::rest("content")];
        let args = parse_arguments(&fx.ctx("/cmd save  hello   world"), &params)
            .await
            .unwrap();
        assert_eq!(args.get::<String>("name").unwrap(), "save");
        assert_eq!(args.get::<String>("content").unwrap(), "hello world");

        let args = parse_arguments(&fx.ctx("/cmd save"), &params).await.unwrap();
        assert_eq!(args.get::<String>("content").unwrap(), "");
    }

    #[test]
    fn variadic_and_misplaced_rest_are_rejected() {
        let err = validate_params("purge", &[Param::int("n"), Param::variadic("ids")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported variable positional argument conversion found '*ids' on 'purge'"
        );
        assert!(validate_params("x", &[Param::rest("a"), Param::raw("b")]).is_err());
        assert!(validate_params("x", &[Param::raw("a"), Param::rest("b")]).is_ok());
    }

    #[tokio::test]
    async fn optional_union_uses_first_alternative() {
        let fx = Fixture::new();
        let param = Param::int("n").optional();
        assert!(matches!(param.conversion.effective(), Conversion::Int));

        let args = parse_arguments(&fx.ctx("/cmd 3"), &[param]).await.unwrap();
        assert_eq!(args.get::<Option<i64>>("n").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn function_conversions() {
        let fx = Fixture::new();
        let upper = Param::func("word", |token| Ok(Arg::Str(token.to_uppercase())));
        let doubled = Param::async_func("n", |token: String| async move {
            let n: i64 = token.parse().map_err(BoxError::from)?;
            Ok::<_, BoxError>(Arg::Int(n * 2))
        });

        let args = parse_arguments(&fx.ctx("/cmd hi 21"), &[upper, doubled])
            .await
            .unwrap();
        assert_eq!(args.get::<String>("word").unwrap(), "HI");
        assert_eq!(args.get::<i64>("n").unwrap(), 42);
    }

    #[tokio::test]
    async fn user_by_id_username_and_mention() {
        let fx = Fixture::new();
        fx.client.add_peer(
            PeerRef::Username("alice".into()),
            ResolvedPeer::User(User::new(55, "Alice")),
        );
        let params = [Param::user("a"), Param::user("b")];

        let args = parse_arguments(&fx.ctx("/cmd 9 @alice"), &params).await.unwrap();
        assert_eq!(args.get::<User>("a").unwrap().id, 9);
        assert_eq!(args.get::<User>("b").unwrap().id, 55);

        let bob = User::new(66, "Bob");
        let message = Message::new(1, group_chat())
            .from_user(user(7))
            .with_text("/cmd Bob")
            .with_entity(MessageEntity::text_mention(5, 3, bob.clone()));
        let args = parse_arguments(&fx.ctx_with(message), &params[..1]).await.unwrap();
        assert_eq!(args.get::<User>("a").unwrap(), bob);

        let args = parse_arguments(&fx.ctx("/cmd nobody"), &params[..1]).await.unwrap();
        assert_eq!(args.arg("a"), Some(&Arg::None));
    }

    #[tokio::test]
    async fn unknown_username_uses_default_or_fails() {
        let fx = Fixture::new();
        let err = parse_arguments(&fx.ctx("/cmd @ghost"), &[Param::user("who")])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to convert on 'UserConverter', {}", ApiError::peer_invalid("ghost"))
        );

        let fallback = user(1);
        let args = parse_arguments(
            &fx.ctx("/cmd @ghost"),
            &[Param::user("who").default(fallback.clone())],
        )
        .await
        .unwrap();
        assert_eq!(args.get::<User>("who").unwrap(), fallback);
    }

    #[tokio::test]
    async fn failed_lookups_use_default_or_fail() {
        let fx = Fixture::new();
        fx.client.fail_lookups(ApiError::NotConnected);

        let fallback = user(1);
        let args = parse_arguments(
            &fx.ctx("/cmd 42"),
            &[Param::user("who").default(fallback.clone())],
        )
        .await
        .unwrap();
        assert_eq!(args.get::<User>("who").unwrap(), fallback);

        let err = parse_arguments(&fx.ctx("/cmd -300"), &[Param::chat("chat")])
            .await
            .unwrap_err();
        assert!(
            matches!(err, ArgumentError::Conversion { ref converter, .. } if converter == "ChatConverter")
        );
    }

    #[tokio::test]
    async fn oversized_ids_are_conversion_failures() {
        let fx = Fixture::new();
        let token = "/cmd 99999999999999999999";

        let fallback = user(1);
        let args = parse_arguments(&fx.ctx(token), &[Param::user("who").default(fallback.clone())])
            .await
            .unwrap();
        assert_eq!(args.get::<User>("who").unwrap(), fallback);

        let err = parse_arguments(&fx.ctx(token), &[Param::user("who")])
            .await
            .unwrap_err();
        assert!(
            matches!(err, ArgumentError::Conversion { ref converter, .. } if converter == "UserConverter")
        );

        let err = parse_arguments(&fx.ctx(token), &[Param::member("who")])
            .await
            .unwrap_err();
        assert!(matches!(err, ArgumentError::Conversion { .. }));
        assert_eq!(fx.client.member_calls(), 0);
    }

    #[tokio::test]
    async fn user_resolving_to_chat_is_bad_result() {
        let fx = Fixture::new();
        fx.client.add_peer(
            PeerRef::Username("news".into()),
            ResolvedPeer::Chat(Chat::new(-200, ChatType::Channel)),
        );
        let err = parse_arguments(
            &fx.ctx("/cmd @news"),
            &[Param::user("who").default(user(1))],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ArgumentError::BadResult { .. }));
    }

    #[tokio::test]
    async fn chat_and_member_lookups() {
        let fx = Fixture::new();
        let args = parse_arguments(
            &fx.ctx("/cmd -300 12 someone"),
            &[Param::chat("chat"), Param::member("member"), Param::member("nobody")],
        )
        .await
        .unwrap();
        assert_eq!(args.get::<Chat>("chat").unwrap().id, -300);
        assert_eq!(args.get::<pylon_core::ChatMember>("member").unwrap().user.id, 12);
        assert_eq!(args.arg("nobody"), Some(&Arg::None));
    }
}
