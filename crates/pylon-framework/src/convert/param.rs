//! Parameter descriptors.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::BoxError;

use super::value::Arg;

/// Synchronous conversion function.
pub type ConvertFn = Arc<dyn Fn(&str) -> Result<Arg, BoxError> + Send + Sync>;

/// Asynchronous conversion function.
pub type AsyncConvertFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Arg, BoxError>> + Send + Sync>;

/// Platform entities with a dedicated converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Chat,
    ChatMember,
}

/// How a token becomes a value.
#[derive(Clone)]
pub enum Conversion {
    /// The token itself.
    Raw,
    /// The "nothing" alternative of an optional parameter.
    Absent,
    Bool,
    Int,
    Float,
    Func(ConvertFn),
    AsyncFunc(AsyncConvertFn),
    Entity(EntityType),
    /// Alternatives. Only the first one that is not [`Absent`](Self::Absent)
    /// is used.
    Union(Vec<Conversion>),
}

static ABSENT: Conversion = Conversion::Absent;

impl Conversion {
    /// Unwraps unions down to the conversion actually applied.
    pub fn effective(&self) -> &Conversion {
        let mut current = self;
        while let Self::Union(alternatives) = current {
            current = alternatives
                .iter()
                .find(|alt| !matches!(alt, Self::Absent))
                .unwrap_or(&ABSENT);
        }
        current
    }

    /// Name used in conversion errors.
    pub fn name(&self) -> Cow<'static, str> {
        match self.effective() {
            Self::Raw => "raw".into(),
            Self::Absent => "absent".into(),
            Self::Bool => "bool".into(),
            Self::Int => "int".into(),
            Self::Float => "float".into(),
            Self::Func(_) => "function".into(),
            Self::AsyncFunc(_) => "async function".into(),
            Self::Entity(kind) => format!("{kind:?}Converter").into(),
            Self::Union(_) => "union".into(),
        }
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Func(..)"),
            Self::AsyncFunc(_) => f.write_str("AsyncFunc(..)"),
            Self::Entity(kind) => f.debug_tuple("Entity").field(kind).finish(),
            Self::Union(alternatives) => f.debug_tuple("Union").field(alternatives).finish(),
            Self::Raw => f.write_str("Raw"),
            Self::Absent => f.write_str("Absent"),
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
        }
    }
}

/// How a parameter consumes tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// One token.
    Positional,
    /// Every remaining token, joined by single spaces.
    KeywordRest,
    /// Not supported; rejected when the command is built.
    Variadic,
}

/// One handler parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub conversion: Conversion,
    pub default: Option<Arg>,
}

impl Param {
    pub fn new(name: impl Into<String>, conversion: Conversion) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            conversion,
            default: None,
        }
    }

    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Raw)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Bool)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Entity(EntityType::User))
    }

    pub fn chat(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Entity(EntityType::Chat))
    }

    pub fn member(name: impl Into<String>) -> Self {
        Self::new(name, Conversion::Entity(EntityType::ChatMember))
    }

    /// A parameter converted by a plain function.
    pub fn func<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<Arg, BoxError> + Send + Sync + 'static,
    {
        Self::new(name, Conversion::Func(Arc::new(f)))
    }

    /// A parameter converted by an async function.
    pub fn async_func<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arg, BoxError>> + Send + 'static,
    {
        Self::new(
            name,
            Conversion::AsyncFunc(Arc::new(move |token| f(token).boxed())),
        )
    }

    /// The rest of the input as one string.
    pub fn rest(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::KeywordRest,
            ..Self::raw(name)
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::Variadic,
            ..Self::raw(name)
        }
    }

    /// Value used when the token is missing or fails to convert.
    pub fn default(mut self, value: impl Into<Arg>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the parameter optional: `Union[conversion, Absent]`.
    pub fn optional(mut self) -> Self {
        self.conversion = Conversion::Union(vec![self.conversion, Conversion::Absent]);
        self
    }
}
