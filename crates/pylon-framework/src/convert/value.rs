//! Converted values and the typed accessors handlers read them through.

use std::collections::HashMap;

use pylon_core::{Chat, ChatMember, User};
use serde_json::Value;

use crate::error::ArgumentError;

/// A converted argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Nothing supplied and no default.
    None,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    User(User),
    Chat(Chat),
    Member(ChatMember),
    Json(Value),
}

impl Arg {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::User(_) => "user",
            Self::Chat(_) => "chat",
            Self::Member(_) => "chat member",
            Self::Json(_) => "json",
        }
    }
}

macro_rules! impl_from_for_arg {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_arg! {
    String => Str,
    &str => Str,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    bool => Bool,
    User => User,
    Chat => Chat,
    ChatMember => Member,
    Value => Json,
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// Types a handler can read an [`Arg`] as.
pub trait FromArg: Sized {
    /// Name shown when the stored value has another type.
    const EXPECTED: &'static str;

    /// `None` when `arg` holds something else.
    fn from_arg(arg: &Arg) -> Option<Self>;
}

macro_rules! impl_from_arg {
    ($($ty:ty, $expected:literal, $pat:pat => $value:expr);* $(;)?) => {
        $(
            impl FromArg for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_arg(arg: &Arg) -> Option<Self> {
                    match arg {
                        $pat => Some($value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_arg! {
    String, "string", Arg::Str(s) => s.clone();
    i64, "int", Arg::Int(n) => *n;
    bool, "bool", Arg::Bool(b) => *b;
    User, "user", Arg::User(u) => u.clone();
    Chat, "chat", Arg::Chat(c) => c.clone();
    ChatMember, "chat member", Arg::Member(m) => m.clone();
    Value, "json", Arg::Json(v) => v.clone();
}

impl FromArg for f64 {
    const EXPECTED: &'static str = "float";

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Float(f) => Some(*f),
            Arg::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::None => Some(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

/// Converted arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<(String, Arg)>,
    keyword: HashMap<String, Arg>,
}

impl Arguments {
    pub(crate) fn push_positional(&mut self, name: &str, arg: Arg) {
        self.positional.push((name.to_string(), arg));
    }

    pub(crate) fn insert_keyword(&mut self, name: &str, arg: Arg) {
        self.keyword.insert(name.to_string(), arg);
    }

    /// The raw value stored under `name`.
    pub fn arg(&self, name: &str) -> Option<&Arg> {
        self.positional
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arg)| arg)
            .or_else(|| self.keyword.get(name))
    }

    /// Reads `name` as `T`. A missing value reads as [`Arg::None`], which only
    /// `Option<T>` accepts.
    pub fn get<T: FromArg>(&self, name: &str) -> Result<T, ArgumentError> {
        read(name, self.arg(name).unwrap_or(&Arg::None))
    }

    /// Reads the `index`-th positional value as `T`.
    pub fn positional<T: FromArg>(&self, index: usize) -> Result<T, ArgumentError> {
        match self.positional.get(index) {
            Some((name, arg)) => read(name, arg),
            None => read(&format!("#{index}"), &Arg::None),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read<T: FromArg>(name: &str, arg: &Arg) -> Result<T, ArgumentError> {
    T::from_arg(arg).ok_or_else(|| {
        ArgumentError::BadArgument(format!(
            "Argument '{name}' is {}, expected {}",
            arg.type_name(),
            T::EXPECTED
        ))
    })
}
