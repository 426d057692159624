//! Declaration of a single option.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::value::{set_path, Map, Value};

/// The data type hint of an option.
///
/// It shapes how the command line flag behaves and how a textual environment variable is turned
/// into a [`Value`]. Values coming from configuration files are taken as they are.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Type {
    /// Takes a value, stored as a string.
    String,
    /// Takes a value that must parse as a number.
    Number,
    /// A switch without a value.
    Boolean,
    /// Takes a value and may be repeated; the values are collected.
    Array,
    /// A switch without a value that may be repeated; the number of occurrences is stored.
    Count,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let name = match self {
            Type::String => "string",
            Type::Number => "number",
            Type::Boolean => "boolean",
            Type::Array => "array",
            Type::Count => "count",
        };
        write!(fmt, "{}", name)
    }
}

/// Parses a textual number.
///
/// Integers are preferred, so `42` doesn't become `42.0`.
pub(crate) fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    s.parse::<i64>()
        .map(Value::Integer)
        .or_else(|_| s.parse::<f64>().map(Value::Float))
        .ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// An option the application wants to have configured.
///
/// Only the [`name`][Opt::name] is mandatory. Without a [`flag`][Opt::flag] the option is not
/// available on the command line, without an [`env`][Opt::env] it is not read from the
/// environment. Configuration files can set any option, as they are merged into the tree as a
/// whole.
///
/// The resolved value lives in the configuration tree at [`location`][Opt::location].
///
/// # Examples
///
/// ```rust
/// use optfold::{Opt, Type};
///
/// let port = Opt::new("port")
///     .path("server.listen")
///     .flag("port")
///     .short('p')
///     .env("APP_PORT")
///     .ty(Type::Number)
///     .default_value(8080)
///     .description("Port to listen on");
/// assert_eq!("server.listen.port", port.location());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Opt {
    /// Identifier of the option, unique within a registry.
    pub name: String,
    /// The long command line flag, without the leading dashes.
    pub flag: Option<String>,
    /// The single-character alias of the flag.
    pub short_flag: Option<char>,
    /// Name of the environment variable to read.
    pub env_flag: Option<String>,
    /// Dot-delimited location of the parent level in the tree; empty for the top level.
    pub path: String,
    /// Help text for the command line.
    pub description: Option<String>,
    /// The value used when no source provides one.
    pub default: Option<Value>,
    /// Shapes the command line flag and the parsing of the environment variable.
    pub ty: Option<Type>,
    /// The flag refuses to be given without an argument.
    pub required: bool,
    /// Values the command line accepts for this flag.
    pub choices: Vec<String>,
    /// The flag may be repeated and the values form an array.
    pub is_array: bool,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl Opt {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the long command line flag (`--flag`).
    ///
    /// An empty string leaves the option off the command line.
    pub fn flag<F: Into<String>>(self, flag: F) -> Self {
        Self {
            flag: non_empty(flag.into()),
            ..self
        }
    }

    /// Sets the short alias of the flag (`-f`).
    pub fn short(self, short: char) -> Self {
        Self {
            short_flag: Some(short),
            ..self
        }
    }

    /// Reads the option from the given environment variable.
    pub fn env<E: Into<String>>(self, env: E) -> Self {
        Self {
            env_flag: non_empty(env.into()),
            ..self
        }
    }

    /// Places the option below this dot-delimited path.
    pub fn path<P: Into<String>>(self, path: P) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }

    pub fn description<D: Into<String>>(self, description: D) -> Self {
        Self {
            description: non_empty(description.into()),
            ..self
        }
    }

    pub fn default_value<V: Into<Value>>(self, default: V) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }

    pub fn ty(self, ty: Type) -> Self {
        Self {
            ty: Some(ty),
            ..self
        }
    }

    pub fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub fn choices<I, C>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn array(self) -> Self {
        Self {
            is_array: true,
            ..self
        }
    }

    /// The full dot-delimited location of the resolved value.
    pub fn location(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.path, self.name)
        }
    }

    /// Writes the value into the tree at this option's location.
    ///
    /// Missing levels of the path are created. The value is not checked against the type hint.
    pub fn set_value(&self, tree: &mut Map, value: Value) {
        if self.path.is_empty() {
            tree.insert(self.name.clone(), value);
        } else {
            set_path(tree, &self.location(), value);
        }
    }

    /// The value written before any source is consulted.
    pub(crate) fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// Does the option collect multiple values?
    pub(crate) fn collects(&self) -> bool {
        self.is_array || self.ty == Some(Type::Array)
    }

    /// Turns text from the environment into a value, guided by the type hint.
    ///
    /// Returns the error description if the text doesn't fit the type. Untyped and string options
    /// take the text verbatim.
    pub(crate) fn coerce(&self, raw: &str) -> Result<Value, String> {
        if self.collects() {
            let element = Opt {
                is_array: false,
                ty: self.ty.filter(|ty| *ty != Type::Array),
                ..Opt::default()
            };
            return raw
                .split(',')
                .map(|part| element.coerce(part.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }
        match self.ty {
            None | Some(Type::String) | Some(Type::Array) => Ok(Value::String(raw.to_owned())),
            Some(Type::Number) | Some(Type::Count) => {
                parse_number(raw).ok_or_else(|| format!("{:?} is not a number", raw))
            }
            Some(Type::Boolean) => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("{:?} is not a boolean", raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location() {
        assert_eq!("inDebt", Opt::new("inDebt").location());
        assert_eq!("someValue.obj2.fred", Opt::new("fred").path("someValue.obj2").location());
    }

    #[test]
    fn empty_means_unset() {
        let opt = Opt::new("x").flag("").env("").description("");
        assert!(opt.flag.is_none());
        assert!(opt.env_flag.is_none());
        assert!(opt.description.is_none());
    }

    #[test]
    fn set_value_at_location() {
        let mut tree = Map::new();
        Opt::new("inDebt").set_value(&mut tree, "ENVOverride".into());
        Opt::new("fred")
            .path("someValue.obj2")
            .set_value(&mut tree, "Mertz".into());
        assert_eq!(Some(&Value::from("ENVOverride")), tree.get("inDebt"));
        assert_eq!(
            Some(&Value::from("Mertz")),
            crate::value::get_path(&tree, "someValue.obj2.fred")
        );
    }

    #[test]
    fn no_default_is_null() {
        assert_eq!(Value::Null, Opt::new("x").initial_value());
        assert_eq!(Value::from("rrrr"), Opt::new("x").default_value("rrrr").initial_value());
    }

    #[test]
    fn coerce_untyped() {
        assert_eq!(Ok(Value::from("42")), Opt::new("x").coerce("42"));
    }

    #[test]
    fn coerce_number() {
        let opt = Opt::new("x").ty(Type::Number);
        assert_eq!(Ok(Value::Integer(42)), opt.coerce("42"));
        assert_eq!(Ok(Value::Float(0.5)), opt.coerce("0.5"));
        assert!(opt.coerce("many").is_err());
    }

    #[test]
    fn coerce_bool() {
        let opt = Opt::new("x").ty(Type::Boolean);
        assert_eq!(Ok(Value::Bool(true)), opt.coerce("yes"));
        assert_eq!(Ok(Value::Bool(false)), opt.coerce("0"));
        assert!(opt.coerce("maybe").is_err());
    }

    #[test]
    fn coerce_array() {
        let strings = Opt::new("x").ty(Type::Array);
        assert_eq!(Ok(Value::from(vec!["a", "b"])), strings.coerce("a, b"));
        let numbers = Opt::new("x").ty(Type::Number).array();
        assert_eq!(Ok(Value::from(vec![1, 2])), numbers.coerce("1,2"));
    }
}
