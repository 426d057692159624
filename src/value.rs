//! The resolved configuration tree.
//!
//! Every source (defaults, files, environment, command line) ends up as [`Value`]s stored in a
//! single [`Map`]. Options address their place in the tree by dot-delimited paths, like
//! `server.listen.port`.
//!
//! The tree can be read directly, or decoded into any type implementing [`Deserialize`]. The
//! [`Value`] is a serde [`Deserializer`] on its own.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::de::value::{Error as DeError, MapAccessDeserializer, MapDeserializer, SeqDeserializer};
use serde::de::{
    self, Deserialize, Deserializer, Error as _, IntoDeserializer, MapAccess, SeqAccess,
    Unexpected, Visitor,
};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A nested level of the configuration tree.
///
/// Ordered by key, so dumps and logs of the tree are stable.
pub type Map = BTreeMap<String, Value>;

/// A single node of the configuration tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicitly nothing.
    ///
    /// Options without a default start their life as this.
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    /// A short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, integers included.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a dot-delimited path below this value.
    ///
    /// Returns `None` if this is not a map or anything on the way is missing.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        self.as_map().and_then(|map| get_path(map, path))
    }

    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Value::Null => Unexpected::Unit,
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Integer(i) => Unexpected::Signed(*i),
            Value::Float(f) => Unexpected::Float(*f),
            Value::String(s) => Unexpected::Str(s),
            Value::Array(_) => Unexpected::Seq,
            Value::Map(_) => Unexpected::Map,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Writes the value at the dot-delimited path, creating the intermediate levels.
///
/// Anything standing in the way that is not a map is replaced by an empty map. Each segment is
/// taken literally, there is no array indexing.
pub fn set_path(map: &mut Map, path: &str, value: Value) {
    let mut segments = path.split('.');
    // split always yields at least one item
    let mut last = segments.next().unwrap_or_default();
    let mut current = map;
    for segment in segments {
        let node = current
            .entry(last.to_owned())
            .or_insert_with(|| Value::Map(Map::new()));
        if !matches!(node, Value::Map(_)) {
            *node = Value::Map(Map::new());
        }
        current = match node {
            Value::Map(inner) => inner,
            _ => unreachable!("Replaced by a map just above"),
        };
        last = segment;
    }
    current.insert(last.to_owned(), value);
}

/// Finds the value at the dot-delimited path.
pub fn get_path<'a>(map: &'a Map, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    segments.try_fold(map.get(first)?, |node, segment| node.as_map()?.get(segment))
}

impl Display for Value {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Value::Null => write!(fmt, "null"),
            Value::Bool(b) => write!(fmt, "{}", b),
            Value::Integer(i) => write!(fmt, "{}", i),
            Value::Float(f) => write!(fmt, "{}", f),
            Value::String(s) => write!(fmt, "{}", s),
            Value::Array(items) => {
                write!(fmt, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, ", ")?;
                    }
                    write!(fmt, "{}", item)?;
                }
                write!(fmt, "]")
            }
            Value::Map(map) => {
                write!(fmt, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, ", ")?;
                    }
                    write!(fmt, "{}: {}", key, item)?;
                }
                write!(fmt, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => s.serialize_unit(),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Integer(i) => s.serialize_i64(*i),
            Value::Float(f) => s.serialize_f64(*f),
            Value::String(v) => s.serialize_str(v),
            Value::Array(items) => {
                let mut seq = s.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = s.serialize_map(Some(map.len()))?;
                for (key, item) in map {
                    out.serialize_entry(key, item)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "any configuration value")
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Integer(i))
    }

    fn visit_u64<E>(self, u: u64) -> Result<Value, E> {
        // Too large ones lose precision, but still keep the magnitude.
        if u <= i64::MAX as u64 {
            Ok(Value::Integer(u as i64))
        } else {
            Ok(Value::Float(u as f64))
        }
    }

    fn visit_f64<E>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_owned()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some((key, item)) = access.next_entry::<KeyString, Value>()? {
            map.insert(key.0, item);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

/// A map key.
///
/// YAML happily allows `1: one` or `true: yes`. Such keys are turned into their textual form, as
/// the tree is addressed by string paths only.
struct KeyString(String);

impl<'de> Deserialize<'de> for KeyString {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = KeyString;

            fn expecting(&self, fmt: &mut Formatter) -> FmtResult {
                write!(fmt, "a scalar map key")
            }

            fn visit_bool<E>(self, b: bool) -> Result<KeyString, E> {
                Ok(KeyString(b.to_string()))
            }

            fn visit_i64<E>(self, i: i64) -> Result<KeyString, E> {
                Ok(KeyString(i.to_string()))
            }

            fn visit_u64<E>(self, u: u64) -> Result<KeyString, E> {
                Ok(KeyString(u.to_string()))
            }

            fn visit_f64<E>(self, f: f64) -> Result<KeyString, E> {
                Ok(KeyString(f.to_string()))
            }

            fn visit_str<E>(self, s: &str) -> Result<KeyString, E> {
                Ok(KeyString(s.to_owned()))
            }

            fn visit_string<E>(self, s: String) -> Result<KeyString, E> {
                Ok(KeyString(s))
            }
        }

        d.deserialize_any(KeyVisitor)
    }
}

impl<'de> IntoDeserializer<'de, DeError> for Value {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for Value {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Integer(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => {
                let mut seq = SeqDeserializer::<_, DeError>::new(items.into_iter());
                let result = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(result)
            }
            Value::Map(map) => {
                let mut access = MapDeserializer::<_, DeError>::new(map.into_iter());
                let result = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(result)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        match self {
            Value::String(variant) => {
                let variant: de::value::StringDeserializer<DeError> =
                    variant.into_deserializer();
                visitor.visit_enum(variant)
            }
            Value::Map(map) => {
                visitor.visit_enum(MapAccessDeserializer::new(
                    MapDeserializer::<_, DeError>::new(map.into_iter()),
                ))
            }
            other => Err(DeError::invalid_type(
                other.unexpected(),
                &"a variant name or a single-entry map",
            )),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string bytes byte_buf unit
        unit_struct seq tuple tuple_struct map struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use serde::Deserialize;

    use super::*;

    #[test]
    fn set_top_level() {
        let mut map = Map::new();
        set_path(&mut map, "name", "value".into());
        assert_eq!(Some(&Value::from("value")), map.get("name"));
    }

    #[test]
    fn set_creates_levels() {
        let mut map = Map::new();
        set_path(&mut map, "a.b.c", 42.into());
        assert_eq!(Some(&Value::Integer(42)), get_path(&map, "a.b.c"));
        assert!(get_path(&map, "a.b").unwrap().as_map().is_some());
    }

    /// Siblings that are already there stay in place.
    #[test]
    fn set_keeps_siblings() {
        let mut map = btreemap! {
            "a".to_owned() => Value::Map(btreemap! {
                "x".to_owned() => Value::from(1),
            }),
        };
        set_path(&mut map, "a.y", 2.into());
        assert_eq!(Some(&Value::Integer(1)), get_path(&map, "a.x"));
        assert_eq!(Some(&Value::Integer(2)), get_path(&map, "a.y"));
    }

    #[test]
    fn set_replaces_scalar_in_the_way() {
        let mut map = btreemap! {
            "a".to_owned() => Value::from("scalar"),
        };
        set_path(&mut map, "a.b", true.into());
        assert_eq!(Some(&Value::Bool(true)), get_path(&map, "a.b"));
    }

    #[test]
    fn get_missing() {
        let map = btreemap! {
            "a".to_owned() => Value::from(1),
        };
        assert!(get_path(&map, "b").is_none());
        assert!(get_path(&map, "a.b").is_none());
    }

    #[test]
    fn decode_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Level {
            Warn,
            Debug,
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Server {
            host: String,
            port: u16,
            level: Level,
            #[serde(default)]
            tags: Vec<String>,
            timeout: Option<f64>,
        }

        let tree = Value::Map(btreemap! {
            "host".to_owned() => Value::from("localhost"),
            "port".to_owned() => Value::from(8080),
            "level".to_owned() => Value::from("debug"),
            "tags".to_owned() => Value::from(vec!["a", "b"]),
            "timeout".to_owned() => Value::Null,
        });
        let server = Server::deserialize(tree).unwrap();
        assert_eq!(
            Server {
                host: "localhost".to_owned(),
                port: 8080,
                level: Level::Debug,
                tags: vec!["a".to_owned(), "b".to_owned()],
                timeout: None,
            },
            server
        );
    }

    #[test]
    fn decode_wrong_type() {
        let err = u16::deserialize(Value::from("not a number")).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn display() {
        let tree = Value::Map(btreemap! {
            "list".to_owned() => Value::from(vec![1, 2]),
            "name".to_owned() => Value::from("x"),
        });
        assert_eq!("{list: [1, 2], name: x}", tree.to_string());
    }
}
