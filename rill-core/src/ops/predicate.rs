//! Predicates, Shapes and Property Paths
//!
//! `filter` and `exclude` accept a [`Predicate`], which is one of three
//! variants fixed at construction time:
//!
//! - a test function,
//! - a truthiness test (via [`Truthy`]),
//! - a partial structural match against a [`Shape`].
//!
//! Structural matching and property paths work on the `serde_json`
//! representation of a value, so any `Serialize` type can be matched.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::error::FlowError;

/// Values with a notion of truthiness.
///
/// Zero, empty strings, `false`, `None`, `NaN` and JSON `null` are falsy.
pub trait Truthy {
    /// Whether the value counts as true.
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! truthy_int {
    ($($ty:ty),*) => {
        $(impl Truthy for $ty {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

truthy_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for &'static str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().map_or(false, Truthy::is_truthy)
    }
}

impl Truthy for Json {
    fn is_truthy(&self) -> bool {
        match self {
            Json::Null => false,
            Json::Bool(b) => *b,
            Json::Number(n) => n.as_f64().map_or(true, |f| f.is_truthy()),
            Json::String(s) => !s.is_empty(),
            Json::Array(_) | Json::Object(_) => true,
        }
    }
}

/// A partial structural matcher.
///
/// A candidate matches when it contains every key of the shape with an
/// equal value. Nested objects in the shape are themselves matched
/// partially; everything else is compared for equality.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pairs: Vec<(String, Json)>,
}

impl Shape {
    /// Build a shape from a JSON object.
    pub fn new(shape: Json) -> Result<Self, FlowError> {
        match shape {
            Json::Object(map) => Ok(Self {
                pairs: map.into_iter().collect(),
            }),
            other => Err(FlowError::InvalidShape {
                found: json_kind(&other),
            }),
        }
    }

    /// Match an already-encoded candidate.
    pub fn matches_json(&self, candidate: &Json) -> bool {
        match candidate {
            Json::Object(fields) => object_contains(fields, &self.pairs),
            _ => self.pairs.is_empty(),
        }
    }

    /// Match any serializable candidate.
    pub fn matches<T: Serialize + ?Sized>(&self, candidate: &T) -> bool {
        match serde_json::to_value(candidate) {
            Ok(json) => self.matches_json(&json),
            Err(err) => {
                trace!(%err, "candidate could not be encoded for shape match");
                false
            }
        }
    }
}

fn object_contains(fields: &Map<String, Json>, pairs: &[(String, Json)]) -> bool {
    pairs.iter().all(|(key, expected)| match fields.get(key) {
        Some(actual) => json_contains(actual, expected),
        None => false,
    })
}

fn json_contains(actual: &Json, expected: &Json) -> bool {
    match (actual, expected) {
        (Json::Object(actual), Json::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).map_or(false, |a| json_contains(a, value))),
        _ => actual == expected,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// A dotted path into a value's JSON representation, such as
/// `"owner.name"` or `"tags.0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, FlowError> {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if path.is_empty() || segments.iter().any(String::is_empty) {
            return Err(FlowError::InvalidPath {
                path: path.to_owned(),
            });
        }
        Ok(Self { segments })
    }

    /// The value at this path, or `null` if any step is missing.
    pub fn select(&self, root: &Json) -> Json {
        let mut current = root;
        for segment in &self.segments {
            let next = match current {
                Json::Object(map) => map.get(segment),
                Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Json::Null,
            }
        }
        current.clone()
    }
}

type Test<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Encode<T> = fn(&T) -> Result<Json, serde_json::Error>;

fn encode<T: Serialize>(value: &T) -> Result<Json, serde_json::Error> {
    serde_json::to_value(value)
}

/// How `filter` and `exclude` decide whether a value passes.
pub enum Predicate<T> {
    /// An arbitrary test.
    Test(Test<T>),
    /// The value's own truthiness.
    Truthy(fn(&T) -> bool),
    /// A partial structural match.
    Matches {
        /// The expected key/value pairs.
        shape: Shape,
        /// How candidates are turned into JSON.
        encode: Encode<T>,
    },
}

impl<T> Predicate<T> {
    /// Wrap a test function.
    pub fn test_with<F>(f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Predicate::Test(Arc::new(f))
    }

    /// Pass truthy values.
    pub fn truthy() -> Self
    where
        T: Truthy,
    {
        Predicate::Truthy(<T as Truthy>::is_truthy)
    }

    /// Pass values that structurally match `shape`.
    pub fn matches(shape: Shape) -> Self
    where
        T: Serialize,
    {
        Predicate::Matches {
            shape,
            encode: encode::<T>,
        }
    }

    /// Evaluate the predicate.
    pub fn test(&self, value: &T) -> bool {
        match self {
            Predicate::Test(f) => f(value),
            Predicate::Truthy(f) => f(value),
            Predicate::Matches { shape, encode } => match encode(value) {
                Ok(json) => shape.matches_json(&json),
                Err(err) => {
                    trace!(%err, "candidate could not be encoded for shape match");
                    false
                }
            },
        }
    }
}

impl<T, F> From<F> for Predicate<T>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Predicate::Test(Arc::new(f))
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        match self {
            Predicate::Test(f) => Predicate::Test(Arc::clone(f)),
            Predicate::Truthy(f) => Predicate::Truthy(*f),
            Predicate::Matches { shape, encode } => Predicate::Matches {
                shape: shape.clone(),
                encode: *encode,
            },
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Test(_) => f.write_str("Predicate::Test(..)"),
            Predicate::Truthy(_) => f.write_str("Predicate::Truthy"),
            Predicate::Matches { shape, .. } => {
                f.debug_tuple("Predicate::Matches").field(shape).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Hero {
        name: &'static str,
        alignment: &'static str,
    }

    #[test]
    fn truthiness() {
        assert!(3i32.is_truthy());
        assert!(!0u8.is_truthy());
        assert!(!f64::NAN.is_truthy());
        assert!(!String::new().is_truthy());
        assert!(Some(1i32).is_truthy());
        assert!(!None::<i32>.is_truthy());
        assert!(!Json::Null.is_truthy());
        assert!(json!([]).is_truthy());
    }

    #[test]
    fn shape_rejects_non_objects() {
        let err = Shape::new(json!([1, 2])).unwrap_err();
        assert!(matches!(err, FlowError::InvalidShape { found: "array" }));

        assert!(Shape::new(json!("good")).is_err());
        assert!(Shape::new(json!({})).is_ok());
    }

    #[test]
    fn shape_matches_partially() {
        let shape = Shape::new(json!({ "alignment": "good" })).unwrap();

        assert!(shape.matches(&Hero { name: "Bruce", alignment: "good" }));
        assert!(!shape.matches(&Hero { name: "Jenny", alignment: "evil" }));
        assert!(!shape.matches(&json!({ "name": "Boz" })));
    }

    #[test]
    fn shape_matches_nested_objects_partially() {
        let shape = Shape::new(json!({ "owner": { "name": "ada" } })).unwrap();

        assert!(shape.matches_json(&json!({ "owner": { "name": "ada", "age": 36 }, "id": 1 })));
        assert!(!shape.matches_json(&json!({ "owner": { "name": "bob" } })));
    }

    #[test]
    fn property_path_selects_nested_values() {
        let path = PropertyPath::parse("owner.tags.1").unwrap();
        let doc = json!({ "owner": { "tags": ["a", "b"] } });

        assert_eq!(path.select(&doc), json!("b"));
        assert_eq!(PropertyPath::parse("owner.missing").unwrap().select(&doc), Json::Null);
    }

    #[test]
    fn property_path_rejects_empty_segments() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("a..b").is_err());
        assert!(PropertyPath::parse(".a").is_err());
    }

    #[test]
    fn predicate_variants() {
        let even: Predicate<i32> = Predicate::from(|x: &i32| x % 2 == 0);
        assert!(even.test(&4));
        assert!(!even.test(&3));

        let truthy: Predicate<i32> = Predicate::truthy();
        assert!(truthy.test(&3));
        assert!(!truthy.test(&0));

        let good: Predicate<Hero> =
            Predicate::matches(Shape::new(json!({ "alignment": "good" })).unwrap());
        assert!(good.test(&Hero { name: "Bruce", alignment: "good" }));
    }
}
