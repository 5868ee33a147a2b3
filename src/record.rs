//! Record schema capability
//!
//! A stored type only has to be serde-serializable. Implementing [`Record`]
//! (usually with an empty `impl` block) names its table and plugs in the
//! JSON serialization, validation and field mapping the engine relies on.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type that can be stored in a [`crate::Table`].
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     id: u32,
///     name: String,
/// }
///
/// impl nondb::Record for Person {}
///
/// assert_eq!(<Person as nondb::Record>::schema_name(), "Person");
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name for this type; defaults to the bare type name
    fn schema_name() -> String {
        type_basename(std::any::type_name::<Self>())
    }

    /// Canonical serialization written to disk
    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialize)
    }

    /// Parse stored content, failing with `Error::Validation`
    fn from_json(name: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Validation {
            name: name.to_string(),
            source,
        })
    }

    /// Field mapping that key-expressions are evaluated against
    fn field_map(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::Serialize)
    }
}

/// Schemaless records. Tables of `Value` are opened by name.
impl Record for Value {
    fn field_map(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

/// `my_crate::models::Person<u32>` -> `Person`
fn type_basename(full: &str) -> String {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u32,
        label: String,
    }

    impl Record for Widget {}

    #[derive(Serialize, Deserialize)]
    struct Renamed {
        id: u32,
    }

    impl Record for Renamed {
        fn schema_name() -> String {
            "Gadget".to_string()
        }
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(Widget::schema_name(), "Widget");
        assert_eq!(Renamed::schema_name(), "Gadget");
        assert_eq!(Value::schema_name(), "Value");
        assert_eq!(type_basename("a::b::Thing<c::D>"), "Thing");
    }

    #[test]
    fn test_json_roundtrip_and_field_map() {
        let widget = Widget { id: 3, label: "knob".into() };
        let text = widget.to_json().unwrap();
        assert_eq!(Widget::from_json("3", &text).unwrap(), widget);
        assert_eq!(widget.field_map().unwrap(), json!({"id": 3, "label": "knob"}));
    }

    #[test]
    fn test_validation_failure() {
        let err = Widget::from_json("3", r#"{"id": "three"}"#).unwrap_err();
        assert!(matches!(err, Error::Validation { ref name, .. } if name == "3"));
    }
}
