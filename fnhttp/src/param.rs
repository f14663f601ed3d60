//! Typed parameter holders populated from the request

use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use once_cell::sync::OnceCell;
use serde::de::{value::StringDeserializer, DeserializeOwned};

use crate::{error::BoxError, values::ValuesDeserializer, Source};

/// The declared value type of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
}

impl TargetType {
    /// The target type for `T`
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Whether this target is exactly `T`
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// The type name, for diagnostics
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A parameter whose value arrives from the request
///
/// A holder is created once per invocation and assigned at most once by the
/// parameter assignment filter. Clones share the same underlying cell, so
/// the function body sees whatever the filter assigned.
pub struct HttpParam<T> {
    source: Source,
    cell: Arc<OnceCell<T>>,
}

impl<T> HttpParam<T> {
    /// Constructs an unassigned holder
    pub fn new(source: Source) -> Self {
        Self {
            source,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// The declared source of the value
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The assigned value, if any
    pub fn value(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Whether a value has been assigned
    pub fn is_assigned(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Assigns the value, returning it back if one was already assigned
    pub fn set(&self, value: T) -> Result<(), T> {
        self.cell.set(value)
    }
}

impl<T: Clone> HttpParam<T> {
    /// A copy of the assigned value, if any
    pub fn cloned(&self) -> Option<T> {
        self.cell.get().cloned()
    }
}

impl<T> Clone for HttpParam<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for HttpParam<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpParam")
            .field("source", &self.source)
            .field("target", &std::any::type_name::<T>())
            .field("assigned", &self.is_assigned())
            .finish()
    }
}

/// Type-erased access to a [`HttpParam`] for the assignment filter
pub trait ParamSlot: fmt::Debug + Send + Sync {
    /// The declared source of the value
    fn source(&self) -> &Source;

    /// The declared value type
    fn target(&self) -> TargetType;

    /// Whether a value has been assigned
    fn is_assigned(&self) -> bool;

    /// Assigns an already-constructed value of the declared type
    fn assign_value(&self, value: Box<dyn Any + Send + Sync>) -> Result<(), BoxError>;

    /// Converts and assigns one or more raw string values
    fn assign_values(&self, values: &[String]) -> Result<(), BoxError>;

    /// Decodes and assigns a JSON document
    fn assign_json(&self, body: &[u8]) -> Result<(), BoxError>;

    /// Decodes and assigns an XML document
    fn assign_xml(&self, body: &str) -> Result<(), BoxError>;

    /// Assigns raw text
    fn assign_text(&self, body: &str) -> Result<(), BoxError>;

    /// Access to the concrete holder
    fn as_any(&self) -> &dyn Any;
}

impl<T> HttpParam<T>
where
    T: Send + Sync + 'static,
{
    fn put(&self, value: T) -> Result<(), BoxError> {
        self.set(value)
            .map_err(|_| BoxError::from("parameter value has already been assigned"))
    }
}

impl<T> ParamSlot for HttpParam<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn source(&self) -> &Source {
        &self.source
    }

    fn target(&self) -> TargetType {
        TargetType::of::<T>()
    }

    fn is_assigned(&self) -> bool {
        HttpParam::is_assigned(self)
    }

    fn assign_value(&self, value: Box<dyn Any + Send + Sync>) -> Result<(), BoxError> {
        let value = value.downcast::<T>().map_err(|_| {
            BoxError::from(format!(
                "produced value is not of the declared type '{}'",
                std::any::type_name::<T>()
            ))
        })?;
        self.put(*value)
    }

    fn assign_values(&self, values: &[String]) -> Result<(), BoxError> {
        let value = T::deserialize(ValuesDeserializer::new(values))?;
        self.put(value)
    }

    fn assign_json(&self, body: &[u8]) -> Result<(), BoxError> {
        let value = serde_json::from_slice(body)?;
        self.put(value)
    }

    fn assign_xml(&self, body: &str) -> Result<(), BoxError> {
        let value = quick_xml::de::from_str(body)?;
        self.put(value)
    }

    fn assign_text(&self, body: &str) -> Result<(), BoxError> {
        let de = StringDeserializer::<serde::de::value::Error>::new(body.to_owned());
        let value = T::deserialize(de)?;
        self.put(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Constructs a fresh, type-erased holder for `T`
pub(crate) fn make_slot<T>(source: Source) -> Arc<dyn ParamSlot>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    Arc::new(HttpParam::<T>::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
        item: String,
    }

    #[test]
    fn clones_share_assignment() {
        let param = HttpParam::<u32>::new(Source::query());
        let view = param.clone();
        assert!(!view.is_assigned());
        param.set(5).unwrap();
        assert_eq!(view.value(), Some(&5));
    }

    #[test]
    fn values_are_assigned_only_once() {
        let param = HttpParam::<String>::new(Source::header());
        ParamSlot::assign_values(&param, &["a".to_owned()]).unwrap();
        assert!(ParamSlot::assign_values(&param, &["b".to_owned()]).is_err());
        assert_eq!(param.value().map(String::as_str), Some("a"));
    }

    #[test]
    fn xml_and_json_bodies_decode_to_the_same_value() {
        let json = HttpParam::<Order>::new(Source::body());
        json.assign_json(br#"{"id":7,"item":"lamp"}"#).unwrap();

        let xml = HttpParam::<Order>::new(Source::body());
        xml.assign_xml("<Order><id>7</id><item>lamp</item></Order>")
            .unwrap();

        assert_eq!(json.value(), xml.value());
    }

    #[test]
    fn boxed_values_must_match_the_target() {
        let param = HttpParam::<u64>::new(Source::form());
        assert!(param.assign_value(Box::new("nope")).is_err());
        param.assign_value(Box::new(9_u64)).unwrap();
        assert_eq!(param.value(), Some(&9));
    }
}
