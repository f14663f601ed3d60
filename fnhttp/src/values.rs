//! Conversion of raw, possibly multi-valued request strings into typed values
//!
//! Sequence targets receive one element per raw value, in order. String
//! elements are taken verbatim, everything else is decoded as JSON. Scalar
//! string targets receive all values joined with `","`; other scalar targets
//! decode the joined value as JSON.

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use std::borrow::Cow;

type Error = serde_json::Error;

/// Deserializes a target from every raw value supplied for one name
#[derive(Debug)]
pub(crate) struct ValuesDeserializer<'a> {
    values: &'a [String],
}

impl<'a> ValuesDeserializer<'a> {
    pub(crate) fn new(values: &'a [String]) -> Self {
        Self { values }
    }

    fn joined(&self) -> ItemDeserializer<'a> {
        match self.values {
            [single] => ItemDeserializer::new(Cow::Borrowed(single.as_str())),
            values => ItemDeserializer::new(Cow::Owned(values.join(","))),
        }
    }

    fn single_json_array(&self) -> Option<&'a str> {
        match self.values {
            [single] if single.trim_start().starts_with('[') => Some(single.as_str()),
            _ => None,
        }
    }
}

macro_rules! forward_to_joined {
    ($($method:ident ( $($arg:ident : $ty:ty),* ))*) => {
        $(
            fn $method<V>(self, $($arg: $ty,)* visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                self.joined().$method($($arg,)* visitor)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for ValuesDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.values.len() > 1 {
            self.deserialize_seq(visitor)
        } else {
            self.joined().deserialize_any(visitor)
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(&self.values.join(","))
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.values.join(","))
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.values.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if let Some(array) = self.single_json_array() {
            return ItemDeserializer::new(Cow::Borrowed(array)).deserialize_seq(visitor);
        }

        visitor.visit_seq(Items {
            iter: self.values.iter(),
        })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    forward_to_joined! {
        deserialize_bool()
        deserialize_i8()
        deserialize_i16()
        deserialize_i32()
        deserialize_i64()
        deserialize_i128()
        deserialize_u8()
        deserialize_u16()
        deserialize_u32()
        deserialize_u64()
        deserialize_u128()
        deserialize_f32()
        deserialize_f64()
        deserialize_char()
        deserialize_bytes()
        deserialize_byte_buf()
        deserialize_unit()
        deserialize_unit_struct(name: &'static str)
        deserialize_map()
        deserialize_struct(name: &'static str, fields: &'static [&'static str])
        deserialize_enum(name: &'static str, variants: &'static [&'static str])
        deserialize_identifier()
        deserialize_ignored_any()
    }
}

struct Items<'a> {
    iter: std::slice::Iter<'a, String>,
}

impl<'de, 'a> SeqAccess<'de> for Items<'a> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed
                .deserialize(ItemDeserializer::new(Cow::Borrowed(value.as_str())))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Deserializes a target from a single raw string
#[derive(Debug)]
pub(crate) struct ItemDeserializer<'a> {
    text: Cow<'a, str>,
}

impl<'a> ItemDeserializer<'a> {
    pub(crate) fn new(text: Cow<'a, str>) -> Self {
        Self { text }
    }

    fn is_json(&self) -> bool {
        serde_json::from_str::<IgnoredAny>(&self.text).is_ok()
    }
}

macro_rules! forward_to_json {
    ($($method:ident ( $($arg:ident : $ty:ty),* ))*) => {
        $(
            fn $method<V>(self, $($arg: $ty,)* visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                let mut de = serde_json::Deserializer::from_reader(self.text.as_bytes());
                let value = de.$method($($arg,)* visitor)?;
                de.end()?;
                Ok(value)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for ItemDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.is_json() {
            let mut de = serde_json::Deserializer::from_reader(self.text.as_bytes());
            let value = de.deserialize_any(visitor)?;
            de.end()?;
            Ok(value)
        } else {
            visitor.visit_str(&self.text)
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(&self.text)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.text.into_owned())
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(&self.text)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(&self.text)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bytes(self.text.as_bytes())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_byte_buf(self.text.into_owned().into_bytes())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if matches!(&*self.text, "" | "null") {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let trimmed = self.text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('"') {
            let mut de = serde_json::Deserializer::from_reader(self.text.as_bytes());
            let value = de.deserialize_enum(name, variants, visitor)?;
            de.end()?;
            Ok(value)
        } else {
            visitor.visit_enum(de::value::StrDeserializer::<Error>::new(&self.text))
        }
    }

    forward_to_json! {
        deserialize_bool()
        deserialize_i8()
        deserialize_i16()
        deserialize_i32()
        deserialize_i64()
        deserialize_i128()
        deserialize_u8()
        deserialize_u16()
        deserialize_u32()
        deserialize_u64()
        deserialize_u128()
        deserialize_f32()
        deserialize_f64()
        deserialize_unit()
        deserialize_unit_struct(name: &'static str)
        deserialize_seq()
        deserialize_tuple(len: usize)
        deserialize_tuple_struct(name: &'static str, len: usize)
        deserialize_map()
        deserialize_struct(name: &'static str, fields: &'static [&'static str])
    }

    forward_to_deserialize_any! {
        ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn from_values<T: for<'de> Deserialize<'de>>(values: &[&str]) -> Result<T, Error> {
        let values: Vec<String> = values.iter().map(|s| (*s).to_owned()).collect();
        T::deserialize(ValuesDeserializer::new(&values))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn strings_are_taken_verbatim() {
        let v: String = from_values(&["hello world"]).unwrap();
        assert_eq!(v, "hello world");
    }

    #[test]
    fn multiple_values_join_into_a_string() {
        let v: String = from_values(&["a", "b", "c"]).unwrap();
        assert_eq!(v, "a,b,c");
    }

    #[test]
    fn sequences_preserve_count_and_order() {
        let v: Vec<i64> = from_values(&["3", "1", "2"]).unwrap();
        assert_eq!(v, vec![3, 1, 2]);

        let v: Vec<String> = from_values(&["z", "[not json", "a"]).unwrap();
        assert_eq!(v, vec!["z", "[not json", "a"]);
    }

    #[test]
    fn single_json_array_fills_a_sequence() {
        let v: Vec<u8> = from_values(&["[1, 2, 3]"]).unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn scalars_and_structures_decode_as_json() {
        let v: f64 = from_values(&["2.5"]).unwrap();
        assert_eq!(v, 2.5);

        let p: Point = from_values(&[r#"{"x":1,"y":-4}"#]).unwrap();
        assert_eq!(p, Point { x: 1, y: -4 });
    }

    #[test]
    fn bare_enum_variant_names_are_accepted() {
        let c: Color = from_values(&["Blue"]).unwrap();
        assert_eq!(c, Color::Blue);

        let cs: Vec<Color> = from_values(&["Red", "\"Blue\""]).unwrap();
        assert_eq!(cs, vec![Color::Red, Color::Blue]);
    }

    #[test]
    fn invalid_numbers_fail() {
        assert!(from_values::<u32>(&["twelve"]).is_err());
        assert!(from_values::<Vec<u32>>(&["1", "x"]).is_err());
    }

    #[test]
    fn absent_values_become_none() {
        let v: Option<i32> = from_values(&[]).unwrap();
        assert_eq!(v, None);

        let v: Option<i32> = from_values(&["7"]).unwrap();
        assert_eq!(v, Some(7));
    }
}
