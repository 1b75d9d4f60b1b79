use crate::error::ConvertError;
use crate::runtime::convert::ToObject;
use crate::runtime::object::Object;
use indexmap::IndexMap;
use serde::Serialize;
use serde::ser::*;

/// 把任意 `T: Serialize` 转为 `Object`
pub struct ObjectSerializer;

impl Serializer for ObjectSerializer {
    type Ok = Object;
    type Error = ConvertError;
    type SerializeSeq = ListSerializer;
    type SerializeTuple = ListSerializer;
    type SerializeTupleStruct = ListSerializer;
    type SerializeTupleVariant = ListSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = MapSerializer;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v as f64))
    }
    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Number(v))
    }
    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        Ok(Object::String(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(Object::String(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(Object::array(
            v.iter().map(|b| Object::Number(*b as f64)).collect(),
        ))
    }
    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Nil)
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Nil)
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(Object::Nil)
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(Object::String(variant.to_string()))
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(ListSerializer {
            vec: Vec::with_capacity(len.unwrap_or(0)),
        })
    }
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        self.serialize_seq(None)
    }
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            map: IndexMap::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }
    fn serialize_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(MapSerializer {
            map: IndexMap::with_capacity(len),
            key: None,
        })
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer {
            map: IndexMap::with_capacity(len),
            key: None,
        })
    }
}

pub struct ListSerializer {
    vec: Vec<Object>,
}

macro_rules! impl_serialize_seq {
    ($trait:ident, $method:ident) => {
        impl $trait for ListSerializer {
            type Ok = Object;
            type Error = ConvertError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
                self.vec.push(value.serialize(ObjectSerializer)?);
                Ok(())
            }

            fn end(self) -> Result<Self::Ok, Self::Error> {
                Ok(Object::array(self.vec))
            }
        }
    };
}

impl_serialize_seq!(SerializeSeq, serialize_element);
impl_serialize_seq!(SerializeTuple, serialize_element);
impl_serialize_seq!(SerializeTupleStruct, serialize_field);
impl_serialize_seq!(SerializeTupleVariant, serialize_field);

pub struct MapSerializer {
    map: IndexMap<String, Object>,
    key: Option<String>,
}

impl SerializeMap for MapSerializer {
    type Ok = Object;
    type Error = ConvertError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        // 键只接受标量，统一转成字符串
        let k = key.serialize(ObjectSerializer)?;
        match k {
            Object::String(_) | Object::Number(_) | Object::Bool(_) => {
                self.key = Some(k.to_string());
                Ok(())
            }
            other => Err(ConvertError::InvalidKey(other.type_name().to_string())),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let v = value.serialize(ObjectSerializer)?;
        let key = self.key.take().ok_or(ConvertError::MissingKey)?;
        self.map.insert(key, v);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Object::map(self.map))
    }
}

macro_rules! impl_serialize_struct {
    ($trait:ident) => {
        impl $trait for MapSerializer {
            type Ok = Object;
            type Error = ConvertError;

            fn serialize_field<T: ?Sized + Serialize>(
                &mut self,
                key: &'static str,
                value: &T,
            ) -> Result<(), Self::Error> {
                let v = value.serialize(ObjectSerializer)?;
                self.map.insert(key.to_string(), v);
                Ok(())
            }

            fn end(self) -> Result<Self::Ok, Self::Error> {
                Ok(Object::map(self.map))
            }
        }
    };
}

impl_serialize_struct!(SerializeStruct);
impl_serialize_struct!(SerializeStructVariant);

/// 通过 serde 转换；没有对应规则的形状返回 `ConvertError`
pub fn from_serialize<T: ?Sized + Serialize>(t: &T) -> Result<Object, ConvertError> {
    t.serialize(ObjectSerializer)
}

/// 让 `Serialize` 类型直接作为渲染数据使用。
///
/// 无法转换的值属于调用方的编程错误，转换时直接 panic。
pub struct Serialized<T>(pub T);

impl<T: Serialize> ToObject for Serialized<T> {
    fn to_object(&self) -> Object {
        match from_serialize(&self.0) {
            Ok(obj) => obj,
            Err(e) => panic!("unconvertible value: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct User {
        name: String,
        age: u8,
        tags: Vec<&'static str>,
        nick: Option<String>,
    }

    #[test]
    fn test_struct_to_map() {
        let user = User {
            name: "tom".to_string(),
            age: 18,
            tags: vec!["a", "b"],
            nick: None,
        };
        let obj = from_serialize(&user).unwrap();
        assert_eq!(obj.field("name"), Object::string("tom"));
        assert_eq!(obj.field("age"), Object::Number(18.0));
        assert_eq!(obj.field("tags").to_string(), "a b");
        assert!(obj.field("nick").is_nil());
    }

    #[test]
    fn test_numeric_keys_are_stringified() {
        let mut m = BTreeMap::new();
        m.insert(1u32, "one");
        let obj = from_serialize(&m).unwrap();
        assert_eq!(obj.field("1"), Object::string("one"));
    }

    #[test]
    fn test_composite_keys_are_rejected() {
        let mut m = BTreeMap::new();
        m.insert((1, 2), "pair");
        assert!(matches!(from_serialize(&m), Err(ConvertError::InvalidKey(_))));
    }

    #[test]
    #[should_panic(expected = "unconvertible value")]
    fn test_serialized_fails_fast() {
        let mut m = BTreeMap::new();
        m.insert(vec![1], 1);
        let _ = Serialized(m).to_object();
    }

    #[test]
    fn test_serialized_is_idempotent() {
        let obj = Serialized(vec![1, 2]).to_object();
        assert_eq!(crate::runtime::convert::convert(&obj), obj);
    }
}
