mod attrs;
pub mod convert;
pub mod funcs;
pub mod object;
pub mod ops;
pub mod serializer;
pub mod value;

pub use convert::{MapBuilder, ToObject, convert};
pub use object::{Array, FuncResult, Function, Map, Object, Origin};
pub use serializer::{Serialized, from_serialize};
pub use value::Value;
