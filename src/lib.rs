//! 把 pug 模板的 JSON AST 编译为 `{{ }}` 风格的宿主模板，并在动态值运行时上执行。
//!
//! ```no_run
//! use pugjs::{Engine, EngineOptions, FunctionRegistry, RenderContext};
//!
//! let engine = Engine::new(EngineOptions::new("web"), FunctionRegistry::with_defaults());
//! let page = engine.render(&RenderContext::new(), "home", &pugjs::Object::Nil)?;
//! println!("{}", page);
//! # Ok::<(), pugjs::TemplateError>(())
//! ```

extern crate self as pugjs;

pub mod compiler;
pub mod engine;
pub mod error;
pub mod js;
pub mod models;
pub mod runtime;
pub mod tpl;

pub use engine::{ContextFunc, Engine, FunctionRegistry, RenderContext, Rendered, TemplateFunc};
pub use error::{CompileError, ConvertError, ExecError, FuncError, TemplateError};
pub use models::engine_options::EngineOptions;
pub use runtime::{
    FuncResult, Function, MapBuilder, Object, Serialized, ToObject, Value, convert, from_serialize,
};

pub use pugjs_macros::ToObject;
