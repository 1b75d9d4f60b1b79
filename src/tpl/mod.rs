//! 编译产物所用的宿主模板语言：`{{ }}` 动作、管道、变量、`if`/`range`/`define`/`template`。

pub mod ast;
mod parser;
mod render;
mod render_context;

pub use ast::{Node, Template, quote};
pub use parser::parse_template;
pub use render::execute;
