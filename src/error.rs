use thiserror::Error;

/// 编译阶段（AST -> 宿主模板源码）的错误
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown token type: {kind} (line {line})")]
    UnknownToken { kind: String, line: usize },
    #[error("Invalid AST: {0}")]
    InvalidAst(String),
    #[error("Expression error in `{expr}`: {message}")]
    Expression { expr: String, message: String },
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),
    #[error("Mixin `{0}` is not defined")]
    UndefinedMixin(String),
    #[error("Mixin block used outside of a mixin definition")]
    MixinBlockOutsideMixin,
    #[error("Template syntax error: {0}")]
    Syntax(String),
}

/// 宿主模板执行期的错误
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("function `{0}` not defined")]
    UndefinedFunction(String),
    #[error("error calling {name}: {source}")]
    Call {
        name: String,
        #[source]
        source: FuncError,
    },
    #[error("can't give argument to non-function {0}")]
    NotAFunction(String),
    #[error("range can't iterate over {0}")]
    NotIterable(String),
    #[error("no such template `{0}`")]
    UndefinedTemplate(String),
    #[error("exceeded maximum template depth ({0})")]
    DepthExceeded(usize),
}

/// 模板函数返回的错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct FuncError(pub String);

impl FuncError {
    pub fn new(msg: impl Into<String>) -> Self {
        FuncError(msg.into())
    }
}

/// serde 转换失败：没有可用的转换规则
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("map key must be a string, number or bool, got {0}")]
    InvalidKey(String),
    #[error("missing key for map value")]
    MissingKey,
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for ConvertError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        ConvertError::Custom(msg.to_string())
    }
}

/// 引擎层错误：加载、编译、查找与执行
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load templates: {0:#}")]
    Load(#[source] anyhow::Error),
    #[error("Failed to compile {name}: {source}\n{listing}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
        listing: String,
    },
    #[error("Template {0} not found!")]
    NotFound(String),
    #[error("Error executing {name}: {source}\n{listing}")]
    Execution {
        name: String,
        #[source]
        source: ExecError,
        listing: String,
    },
}
