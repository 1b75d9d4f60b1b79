use crate::runtime::funcs::FuncMap;
use crate::runtime::{FuncResult, Function, Object, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// 普通模板函数
pub trait TemplateFunc: Send + Sync {
    fn name(&self) -> &str;
    fn func(&self) -> Function;
}

/// 依赖渲染上下文的模板函数，每次渲染重新绑定
pub trait ContextFunc: Send + Sync {
    fn name(&self) -> &str;
    fn func(&self, ctx: &RenderContext) -> Function;
}

/// 请求级的渲染上下文
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: HashMap<String, Object>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Object) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn insert(&mut self, key: &str, value: Object) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.values.get(key)
    }
}

struct Closure(Function);

impl TemplateFunc for Closure {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn func(&self) -> Function {
        self.0.clone()
    }
}

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    plain: Vec<Arc<dyn TemplateFunc>>,
    context: Vec<Arc<dyn ContextFunc>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带上默认函数：Math、JSON、startsWith、truncate、stripTags
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::defaults::register(&mut registry);
        registry
    }

    pub fn register(&mut self, f: impl TemplateFunc + 'static) -> &mut Self {
        self.plain.push(Arc::new(f));
        self
    }

    pub fn register_context(&mut self, f: impl ContextFunc + 'static) -> &mut Self {
        self.context.push(Arc::new(f));
        self
    }

    pub fn register_fn<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> FuncResult + Send + Sync + 'static,
    {
        self.register(Closure(Function::new(name, f)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plain
            .iter()
            .map(|f| f.name())
            .chain(self.context.iter().map(|f| f.name()))
    }

    /// 普通函数表；同名时后注册的覆盖先注册的
    pub(crate) fn plain_funcs(&self) -> FuncMap {
        self.plain
            .iter()
            .map(|f| (f.name().to_string(), f.func()))
            .collect()
    }

    pub(crate) fn bind_context(&self, ctx: &RenderContext, funcs: &mut FuncMap) {
        for f in &self.context {
            funcs.insert(f.name().to_string(), f.func(ctx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PageName;

    impl ContextFunc for PageName {
        fn name(&self) -> &str {
            "pageName"
        }

        fn func(&self, ctx: &RenderContext) -> Function {
            let page = ctx.get("page.template").cloned().unwrap_or_default();
            Function::new("pageName", move |_| Ok(Value::Object(page.clone())))
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_fn("double", |args| {
                let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                Ok(Value::from(n * 2.0))
            })
            .register_context(PageName);

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["double", "pageName"]);

        let mut funcs = registry.plain_funcs();
        assert_eq!(funcs["double"].call(&[Value::Int(2)]).unwrap(), Value::from(4.0));

        let ctx = RenderContext::new().with("page.template", Object::string("pageHome"));
        registry.bind_context(&ctx, &mut funcs);
        assert_eq!(funcs["pageName"].call(&[]).unwrap(), Value::from("pageHome"));
    }
}
