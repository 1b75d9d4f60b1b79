use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 单个文件内的 mixin 定义，先定义者生效
#[derive(Debug, Default)]
pub struct MixinRegistry {
    defs: HashMap<String, String>,
    order: Vec<String>,
    /// mixin 调用时附带的内容块，编译成独立的 define
    blocks: Vec<String>,
}

impl MixinRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// 已存在同名定义时忽略，返回是否登记成功
    pub fn define(&mut self, name: &str, source: String) -> bool {
        if self.contains(name) {
            return false;
        }
        self.defs.insert(name.to_string(), source);
        self.order.push(name.to_string());
        true
    }

    pub fn add_block(&mut self, source: String) {
        self.blocks.push(source);
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// 按定义顺序输出
    pub fn definitions(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter_map(|name| self.defs.get(name).map(String::as_str))
    }
}

/// 一次文件编译的状态
pub struct RenderState {
    pub(crate) rawmode: bool,
    pub(crate) debug: bool,
    pub(crate) doctype: String,
    pub(crate) mixins: MixinRegistry,
    pub(crate) mixin_depth: usize,
    pub(crate) block_counter: usize,
    pub(crate) called_mixins: Vec<String>,
    /// 非缓冲代码（`- expr`）丢弃表达式的值
    pub(crate) discard: bool,
    /// 带子块的代码节点：子块编译结果替换 `__pug_block__` 标识符
    pub(crate) code_block: Option<String>,
    known: Arc<HashSet<String>>,
}

impl RenderState {
    pub fn new(known: Arc<HashSet<String>>, debug: bool) -> Self {
        Self {
            rawmode: false,
            debug,
            doctype: String::new(),
            mixins: MixinRegistry::default(),
            mixin_depth: 0,
            block_counter: 0,
            called_mixins: Vec::new(),
            discard: false,
            code_block: None,
            known,
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// 已声明 doctype 且不是 html 时按 xml 输出自闭合标签
    pub(crate) fn xml(&self) -> bool {
        !self.doctype.is_empty() && self.doctype != "html"
    }

    pub(crate) fn terse(&self) -> bool {
        self.doctype == "html"
    }

    pub(crate) fn record_call(&mut self, name: &str) {
        if !self.called_mixins.iter().any(|n| n == name) {
            self.called_mixins.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixin_registry_first_wins() {
        let mut reg = MixinRegistry::default();
        assert!(reg.define("a", "first".into()));
        assert!(reg.define("b", "second".into()));
        assert!(!reg.define("a", "again".into()));
        assert_eq!(reg.definitions().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_doctype_modes() {
        let mut state = RenderState::new(Arc::default(), false);
        assert!(!state.xml());
        state.doctype = "html".into();
        assert!(state.terse() && !state.xml());
        state.doctype = "xml".into();
        assert!(state.xml());
    }
}
