use crate::runtime::{Object, Value};

/// 模板执行期的变量作用域。
///
/// 每次 `template` 调用压入一帧；查找时从最内层帧向外（动态作用域），
/// 找不到再取根数据的同名字段。
pub struct Context {
    root: Object,
    frames: Vec<Vec<(String, Value)>>,
}

impl Context {
    pub fn new(root: Object) -> Self {
        Self {
            root,
            frames: vec![Vec::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// 当前帧的变量数，配合 `truncate` 实现块级作用域
    pub fn mark(&self) -> usize {
        self.frames.last().map_or(0, Vec::len)
    }

    pub fn truncate(&mut self, mark: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.truncate(mark);
        }
    }

    pub fn declare(&mut self, key: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((key.to_string(), value));
        }
    }

    /// 赋值给最近的同名变量；不存在时在当前帧声明
    pub fn assign(&mut self, key: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some((_, slot)) = frame.iter_mut().rev().find(|(k, _)| k == key) {
                *slot = value;
                return;
            }
        }
        self.declare(key, value);
    }

    pub fn lookup(&self, key: &str) -> Value {
        // 1. 局部变量（栈结构，从后往前查以支持遮蔽）
        for frame in self.frames.iter().rev() {
            if let Some((_, v)) = frame.iter().rev().find(|(k, _)| k == key) {
                return v.clone();
            }
        }

        // 2. `$` 本身即根数据
        if key.is_empty() {
            return Value::Object(self.root.clone());
        }

        // 3. 根数据的字段
        Value::Object(self.root.field(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MapBuilder;

    fn root() -> Object {
        MapBuilder::new().field("a", &1).field("Title", &"t").build()
    }

    #[test]
    fn test_lookup_simple() {
        let ctx = Context::new(root());
        assert_eq!(ctx.lookup("a"), Value::Object(Object::Number(1.0)));
        assert_eq!(ctx.lookup("title"), Value::Object(Object::string("t")));
        assert!(ctx.lookup("b").is_nil());
    }

    #[test]
    fn test_lookup_locals_shadowing() {
        let mut ctx = Context::new(root());
        let mark = ctx.mark();
        ctx.declare("a", Value::Int(2));
        assert_eq!(ctx.lookup("a"), Value::Int(2));

        ctx.truncate(mark);
        assert_eq!(ctx.lookup("a"), Value::Object(Object::Number(1.0)));
    }

    #[test]
    fn test_dynamic_scope_and_assign() {
        let mut ctx = Context::new(root());
        ctx.declare("x", Value::Int(1));
        ctx.push_frame();
        // 被调模板可以看到调用方的变量
        assert_eq!(ctx.lookup("x"), Value::Int(1));
        ctx.assign("x", Value::Int(5));
        ctx.assign("y", Value::Int(6));
        ctx.pop_frame();

        assert_eq!(ctx.lookup("x"), Value::Int(5));
        assert!(ctx.lookup("y").is_nil());
    }
}
