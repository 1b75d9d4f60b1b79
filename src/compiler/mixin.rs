use super::node::Mixin;
use super::render_state::RenderState;
use super::tag::or_null;
use super::transpile::var_name;
use crate::error::CompileError;
use crate::tpl::quote;

impl Mixin {
    pub(crate) fn render(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        if self.call {
            self.render_call(p, out)
        } else {
            self.render_definition(p)
        }
    }

    /// 定义编译成 `define "mixin_<name>"`，参数是 (参数数组, 属性 map, 内容块名) 三元组
    fn render_definition(&self, p: &mut RenderState) -> Result<(), CompileError> {
        if p.mixins.contains(&self.name) {
            return Ok(());
        }

        let mut params = String::new();
        let names = self.args.split(',').map(str::trim).filter(|a| !a.is_empty());
        for (i, arg) in names.enumerate() {
            match arg.strip_prefix("...") {
                Some(rest) => params.push_str(&format!(
                    "{{{{- {} := __op__slice $__args__ {} -}}}}",
                    var_name(rest.trim()),
                    i
                )),
                None => params.push_str(&format!(
                    "{{{{- {} := __tryindex $__args__ {} -}}}}",
                    var_name(arg),
                    i
                )),
            }
        }

        p.mixin_depth += 1;
        let mut body = String::new();
        let rendered = self.block.render(p, &mut body);
        p.mixin_depth -= 1;
        rendered?;

        let source = format!(
            "\n{{{{- define {} }}}}\n\
             {{{{- $attributes := (__tryindex . 1) }}}}\n\
             {{{{- $__args__ := (__tryindex . 0) }}}}\n\
             {{{{- $block := (__tryindex . 2) -}}}}\n\
             {}\n{}\n{{{{- end }}}}",
            quote(&format!("mixin_{}", self.name)),
            params,
            body
        );
        p.mixins.define(&self.name, source);
        Ok(())
    }

    fn render_call(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        p.record_call(&self.name);

        let args = p.js_expr(&format!("[{}]", self.args), false, false)?;

        let mut attrs = String::from("__op__map_params");
        for attr in &self.attrs {
            let value = p.js_expr(attr.val.as_str(), false, false)?;
            attrs.push_str(&format!(" {} {}", quote(&attr.name), or_null(value)));
        }
        if !self.attribute_blocks.is_empty() {
            let mut extended = format!("__op__extend ({})", attrs);
            for block in &self.attribute_blocks {
                let value = p.js_expr(block.as_str(), false, false)?;
                extended.push(' ');
                extended.push_str(&or_null(value));
            }
            attrs = extended;
        }

        let mut body = String::new();
        self.block.render(p, &mut body)?;

        let block = if body.is_empty() {
            "null".to_string()
        } else {
            let name = format!("block_{}_{}", self.name, p.block_counter);
            p.block_counter += 1;
            p.mixins.add_block(format!(
                "\n{{{{- define {} -}}}}\n{}\n{{{{- end -}}}}",
                quote(&name),
                body
            ));
            quote(&name)
        };

        out.push_str(&format!(
            "{{{{ template {} (__op__array ({}) ({}) ({})) }}}}",
            quote(&format!("mixin_{}", self.name)),
            args,
            attrs,
            block
        ));
        Ok(())
    }
}
