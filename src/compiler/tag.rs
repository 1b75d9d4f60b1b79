use super::node::{Tag, TagName};
use super::render_state::RenderState;
use super::transpile::DEBUG_MARKER;
use crate::error::CompileError;
use crate::tpl::quote;

impl Tag {
    pub(crate) fn render(&self, p: &mut RenderState, out: &mut String) -> Result<(), CompileError> {
        let name = match &self.name {
            TagName::Static(name) => name.clone(),
            TagName::Expr(expr) => {
                p.rawmode = false;
                p.js_expr(expr.as_str(), true, false)?
            }
        };

        let mut body = String::new();
        self.block.render(p, &mut body)?;
        let attrs = self.attrs(p)?;

        if self.self_closing {
            let close = if p.xml() { "/>" } else { ">" };
            out.push_str(&format!("<{}{}{}", name, attrs, close));
        } else if name == "script" && body.contains('\n') {
            out.push_str(&format!("<{0}{1}>\n{2}\n</{0}>", name, attrs, body));
        } else if !self.block.inline() && p.debug {
            out.push_str(&format!(
                "<{0}{1}>{3}{2}{3}</{0}>",
                name,
                attrs,
                body,
                DEBUG_MARKER
            ));
        } else {
            out.push_str(&format!("<{0}{1}>{2}</{0}>", name, attrs, body));
        }

        if !self.is_inline && p.debug {
            out.push_str(DEBUG_MARKER);
        }
        Ok(())
    }

    /// `{{__attrs terse (__attr "name" value escape) ... (__and_attrs obj)}}`
    fn attrs(&self, p: &mut RenderState) -> Result<String, CompileError> {
        if self.attrs.is_empty() && self.attribute_blocks.is_empty() {
            return Ok(String::new());
        }

        let mut s = format!("{{{{__attrs {}", p.terse());
        for attr in &self.attrs {
            let value = p.js_expr(attr.val.as_str(), false, false)?;
            s.push_str(&format!(
                " (__attr {} {} {})",
                quote(&attr.name),
                or_null(value),
                attr.must_escape
            ));
        }
        for block in &self.attribute_blocks {
            let value = p.js_expr(block.as_str(), false, false)?;
            if !value.is_empty() {
                s.push_str(&format!(" (__and_attrs {})", value));
            }
        }
        s.push_str("}}");
        Ok(s)
    }
}

pub(crate) fn or_null(value: String) -> String {
    if value.is_empty() {
        "null".to_string()
    } else {
        value
    }
}
