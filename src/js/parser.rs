use crate::js::ast::{BinOp, Expr, Stmt, UnaryOp, UpdateOp};
use crate::js::lexer::{Tok, Token, tokenize};
use crate::js::ParseError;

/// 语句模式：解析语句列表（允许 `var`、`if`、`for-in` 等）
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut p = Parser::new(src)?;
    let mut stmts = Vec::new();
    while !p.at_eof() {
        stmts.push(p.statement()?);
    }
    Ok(stmts)
}

/// 取值模式：整个输入是一个表达式（相当于隐式 `return`）
pub fn parse_expression(src: &str) -> Result<Option<Expr>, ParseError> {
    let mut p = Parser::new(src)?;
    if p.at_eof() {
        return Ok(None);
    }
    let expr = p.sequence()?;
    p.eat_punct(";");
    if !p.at_eof() {
        return Err(p.unexpected());
    }
    Ok(Some(expr))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn binary_op(tok: &Tok) -> Option<(BinOp, u8)> {
    let op = match tok {
        Tok::Punct(p) => match *p {
            "||" => (BinOp::Or, 4),
            "&&" => (BinOp::And, 5),
            "|" => (BinOp::BitOr, 6),
            "^" => (BinOp::BitXor, 7),
            "&" => (BinOp::BitAnd, 8),
            "==" => (BinOp::Eq, 9),
            "!=" => (BinOp::Ne, 9),
            "===" => (BinOp::StrictEq, 9),
            "!==" => (BinOp::StrictNe, 9),
            "<" => (BinOp::Lt, 10),
            ">" => (BinOp::Gt, 10),
            "<=" => (BinOp::Le, 10),
            ">=" => (BinOp::Ge, 10),
            "<<" => (BinOp::Shl, 11),
            ">>" => (BinOp::Shr, 11),
            ">>>" => (BinOp::UShr, 11),
            "+" => (BinOp::Add, 12),
            "-" => (BinOp::Sub, 12),
            "*" => (BinOp::Mul, 13),
            "/" => (BinOp::Div, 13),
            "%" => (BinOp::Mod, 13),
            _ => return None,
        },
        Tok::Ident(id) if id == "in" => (BinOp::In, 10),
        _ => return None,
    };
    Some(op)
}

fn assign_op(p: &str) -> Option<Option<BinOp>> {
    let op = match p {
        "=" => None,
        "+=" => Some(BinOp::Add),
        "-=" => Some(BinOp::Sub),
        "*=" => Some(BinOp::Mul),
        "/=" => Some(BinOp::Div),
        "%=" => Some(BinOp::Mod),
        "&=" => Some(BinOp::BitAnd),
        "|=" => Some(BinOp::BitOr),
        "^=" => Some(BinOp::BitXor),
        "<<=" => Some(BinOp::Shl),
        ">>=" => Some(BinOp::Shr),
        ">>>=" => Some(BinOp::UShr),
        _ => return None,
    };
    Some(op)
}

impl Parser {
    fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        self.peek().tok == Tok::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().tok, Tok::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(id) if id == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(ParseError::syntax(
                format!("expected `{}`, found {}", p, describe(&self.peek().tok)),
                self.peek().pos,
            ))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.next() {
            Token {
                tok: Tok::Ident(id),
                ..
            } => Ok(id),
            t => Err(ParseError::syntax(
                format!("expected identifier, found {}", describe(&t.tok)),
                t.pos,
            )),
        }
    }

    fn unexpected(&self) -> ParseError {
        let t = self.peek();
        ParseError::syntax(format!("unexpected {}", describe(&t.tok)), t.pos)
    }

    /// 语句结束：`;`、`}`、EOF 或换行
    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek().pos;
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.eat_punct("{") {
            let mut body = Vec::new();
            while !self.is_punct("}") {
                if self.at_eof() {
                    return Err(ParseError::syntax("unterminated block", pos));
                }
                body.push(self.statement()?);
            }
            self.next();
            return Ok(Stmt::Block(body));
        }

        let keyword = match &self.peek().tok {
            Tok::Ident(id) => id.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "var" | "let" | "const" => {
                self.next();
                let mut decls = Vec::new();
                loop {
                    let name = self.ident()?;
                    let init = if self.eat_punct("=") {
                        Some(self.assignment()?)
                    } else {
                        None
                    };
                    decls.push((name, init));
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.end_statement()?;
                Ok(Stmt::Var(decls))
            }
            "if" => {
                self.next();
                self.expect_punct("(")?;
                let test = self.sequence()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.is_keyword("else") {
                    self.next();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "for" => {
                self.next();
                self.expect_punct("(")?;
                if self.is_keyword("var") || self.is_keyword("let") || self.is_keyword("const") {
                    self.next();
                }
                let var = self.ident()?;
                if !self.is_keyword("in") {
                    return Err(ParseError::unsupported("for statement (only for-in is supported)", pos));
                }
                self.next();
                let object = self.sequence()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::ForIn { var, object, body })
            }
            "return" => {
                self.next();
                let arg = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.sequence()?)
                };
                self.end_statement()?;
                Ok(Stmt::Return(arg))
            }
            "throw" => {
                self.next();
                let arg = self.sequence()?;
                self.end_statement()?;
                Ok(Stmt::Throw(arg))
            }
            "while" | "do" | "switch" | "try" | "function" | "break" | "continue" | "class"
            | "with" | "debugger" => Err(ParseError::unsupported(
                format!("{} statement", keyword),
                pos,
            )),
            _ => {
                let expr = self.sequence()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// 逗号表达式
    fn sequence(&mut self) -> Result<Expr, ParseError> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let pos = self.peek().pos;
        let left = self.conditional()?;
        let op = match &self.peek().tok {
            Tok::Punct(p) => assign_op(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        if !matches!(left, Expr::Ident(_) | Expr::Dot(..) | Expr::Bracket(..)) {
            return Err(ParseError::syntax("invalid assignment target", pos));
        }
        self.next();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = if self.is_punct(":") {
            None
        } else {
            Some(Box::new(self.assignment()?))
        };
        let alternate = if self.eat_punct(":") {
            Some(Box::new(self.assignment()?))
        } else {
            None
        };
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent,
            alternate,
        })
    }

    fn binary(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while let Some((op, bp)) = binary_op(&self.peek().tok) {
            if bp < min_bp {
                break;
            }
            self.next();
            let right = self.binary(bp + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match &self.peek().tok {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Pos),
            Tok::Punct("~") => Some(UnaryOp::BitNot),
            Tok::Ident(id) if id == "typeof" => Some(UnaryOp::Typeof),
            Tok::Ident(id) if id == "void" => Some(UnaryOp::Void),
            Tok::Ident(id) if id == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.next();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        let update = match &self.peek().tok {
            Tok::Punct("++") => Some(UpdateOp::Inc),
            Tok::Punct("--") => Some(UpdateOp::Dec),
            _ => None,
        };
        if let Some(op) = update {
            self.next();
            let target = self.unary()?;
            return Ok(Expr::Update {
                op,
                target: Box::new(target),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let expr = self.call_member()?;
        let op = match &self.peek().tok {
            Tok::Punct("++") if !self.peek().newline_before => UpdateOp::Inc,
            Tok::Punct("--") if !self.peek().newline_before => UpdateOp::Dec,
            _ => return Ok(expr),
        };
        self.next();
        Ok(Expr::Update {
            op,
            target: Box::new(expr),
        })
    }

    fn call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.is_keyword("new") {
            self.next();
            let callee = self.member_only()?;
            let args = if self.is_punct("(") {
                self.arguments()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                args,
            }
        } else {
            self.primary()?
        };

        loop {
            if self.eat_punct(".") {
                let name = self.ident()?;
                expr = Expr::Dot(Box::new(expr), name);
            } else if self.eat_punct("[") {
                let member = self.sequence()?;
                self.expect_punct("]")?;
                expr = Expr::Bracket(Box::new(expr), Box::new(member));
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// `new` 之后的成员表达式（不含调用）
    fn member_only(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.ident()?;
                expr = Expr::Dot(Box::new(expr), name);
            } else if self.eat_punct("[") {
                let member = self.sequence()?;
                self.expect_punct("]")?;
                expr = Expr::Bracket(Box::new(expr), Box::new(member));
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let t = self.next();
        match t.tok {
            Tok::Num { value, float } => Ok(Expr::Number { value, float }),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Ident(id) => match id.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "function" | "this" | "class" => Err(ParseError::unsupported(
                    format!("`{}` expression", id),
                    t.pos,
                )),
                _ => Ok(Expr::Ident(id)),
            },
            Tok::Punct("(") => {
                let expr = self.sequence()?;
                self.expect_punct(")")?;
                if self.is_punct("=>") {
                    return Err(ParseError::unsupported("arrow function", t.pos));
                }
                Ok(expr)
            }
            Tok::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    if self.is_punct(",") {
                        self.next();
                        items.push(Expr::Null);
                        continue;
                    }
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Tok::Punct("{") => {
                let mut props = Vec::new();
                while !self.eat_punct("}") {
                    let key_tok = self.next();
                    let key = match key_tok.tok {
                        Tok::Ident(id) => id,
                        Tok::Str(s) => s,
                        Tok::Num { value, .. } => crate::runtime::object::format_number(value),
                        other => {
                            return Err(ParseError::syntax(
                                format!("invalid object key {}", describe(&other)),
                                key_tok.pos,
                            ));
                        }
                    };
                    let value = if self.eat_punct(":") {
                        self.assignment()?
                    } else {
                        Expr::Ident(key.clone())
                    };
                    props.push((key, value));
                    if !self.is_punct("}") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Object(props))
            }
            other => Err(ParseError::syntax(
                format!("unexpected {}", describe(&other)),
                t.pos,
            )),
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(id) => format!("identifier `{}`", id),
        Tok::Num { value, .. } => format!("number {}", value),
        Tok::Str(_) => "string".to_string(),
        Tok::Punct(p) => format!("`{}`", p),
        Tok::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::ParseErrorKind;

    fn expr(src: &str) -> Expr {
        parse_expression(src).unwrap().unwrap()
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let e = expr("a + b * c");
        assert_eq!(
            e,
            Expr::Binary {
                op: BinOp::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative() {
        let e = expr("a - b - c");
        let Expr::Binary { left, .. } = e else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expr::Binary { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_member_call_chain() {
        let e = expr("a.b[0].c(1, 2)");
        let Expr::Call { callee, args } = e else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(*callee, Expr::Dot(_, ref name) if name == "c"));
    }

    #[test]
    fn test_conditional_and_assignment() {
        assert!(matches!(expr("a ? b : c"), Expr::Conditional { .. }));
        assert!(matches!(
            expr("a += 1"),
            Expr::Assign {
                op: Some(BinOp::Add),
                ..
            }
        ));
        assert!(parse_expression("1 = 2").is_err());
    }

    #[test]
    fn test_object_literal_in_value_mode() {
        let e = expr("{a: 1, 'b': 2, c}");
        let Expr::Object(props) = e else {
            panic!("expected object");
        };
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_statements() {
        let stmts = parse_program("var a = 1, b\nif (a) { b = 2 } else b = 3").unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0], Stmt::Var(d) if d.len() == 2));
        assert!(matches!(&stmts[1], Stmt::If { alternate: Some(_), .. }));

        let stmts = parse_program("for (var k in obj) { x }").unwrap();
        assert!(matches!(&stmts[0], Stmt::ForIn { var, .. } if var == "k"));
    }

    #[test]
    fn test_value_mode_rejects_statements() {
        assert!(parse_expression("var a = 1").is_err());
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("").unwrap().is_none());
    }

    #[test]
    fn test_unsupported_statements() {
        for src in ["while (x) {}", "for (;;) {}", "function f() {}", "x => x"] {
            let err = parse_program(src).unwrap_err();
            assert!(
                err.kind == ParseErrorKind::Unsupported || src == "x => x",
                "{}",
                src
            );
        }
    }
}
