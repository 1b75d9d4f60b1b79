#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    /// 转义已处理，`\$` 保留原样供插值扫描使用
    Str(String),
    Number {
        value: f64,
        float: bool,
    },
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Dot(Box<Expr>, String),
    Bracket(Box<Expr>, Box<Expr>),
    Conditional {
        test: Box<Expr>,
        consequent: Option<Box<Expr>>,
        alternate: Option<Box<Expr>>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        target: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `op` 为复合赋值的运算符（`+=` 等）
    Assign {
        op: Option<BinOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(Vec<(String, Option<Expr>)>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    ForIn {
        var: String,
        object: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Block(Vec<Stmt>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

impl BinOp {
    /// 运行时函数名
    pub fn func_name(self) -> &'static str {
        match self {
            BinOp::Add => "__op__add",
            BinOp::Sub => "__op__sub",
            BinOp::Mul => "__op__mul",
            BinOp::Div => "__op__slash",
            BinOp::Mod => "__op__mod",
            BinOp::BitAnd => "__op__b_and",
            BinOp::BitOr => "__op__b_or",
            BinOp::BitXor => "__op__b_xor",
            BinOp::Shl => "__op__b_sleft",
            BinOp::Shr => "__op__b_sright",
            BinOp::UShr => "__op__b_usright",
            BinOp::And => "__op__and",
            BinOp::Or => "__op__or",
            BinOp::Eq | BinOp::StrictEq => "__op__eql",
            BinOp::Ne | BinOp::StrictNe => "__op__neq",
            BinOp::Lt => "__op__lt",
            BinOp::Gt => "__op__gt",
            BinOp::Le => "__op__lte",
            BinOp::Ge => "__op__gte",
            BinOp::In => "__op__in",
        }
    }
}

impl UnaryOp {
    pub fn func_name(self) -> &'static str {
        match self {
            UnaryOp::Not => "__op__not",
            UnaryOp::Neg => "__op__minus",
            UnaryOp::Pos => "__op__plus",
            UnaryOp::BitNot => "__op__bitnot",
            UnaryOp::Typeof => "__op__typeof",
            UnaryOp::Void => "__void",
            UnaryOp::Delete => "__op__delete",
        }
    }
}

impl UpdateOp {
    pub fn func_name(self) -> &'static str {
        match self {
            UpdateOp::Inc => "__op__inc",
            UpdateOp::Dec => "__op__dec",
        }
    }
}
