use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// 表达式的静态类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Number,
    Boolean,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Number => f.write_str("数值"),
            Kind::Boolean => f.write_str("布尔"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
}

impl LogicOp {
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            LogicOp::And => a && b,
            LogicOp::Or => a || b,
            LogicOp::Xor => a ^ b,
        }
    }
}

/// 内置函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sqrt,
    Abs,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Floor,
    Ceil,
    Min,
    Max,
    Pow,
    Hypot,
    Atan2,
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        let function = match name {
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "min" => Function::Min,
            "max" => Function::Max,
            "pow" => Function::Pow,
            "hypot" => Function::Hypot,
            "atan2" => Function::Atan2,
            _ => return None,
        };
        Some(function)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Pow | Function::Hypot | Function::Atan2 => 2,
            _ => 1,
        }
    }

    pub fn apply1(self, v: f64) -> f64 {
        match self {
            Function::Sqrt => v.sqrt(),
            Function::Abs => v.abs(),
            Function::Exp => v.exp(),
            Function::Ln => v.ln(),
            Function::Log10 => v.log10(),
            Function::Sin => v.sin(),
            Function::Cos => v.cos(),
            Function::Tan => v.tan(),
            Function::Floor => v.floor(),
            Function::Ceil => v.ceil(),
            _ => f64::NAN,
        }
    }

    pub fn apply2(self, a: f64, b: f64) -> f64 {
        match self {
            Function::Min => a.min(b),
            Function::Max => a.max(b),
            Function::Pow => a.powf(b),
            Function::Hypot => a.hypot(b),
            Function::Atan2 => a.atan2(b),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Axis(Axis),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// 静态类型；解析时已保证操作数类型一致
    pub fn kind(&self) -> Kind {
        match self {
            Expr::Number(_) | Expr::Axis(_) | Expr::Binary(..) | Expr::Call(..) => Kind::Number,
            Expr::Unary(UnaryOp::Neg, _) => Kind::Number,
            Expr::Bool(_) | Expr::Compare(..) | Expr::Logic(..) => Kind::Boolean,
            Expr::Unary(UnaryOp::Not, _) => Kind::Boolean,
        }
    }

    /// 是否引用了坐标变量（否则整个子树是常量）
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Bool(_) => true,
            Expr::Axis(_) => false,
            Expr::Unary(_, inner) => inner.is_constant(),
            Expr::Binary(_, a, b) | Expr::Compare(_, a, b) | Expr::Logic(_, a, b) => {
                a.is_constant() && b.is_constant()
            }
            Expr::Call(_, args) => args.iter().all(Expr::is_constant),
        }
    }
}
