use super::ExprError;
use super::ast::{Axis, BinaryOp, CompareOp, Expr, Function, Kind, LogicOp, UnaryOp};
use super::lexer::{Spanned, Token};

/// 括号、一元运算符和函数参数的最大嵌套层数
pub const MAX_NESTING: usize = 128;

/// 语法树的最大高度，求值和析构都按树高递归
pub const MAX_HEIGHT: usize = 512;

/// 带类型和起始位置的子表达式
struct Typed {
    expr: Expr,
    kind: Kind,
    pos: usize,
    height: usize,
}

impl Typed {
    fn new(expr: Expr, pos: usize) -> Self {
        let kind = expr.kind();
        Typed {
            expr,
            kind,
            pos,
            height: 1,
        }
    }

    /// 内部节点，children 为各子树高度
    fn node(expr: Expr, pos: usize, children: &[usize]) -> Result<Self, ExprError> {
        let height = children.iter().copied().max().unwrap_or(0) + 1;
        if height > MAX_HEIGHT {
            return Err(ExprError::TooDeep { pos });
        }
        let kind = expr.kind();
        Ok(Typed {
            expr,
            kind,
            pos,
            height,
        })
    }

    fn expect(self, wanted: Kind, op: &str) -> Result<Expr, ExprError> {
        if self.kind != wanted {
            return Err(ExprError::TypeMismatch {
                op: op.to_string(),
                expected: wanted,
                found: self.kind,
                pos: self.pos,
            });
        }
        Ok(self.expr)
    }
}

/// 递归下降解析器
///
/// 优先级（从低到高）:
/// `|` / or  <  `^` / xor  <  `&` / and  <  `~` / not  <  比较  <  `+ -`  <  `* / %`  <  一元 `-`  <  `**`
pub struct Parser<'a> {
    tokens: &'a [Spanned],
    cursor: usize,
    /// 当前递归嵌套层数
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    /// 进入一层嵌套再解析，超过 MAX_NESTING 时报错而不是耗尽线程栈
    fn nested(
        &mut self,
        pos: usize,
        parse: fn(&mut Self) -> Result<Typed, ExprError>,
    ) -> Result<Typed, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::TooDeep { pos });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// 解析完整表达式，要求消耗全部 token
    pub fn parse(mut self) -> Result<(Expr, Kind), ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let typed = self.parse_or()?;
        if let Some(extra) = self.peek() {
            return Err(ExprError::UnexpectedToken {
                found: extra.token.to_string(),
                pos: extra.pos,
            });
        }
        Ok((typed.expr, typed.kind))
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Result<&'a Spanned, ExprError> {
        let spanned = self.tokens.get(self.cursor).ok_or(ExprError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(spanned)
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.peek().map(|s| &s.token)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_token(), Some(Token::Ident(name)) if name == keyword)
    }

    fn expect_token(&mut self, wanted: Token) -> Result<(), ExprError> {
        let spanned = self.next()?;
        if spanned.token != wanted {
            return Err(ExprError::UnexpectedToken {
                found: spanned.token.to_string(),
                pos: spanned.pos,
            });
        }
        Ok(())
    }

    fn logic_operator(&self, level: LogicOp) -> bool {
        match level {
            LogicOp::Or => matches!(self.peek_token(), Some(Token::Pipe)) || self.peek_keyword("or"),
            LogicOp::Xor => {
                matches!(self.peek_token(), Some(Token::Caret)) || self.peek_keyword("xor")
            }
            LogicOp::And => {
                matches!(self.peek_token(), Some(Token::Amp)) || self.peek_keyword("and")
            }
        }
    }

    fn parse_logic_level(
        &mut self,
        level: LogicOp,
        operand: fn(&mut Self) -> Result<Typed, ExprError>,
        name: &str,
    ) -> Result<Typed, ExprError> {
        let mut lhs = operand(self)?;
        while self.logic_operator(level) {
            self.cursor += 1;
            let rhs = operand(self)?;
            let pos = lhs.pos;
            let heights = [lhs.height, rhs.height];
            let a = lhs.expect(Kind::Boolean, name)?;
            let b = rhs.expect(Kind::Boolean, name)?;
            lhs = Typed::node(Expr::Logic(level, Box::new(a), Box::new(b)), pos, &heights)?;
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Typed, ExprError> {
        self.parse_logic_level(LogicOp::Or, Self::parse_xor, "|")
    }

    fn parse_xor(&mut self) -> Result<Typed, ExprError> {
        self.parse_logic_level(LogicOp::Xor, Self::parse_and, "^")
    }

    fn parse_and(&mut self) -> Result<Typed, ExprError> {
        self.parse_logic_level(LogicOp::And, Self::parse_not, "&")
    }

    fn parse_not(&mut self) -> Result<Typed, ExprError> {
        let is_not = matches!(self.peek_token(), Some(Token::Tilde | Token::Bang))
            || self.peek_keyword("not");
        if is_not {
            let pos = self.next()?.pos;
            let inner = self.nested(pos, Self::parse_not)?;
            let height = inner.height;
            let inner = inner.expect(Kind::Boolean, "~")?;
            return Typed::node(Expr::Unary(UnaryOp::Not, Box::new(inner)), pos, &[height]);
        }
        self.parse_comparison()
    }

    fn compare_operator(&self) -> Option<CompareOp> {
        match self.peek_token()? {
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            Token::EqEq => Some(CompareOp::Eq),
            Token::Ne => Some(CompareOp::Ne),
            _ => None,
        }
    }

    /// 比较可以链式书写：a < b <= c 等价于 (a < b) & (b <= c)
    fn parse_comparison(&mut self) -> Result<Typed, ExprError> {
        let first = self.parse_additive()?;
        let pos = first.pos;
        let mut lhs = first;
        let mut chain: Option<Typed> = None;

        while let Some(op) = self.compare_operator() {
            self.cursor += 1;
            let rhs = self.parse_additive()?;
            let (rhs_pos, rhs_height) = (rhs.pos, rhs.height);
            let heights = [lhs.height, rhs_height];
            let a = lhs.expect(Kind::Number, "比较")?;
            let b = rhs.expect(Kind::Number, "比较")?;

            let link = Typed::node(
                Expr::Compare(op, Box::new(a), Box::new(b.clone())),
                pos,
                &heights,
            )?;
            chain = Some(match chain {
                Some(prev) => {
                    let heights = [prev.height, link.height];
                    Typed::node(
                        Expr::Logic(LogicOp::And, Box::new(prev.expr), Box::new(link.expr)),
                        pos,
                        &heights,
                    )?
                }
                None => link,
            });
            lhs = Typed {
                expr: b,
                kind: Kind::Number,
                pos: rhs_pos,
                height: rhs_height,
            };
        }

        Ok(chain.unwrap_or(lhs))
    }

    fn parse_additive(&mut self) -> Result<Typed, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Typed, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    fn parse_unary(&mut self) -> Result<Typed, ExprError> {
        match self.peek_token() {
            Some(Token::Minus) => {
                let pos = self.next()?.pos;
                let inner = self.nested(pos, Self::parse_unary)?;
                let height = inner.height;
                let inner = inner.expect(Kind::Number, "-")?;
                Typed::node(Expr::Unary(UnaryOp::Neg, Box::new(inner)), pos, &[height])
            }
            Some(Token::Plus) => {
                let pos = self.next()?.pos;
                let inner = self.nested(pos, Self::parse_unary)?;
                let height = inner.height;
                let expr = inner.expect(Kind::Number, "+")?;
                Ok(Typed {
                    expr,
                    kind: Kind::Number,
                    pos,
                    height,
                })
            }
            _ => self.parse_power(),
        }
    }

    /// `**` 右结合，右侧允许一元负号：2 ** -x
    fn parse_power(&mut self) -> Result<Typed, ExprError> {
        let base = self.parse_atom()?;
        if let Some(Spanned {
            token: Token::StarStar,
            pos,
        }) = self.peek()
        {
            self.cursor += 1;
            let exponent = self.nested(*pos, Self::parse_unary)?;
            return binary(BinaryOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Typed, ExprError> {
        let spanned = self.next()?;
        let pos = spanned.pos;

        match &spanned.token {
            Token::Number(value) => Ok(Typed::new(Expr::Number(*value), pos)),
            Token::LParen => {
                let mut inner = self.nested(pos, Self::parse_or)?;
                self.expect_token(Token::RParen)?;
                inner.pos = pos;
                Ok(inner)
            }
            Token::Ident(name) => self.parse_identifier(name, pos),
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                pos,
            }),
        }
    }

    fn parse_identifier(&mut self, name: &str, pos: usize) -> Result<Typed, ExprError> {
        let expr = match name {
            "x" | "X" => Expr::Axis(Axis::X),
            "y" | "Y" => Expr::Axis(Axis::Y),
            "z" | "Z" => Expr::Axis(Axis::Z),
            "pi" => Expr::Number(std::f64::consts::PI),
            "e" => Expr::Number(std::f64::consts::E),
            "true" | "True" => Expr::Bool(true),
            "false" | "False" => Expr::Bool(false),
            "and" | "or" | "xor" | "not" => {
                return Err(ExprError::UnexpectedToken {
                    found: name.to_string(),
                    pos,
                });
            }
            _ => {
                let Some(function) = Function::lookup(name) else {
                    return Err(ExprError::UnknownIdentifier {
                        name: name.to_string(),
                        pos,
                    });
                };
                return self.parse_call(function, name, pos);
            }
        };
        Ok(Typed::new(expr, pos))
    }

    fn parse_call(&mut self, function: Function, name: &str, pos: usize) -> Result<Typed, ExprError> {
        self.expect_token(Token::LParen)?;

        let mut args = Vec::new();
        let mut heights = Vec::new();
        if !matches!(self.peek_token(), Some(Token::RParen)) {
            loop {
                let arg = self.nested(pos, Self::parse_or)?;
                heights.push(arg.height);
                args.push(arg.expect(Kind::Number, name)?);
                if matches!(self.peek_token(), Some(Token::Comma)) {
                    self.cursor += 1;
                    continue;
                }
                break;
            }
        }
        self.expect_token(Token::RParen)?;

        if args.len() != function.arity() {
            return Err(ExprError::Arity {
                name: name.to_string(),
                expected: function.arity(),
                found: args.len(),
                pos,
            });
        }

        Typed::node(Expr::Call(function, args), pos, &heights)
    }
}

fn binary(op: BinaryOp, lhs: Typed, rhs: Typed) -> Result<Typed, ExprError> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Pow => "**",
    };
    let pos = lhs.pos;
    let heights = [lhs.height, rhs.height];
    let a = lhs.expect(Kind::Number, symbol)?;
    let b = rhs.expect(Kind::Number, symbol)?;
    Typed::node(Expr::Binary(op, Box::new(a), Box::new(b)), pos, &heights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn parse(src: &str) -> Result<(Expr, Kind), ExprError> {
        let tokens = tokenize(src)?;
        Parser::new(&tokens).parse()
    }

    fn num(v: f64) -> Box<Expr> {
        Box::new(Expr::Number(v))
    }

    fn axis(a: Axis) -> Box<Expr> {
        Box::new(Expr::Axis(a))
    }

    #[test]
    fn comparison_binds_tighter_than_and() {
        let (expr, kind) = parse("x >= 10 & y <= 20").unwrap();
        assert_eq!(kind, Kind::Boolean);
        assert_eq!(
            expr,
            Expr::Logic(
                LogicOp::And,
                Box::new(Expr::Compare(CompareOp::Ge, axis(Axis::X), num(10.0))),
                Box::new(Expr::Compare(CompareOp::Le, axis(Axis::Y), num(20.0))),
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_beats_negation() {
        let (expr, _) = parse("-2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    num(2.0),
                    Box::new(Expr::Binary(BinaryOp::Pow, num(3.0), num(2.0))),
                )),
            )
        );
    }

    #[test]
    fn chained_comparison_expands_to_and() {
        let (expr, _) = parse("0 <= x < 5").unwrap();
        assert_eq!(
            expr,
            Expr::Logic(
                LogicOp::And,
                Box::new(Expr::Compare(CompareOp::Le, num(0.0), axis(Axis::X))),
                Box::new(Expr::Compare(CompareOp::Lt, axis(Axis::X), num(5.0))),
            )
        );
    }

    #[test]
    fn keywords_work_as_operators() {
        let (a, _) = parse("x < 1 and not y > 2 or z == 3").unwrap();
        let (b, _) = parse("(x < 1) & ~(y > 2) | (z == 3)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn functions_check_arity() {
        assert!(parse("sqrt(x**2 + y**2) <= 5").is_ok());
        assert!(parse("max(x, y) > min(z, 2)").is_ok());
        assert_eq!(
            parse("hypot(x) < 1").unwrap_err(),
            ExprError::Arity {
                name: "hypot".into(),
                expected: 2,
                found: 1,
                pos: 0
            }
        );
    }

    #[test]
    fn type_errors_point_at_operand() {
        assert_eq!(
            parse("(x > 1) + 2").unwrap_err(),
            ExprError::TypeMismatch {
                op: "+".into(),
                expected: Kind::Number,
                found: Kind::Boolean,
                pos: 0
            }
        );
        assert!(matches!(
            parse("x & y").unwrap_err(),
            ExprError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{}x > 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(parse(&parens).unwrap_err(), ExprError::TooDeep { pos: MAX_NESTING });

        let negations = format!("{}x > 1", "-".repeat(10_000));
        assert!(matches!(parse(&negations), Err(ExprError::TooDeep { .. })));
        let nots = format!("{}(x > 1)", "~".repeat(10_000));
        assert!(matches!(parse(&nots), Err(ExprError::TooDeep { .. })));
        let powers = format!("x{} > 1", " ** 2".repeat(10_000));
        assert!(matches!(parse(&powers), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let sum = format!("x{} > 0", " + x".repeat(10_000));
        assert_eq!(parse(&sum).unwrap_err(), ExprError::TooDeep { pos: 0 });
        let chain = format!("0{} < 1", " < x".repeat(1_000));
        assert!(matches!(parse(&chain), Err(ExprError::TooDeep { .. })));

        // 合理的嵌套不受影响
        let nested = format!("{}x > 1{}", "(".repeat(64), ")".repeat(64));
        assert!(parse(&nested).is_ok());
        let terms = format!("x{} > 0", " + x".repeat(200));
        assert!(parse(&terms).is_ok());
    }

    #[test]
    fn malformed_input() {
        assert_eq!(parse("").unwrap_err(), ExprError::Empty);
        assert_eq!(parse("(x > 1").unwrap_err(), ExprError::UnexpectedEnd);
        assert_eq!(
            parse("x > 1)").unwrap_err(),
            ExprError::UnexpectedToken {
                found: ")".into(),
                pos: 5
            }
        );
        assert_eq!(
            parse("w > 1").unwrap_err(),
            ExprError::UnknownIdentifier {
                name: "w".into(),
                pos: 0
            }
        );
    }
}
