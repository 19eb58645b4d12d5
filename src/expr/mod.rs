//! 谓词表达式语言
//!
//! HTTP 请求中的谓词以文本形式给出，例如 `(x >= 10) & (y <= 20)`，
//! 在这里编译成对整个坐标数组一次性求值的 [`Predicate`]。

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{Axis, BinaryOp, CompareOp, Expr, Function, Kind, LogicOp, UnaryOp};

use thiserror::Error;

use crate::utils::predicate::Predicate;
use crate::utils::voxel_grid::{Field, Occupancy};

/// 表达式解析错误，pos 为源码中的字节偏移
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("位置 {pos}: 无法识别的字符 '{ch}'")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("位置 {pos}: 无效的数字 '{text}'")]
    InvalidNumber { text: String, pos: usize },

    #[error("位置 {pos}: 意外的符号 '{found}'")]
    UnexpectedToken { found: String, pos: usize },

    #[error("表达式意外结束")]
    UnexpectedEnd,

    #[error("位置 {pos}: 未知标识符 '{name}'")]
    UnknownIdentifier { name: String, pos: usize },

    #[error("位置 {pos}: 函数 {name} 需要 {expected} 个参数，但提供了 {found} 个")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
        pos: usize,
    },

    #[error("位置 {pos}: '{op}' 需要{expected}操作数，但得到{found}")]
    TypeMismatch {
        op: String,
        expected: Kind,
        found: Kind,
        pos: usize,
    },

    #[error("表达式的结果是数值而不是布尔值")]
    NotBoolean,

    #[error("表达式为空")]
    Empty,

    #[error("位置 {pos}: 表达式嵌套过深")]
    TooDeep { pos: usize },
}

/// 解析并做类型检查，返回表达式及其类型
pub fn compile(src: &str) -> Result<(Expr, Kind), ExprError> {
    let tokens = lexer::tokenize(src)?;
    parser::Parser::new(&tokens).parse()
}

/// 由文本表达式编译而来的谓词
#[derive(Debug, Clone)]
pub struct ExprPredicate {
    source: String,
    expr: Expr,
}

impl ExprPredicate {
    /// 编译谓词；结果必须是布尔类型
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let (expr, kind) = compile(src)?;
        if kind != Kind::Boolean {
            return Err(ExprError::NotBoolean);
        }
        if expr.is_constant() {
            log::debug!("表达式 '{}' 不依赖坐标，结果为常量", src);
        }
        Ok(ExprPredicate {
            source: src.trim().to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl std::str::FromStr for ExprPredicate {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExprPredicate::parse(s)
    }
}

impl Predicate for ExprPredicate {
    fn evaluate(&self, x: &Field, y: &Field, z: &Field) -> Occupancy {
        eval::evaluate(&self.expr, x, y, z).into_occupancy(x.shape)
    }

    fn label(&self) -> Option<&str> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Domain, Grid};

    fn occupancy(src: &str, grid: &Grid) -> Occupancy {
        ExprPredicate::parse(src)
            .unwrap()
            .evaluate(&grid.x, &grid.y, &grid.z)
    }

    #[test]
    fn matches_closure_predicate() {
        let grid = Grid::build(Domain::new(0, 6), 1).unwrap();
        let from_text = occupancy("x**2 + y**2 <= 16 and z > 2", &grid);
        let from_closure = (&grid.x * &grid.x + &grid.y * &grid.y).le(16.0) & grid.z.gt(2.0);
        assert_eq!(from_text, from_closure);
        assert!(from_text.any());
    }

    #[test]
    fn constant_expressions_broadcast() {
        let grid = Grid::build(Domain::new(0, 2), 1).unwrap();
        assert!(occupancy("true", &grid).all());
        assert!(!occupancy("1 > 2", &grid).any());
        assert_eq!(occupancy("true", &grid).shape, [3, 3, 3]);
    }

    #[test]
    fn functions_and_constants() {
        let grid = Grid::build(Domain::new(0, 4), 1).unwrap();
        let a = occupancy("sqrt((x-2)**2 + (y-2)**2 + (z-2)**2) <= 1", &grid);
        // 中心点及其 6 个邻居
        assert_eq!(a.count(), 7);
        let b = occupancy("hypot(x, y) <= 1 & abs(z - 2) < 0.5", &grid);
        assert_eq!(b.count(), 3);
        let c = occupancy("cos(pi * x) > 0", &grid);
        assert_eq!(c.count(), 3 * 25);
    }

    #[test]
    fn numeric_result_is_rejected() {
        assert_eq!(ExprPredicate::parse("x + 1").unwrap_err(), ExprError::NotBoolean);
    }

    #[test]
    fn deeply_nested_source_is_an_error() {
        let src = format!("{}x > 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            ExprPredicate::parse(&src),
            Err(ExprError::TooDeep { .. })
        ));
        let src = format!("{}x > 1", "not ".repeat(10_000));
        assert!(matches!(
            ExprPredicate::parse(&src),
            Err(ExprError::TooDeep { .. })
        ));
    }

    #[test]
    fn tall_but_allowed_tree_evaluates() {
        let grid = Grid::build(Domain::new(0, 2), 1).unwrap();
        // 高度接近上限的左深树
        let src = format!("x{} >= 400", " + 1".repeat(400));
        assert_eq!(occupancy(&src, &grid).count(), 27);
    }

    #[test]
    fn label_is_trimmed_source() {
        let predicate: ExprPredicate = "  z <= 30 ".parse().unwrap();
        assert_eq!(predicate.label(), Some("z <= 30"));
        assert_eq!(predicate.source(), "z <= 30");
    }

    #[test]
    fn errors_render_position() {
        let err = ExprPredicate::parse("x >= 10 & y <= ").unwrap_err();
        assert_eq!(err, ExprError::UnexpectedEnd);
        let err = ExprPredicate::parse("x >= $").unwrap_err();
        assert_eq!(err.to_string(), "位置 5: 无法识别的字符 '$'");
    }
}
