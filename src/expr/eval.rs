use std::borrow::Cow;

use super::ast::{Axis, Expr, UnaryOp};
use crate::utils::voxel_grid::{Field, Occupancy};

/// 求值中间结果：常量子树保持标量，遇到坐标数组时才展开
pub enum Value<'a> {
    Scalar(f64),
    Flag(bool),
    Field(Cow<'a, Field>),
    Mask(Occupancy),
}

enum Numeric<'a> {
    Scalar(f64),
    Field(Cow<'a, Field>),
}

enum Logical {
    Flag(bool),
    Mask(Occupancy),
}

impl<'a> Value<'a> {
    fn into_numeric(self) -> Numeric<'a> {
        match self {
            Value::Scalar(v) => Numeric::Scalar(v),
            Value::Flag(b) => Numeric::Scalar(if b { 1.0 } else { 0.0 }),
            Value::Field(f) => Numeric::Field(f),
            Value::Mask(m) => Numeric::Field(Cow::Owned(m.map(|&b| if b { 1.0 } else { 0.0 }))),
        }
    }

    fn into_logical(self) -> Logical {
        match self {
            Value::Scalar(v) => Logical::Flag(v != 0.0),
            Value::Flag(b) => Logical::Flag(b),
            Value::Field(f) => Logical::Mask(f.map(|&v| v != 0.0)),
            Value::Mask(m) => Logical::Mask(m),
        }
    }

    /// 广播为与 shape 同形的占据体
    pub fn into_occupancy(self, shape: [usize; 3]) -> Occupancy {
        match self.into_logical() {
            Logical::Flag(b) => Occupancy::filled(shape, b),
            Logical::Mask(m) => m,
        }
    }
}

/// 对整个坐标数组一次性求值
pub fn evaluate<'a>(expr: &Expr, x: &'a Field, y: &'a Field, z: &'a Field) -> Value<'a> {
    match expr {
        Expr::Number(v) => Value::Scalar(*v),
        Expr::Bool(b) => Value::Flag(*b),
        Expr::Axis(Axis::X) => Value::Field(Cow::Borrowed(x)),
        Expr::Axis(Axis::Y) => Value::Field(Cow::Borrowed(y)),
        Expr::Axis(Axis::Z) => Value::Field(Cow::Borrowed(z)),
        Expr::Unary(UnaryOp::Neg, inner) => {
            numeric_map(evaluate(inner, x, y, z).into_numeric(), |v| -v)
        }
        Expr::Unary(UnaryOp::Not, inner) => match evaluate(inner, x, y, z).into_logical() {
            Logical::Flag(b) => Value::Flag(!b),
            Logical::Mask(m) => Value::Mask(!m),
        },
        Expr::Binary(op, a, b) => numeric_zip(
            evaluate(a, x, y, z).into_numeric(),
            evaluate(b, x, y, z).into_numeric(),
            |u, v| op.apply(u, v),
        ),
        Expr::Compare(op, a, b) => compare(
            evaluate(a, x, y, z).into_numeric(),
            evaluate(b, x, y, z).into_numeric(),
            |u, v| op.apply(u, v),
        ),
        Expr::Logic(op, a, b) => logic(
            evaluate(a, x, y, z).into_logical(),
            evaluate(b, x, y, z).into_logical(),
            |u, v| op.apply(u, v),
        ),
        Expr::Call(function, args) => match args.as_slice() {
            [arg] => numeric_map(evaluate(arg, x, y, z).into_numeric(), |v| {
                function.apply1(v)
            }),
            [a, b] => numeric_zip(
                evaluate(a, x, y, z).into_numeric(),
                evaluate(b, x, y, z).into_numeric(),
                |u, v| function.apply2(u, v),
            ),
            // 解析阶段已检查参数个数
            _ => Value::Scalar(f64::NAN),
        },
    }
}

fn numeric_map<'a>(value: Numeric<'a>, f: impl Fn(f64) -> f64) -> Value<'a> {
    match value {
        Numeric::Scalar(v) => Value::Scalar(f(v)),
        Numeric::Field(field) => Value::Field(Cow::Owned(field.map(|&v| f(v)))),
    }
}

fn numeric_zip<'a>(a: Numeric<'a>, b: Numeric<'a>, f: impl Fn(f64, f64) -> f64) -> Value<'a> {
    match (a, b) {
        (Numeric::Scalar(u), Numeric::Scalar(v)) => Value::Scalar(f(u, v)),
        (Numeric::Field(fa), Numeric::Scalar(v)) => Value::Field(Cow::Owned(fa.map(|&u| f(u, v)))),
        (Numeric::Scalar(u), Numeric::Field(fb)) => Value::Field(Cow::Owned(fb.map(|&v| f(u, v)))),
        (Numeric::Field(fa), Numeric::Field(fb)) => {
            Value::Field(Cow::Owned(fa.zip_map(&*fb, |&u, &v| f(u, v))))
        }
    }
}

fn compare<'a>(a: Numeric<'a>, b: Numeric<'a>, f: impl Fn(f64, f64) -> bool) -> Value<'a> {
    match (a, b) {
        (Numeric::Scalar(u), Numeric::Scalar(v)) => Value::Flag(f(u, v)),
        (Numeric::Field(fa), Numeric::Scalar(v)) => Value::Mask(fa.map(|&u| f(u, v))),
        (Numeric::Scalar(u), Numeric::Field(fb)) => Value::Mask(fb.map(|&v| f(u, v))),
        (Numeric::Field(fa), Numeric::Field(fb)) => Value::Mask(fa.zip_map(&*fb, |&u, &v| f(u, v))),
    }
}

fn logic<'a>(a: Logical, b: Logical, f: impl Fn(bool, bool) -> bool) -> Value<'a> {
    match (a, b) {
        (Logical::Flag(u), Logical::Flag(v)) => Value::Flag(f(u, v)),
        (Logical::Mask(ma), Logical::Flag(v)) => Value::Mask(ma.map(|&u| f(u, v))),
        (Logical::Flag(u), Logical::Mask(mb)) => Value::Mask(mb.map(|&v| f(u, v))),
        (Logical::Mask(ma), Logical::Mask(mb)) => Value::Mask(ma.zip_map(&mb, |&u, &v| f(u, v))),
    }
}
