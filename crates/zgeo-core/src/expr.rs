//! 符号表达式树
//!
//! 交点坐标以表达式树表示，只在化简器边界渲染为文本。
//! 节点通过 `Rc` 共享，同一个祖先点的表达式被多个后代引用时不会复制。
//!
//! 算术运算符做最基本的常量折叠（常量与常量、加零、乘一、乘零），
//! 其余化简留给 [`crate::simplify`]。

use crate::math::Rational;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// 表达式节点
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Rational),
    /// 自由符号，例如来源未知的点坐标 `x7`
    Symbol(String),
    Neg(Rc<Expr>),
    Add(Rc<Expr>, Rc<Expr>),
    Sub(Rc<Expr>, Rc<Expr>),
    Mul(Rc<Expr>, Rc<Expr>),
    Div(Rc<Expr>, Rc<Expr>),
    Sqrt(Rc<Expr>),
}

impl Expr {
    pub fn constant(value: Rational) -> Self {
        Expr::Const(value)
    }

    pub fn int(value: i64) -> Self {
        Expr::Const(Rational::from(value))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn zero() -> Self {
        Expr::Const(Rational::ZERO)
    }

    pub fn sqrt(self) -> Self {
        if let Expr::Const(c) = &self {
            if let Some((outer, 1)) = c.sqrt_parts() {
                return Expr::Const(outer);
            }
        }
        Expr::Sqrt(Rc::new(self))
    }

    pub fn as_const(&self) -> Option<Rational> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    fn is_const(&self, value: Rational) -> bool {
        self.as_const() == Some(value)
    }

    /// 数值求值，符号通过 `lookup` 取值
    ///
    /// 结果不是有限数（例如负数开方）时返回 `None`。
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Option<f64> {
        let value = match self {
            Expr::Const(c) => c.to_f64(),
            Expr::Symbol(name) => lookup(name)?,
            Expr::Neg(a) => -a.eval(lookup)?,
            Expr::Add(a, b) => a.eval(lookup)? + b.eval(lookup)?,
            Expr::Sub(a, b) => a.eval(lookup)? - b.eval(lookup)?,
            Expr::Mul(a, b) => a.eval(lookup)? * b.eval(lookup)?,
            Expr::Div(a, b) => a.eval(lookup)? / b.eval(lookup)?,
            Expr::Sqrt(a) => a.eval(lookup)?.sqrt(),
        };
        value.is_finite().then_some(value)
    }

    /// 表达式中出现的全部符号
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(a) | Expr::Sqrt(a) => a.collect_symbols(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// 展开后的节点数（共享节点按出现次数计），超过 `limit` 时返回 `None`
    ///
    /// 遍历在超限时立即停止，代价不超过 `limit`。
    pub fn size_within(&self, limit: usize) -> Option<usize> {
        let mut count = 0;
        self.count_nodes(&mut count, limit).then_some(count)
    }

    fn count_nodes(&self, count: &mut usize, limit: usize) -> bool {
        *count += 1;
        if *count > limit {
            return false;
        }
        match self {
            Expr::Const(_) | Expr::Symbol(_) => true,
            Expr::Neg(a) | Expr::Sqrt(a) => a.count_nodes(count, limit),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.count_nodes(count, limit) && b.count_nodes(count, limit)
            }
        }
    }

    /// 渲染优先级：加减 1，乘除 2，取负 3，原子 4
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Const(c) if !c.is_integer() => 2,
            Expr::Const(c) if c.is_negative() => 3,
            Expr::Const(_) | Expr::Symbol(_) | Expr::Sqrt(_) => 4,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Neg(a) => {
                write!(f, "-")?;
                a.fmt_at(f, 3)
            }
            Expr::Add(a, b) => {
                a.fmt_at(f, 1)?;
                write!(f, " + ")?;
                b.fmt_at(f, 2)
            }
            Expr::Sub(a, b) => {
                a.fmt_at(f, 1)?;
                write!(f, " - ")?;
                b.fmt_at(f, 2)
            }
            Expr::Mul(a, b) => {
                a.fmt_at(f, 2)?;
                write!(f, "*")?;
                b.fmt_at(f, 3)
            }
            Expr::Div(a, b) => {
                a.fmt_at(f, 2)?;
                write!(f, "/")?;
                b.fmt_at(f, 3)
            }
            Expr::Sqrt(a) => {
                write!(f, "sqrt(")?;
                a.fmt_at(f, 0)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl From<Rational> for Expr {
    fn from(value: Rational) -> Self {
        Expr::Const(value)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            if let Some(sum) = a.checked_add(b) {
                return Expr::Const(sum);
            }
        }
        if self.is_const(Rational::ZERO) {
            return rhs;
        }
        if rhs.is_const(Rational::ZERO) {
            return self;
        }
        Expr::Add(Rc::new(self), Rc::new(rhs))
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            if let Some(diff) = a.checked_sub(b) {
                return Expr::Const(diff);
            }
        }
        if rhs.is_const(Rational::ZERO) {
            return self;
        }
        if self.is_const(Rational::ZERO) {
            return -rhs;
        }
        Expr::Sub(Rc::new(self), Rc::new(rhs))
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            if let Some(product) = a.checked_mul(b) {
                return Expr::Const(product);
            }
        }
        if self.is_const(Rational::ZERO) || rhs.is_const(Rational::ZERO) {
            return Expr::zero();
        }
        if self.is_const(Rational::ONE) {
            return rhs;
        }
        if rhs.is_const(Rational::ONE) {
            return self;
        }
        Expr::Mul(Rc::new(self), Rc::new(rhs))
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (self.as_const(), rhs.as_const()) {
            if let Some(quotient) = a.checked_div(b) {
                return Expr::Const(quotient);
            }
        }
        if rhs.is_const(Rational::ONE) {
            return self;
        }
        Expr::Div(Rc::new(self), Rc::new(rhs))
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Const(c) => match c.checked_neg() {
                Some(n) => Expr::Const(n),
                None => Expr::Neg(Rc::new(Expr::Const(c))),
            },
            Expr::Neg(inner) => Rc::unwrap_or_clone(inner),
            other => Expr::Neg(Rc::new(other)),
        }
    }
}
