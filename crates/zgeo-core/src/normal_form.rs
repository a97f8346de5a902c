//! 内置代数后端：多项式范式
//!
//! 把表达式展开为有理系数单项式之和，单项式是若干"原子"的整数次幂：
//! - 自由符号 `x7`
//! - 常数根式 `sqrt(m)`，`m` 为无平方因子的正整数
//! - 非常数多项式的平方根
//! - 无法有理化的商
//!
//! 范式是唯一的（在原子内部也递归规范化），因此相等的结构会合并、
//! 相消的项会消失。分母中的根式通过共轭有理化消去。

use crate::error::SimplifyError;
use crate::expr::Expr;
use crate::expr_parser;
use crate::math::Rational;
use crate::simplify::AlgebraBackend;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// 多项式项数上限，超过视为溢出
const MAX_TERMS: usize = 512;

/// 分母有理化的最大轮数
const MAX_RATIONALIZE_STEPS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Atom {
    Symbol(String),
    Root(i128),
    Sqrt(Poly),
    Quotient(Poly, Poly),
}

impl Atom {
    fn is_radical(&self) -> bool {
        matches!(self, Atom::Root(_) | Atom::Sqrt(_))
    }

    /// 原子的平方
    fn squared(&self) -> Result<Poly, SimplifyError> {
        match self {
            Atom::Root(m) => Ok(Poly::constant(Rational::integer(*m))),
            Atom::Sqrt(p) => Ok(p.clone()),
            other => Poly::atom(other.clone()).mul(&Poly::atom(other.clone())),
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            Atom::Symbol(name) => Expr::Symbol(name.clone()),
            Atom::Root(m) => Expr::Sqrt(Rc::new(Expr::Const(Rational::integer(*m)))),
            Atom::Sqrt(p) => Expr::Sqrt(Rc::new(p.to_expr())),
            Atom::Quotient(n, d) => Expr::Div(Rc::new(n.to_expr()), Rc::new(d.to_expr())),
        }
    }
}

type Monomial = BTreeMap<Atom, i32>;

fn merge(a: &Monomial, b: &Monomial) -> Monomial {
    let mut out = a.clone();
    for (atom, exp) in b {
        let e = out.entry(atom.clone()).or_insert(0);
        *e += exp;
        if *e == 0 {
            out.remove(atom);
        }
    }
    out
}

fn overflow() -> SimplifyError {
    SimplifyError::Overflow
}

/// 规范多项式
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: Rational) -> Self {
        Self::raw_term(value, Monomial::new())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::atom(Atom::Symbol(name.into()))
    }

    fn atom(atom: Atom) -> Self {
        Self::raw_term(Rational::ONE, Monomial::from([(atom, 1)]))
    }

    /// 不做任何约化的单项
    fn raw_term(coeff: Rational, mono: Monomial) -> Self {
        let mut terms = BTreeMap::new();
        if !coeff.is_zero() {
            terms.insert(mono, coeff);
        }
        Self { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::ZERO),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(mono, _)| mono.is_empty())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    fn accumulate(
        terms: &mut BTreeMap<Monomial, Rational>,
        mono: Monomial,
        coeff: Rational,
    ) -> Result<(), SimplifyError> {
        match terms.entry(mono) {
            Entry::Occupied(mut entry) => {
                let sum = entry.get().checked_add(coeff).ok_or_else(overflow)?;
                if sum.is_zero() {
                    entry.remove();
                } else {
                    *entry.get_mut() = sum;
                }
            }
            Entry::Vacant(entry) => {
                if !coeff.is_zero() {
                    entry.insert(coeff);
                }
            }
        }
        if terms.len() > MAX_TERMS {
            return Err(overflow());
        }
        Ok(())
    }

    pub fn add(&self, other: &Poly) -> Result<Poly, SimplifyError> {
        let mut terms = self.terms.clone();
        for (mono, coeff) in &other.terms {
            Self::accumulate(&mut terms, mono.clone(), *coeff)?;
        }
        Ok(Poly { terms })
    }

    pub fn neg(&self) -> Result<Poly, SimplifyError> {
        self.scale(Rational::integer(-1))
    }

    pub fn sub(&self, other: &Poly) -> Result<Poly, SimplifyError> {
        self.add(&other.neg()?)
    }

    pub fn scale(&self, factor: Rational) -> Result<Poly, SimplifyError> {
        if factor.is_zero() {
            return Ok(Poly::zero());
        }
        let mut terms = BTreeMap::new();
        for (mono, coeff) in &self.terms {
            terms.insert(mono.clone(), coeff.checked_mul(factor).ok_or_else(overflow)?);
        }
        Ok(Poly { terms })
    }

    pub fn mul(&self, other: &Poly) -> Result<Poly, SimplifyError> {
        let mut terms = BTreeMap::new();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                let coeff = c1.checked_mul(*c2).ok_or_else(overflow)?;
                let product = Self::term(coeff, merge(m1, m2))?;
                for (mono, coeff) in product.terms {
                    Self::accumulate(&mut terms, mono, coeff)?;
                }
            }
        }
        Ok(Poly { terms })
    }

    fn pow(&self, exp: u32) -> Result<Poly, SimplifyError> {
        let mut result = Poly::constant(Rational::ONE);
        for _ in 0..exp {
            result = result.mul(self)?;
        }
        Ok(result)
    }

    /// 约化单项式中根式的高次幂
    ///
    /// `sqrt(m)^e` 变为 `m^(e div 2) * sqrt(m)^(e mod 2)`；
    /// 非常数根式的正次幂按同样方式展开为多项式。
    fn term(coeff: Rational, mono: Monomial) -> Result<Poly, SimplifyError> {
        let mut coeff = coeff;
        let mut rest = Monomial::new();
        let mut expansions = Vec::new();
        for (atom, exp) in mono {
            match atom {
                Atom::Root(m) => {
                    let factor = Rational::integer(m)
                        .checked_pow(exp.div_euclid(2))
                        .ok_or_else(overflow)?;
                    coeff = coeff.checked_mul(factor).ok_or_else(overflow)?;
                    if exp.rem_euclid(2) == 1 {
                        rest.insert(Atom::Root(m), 1);
                    }
                }
                Atom::Sqrt(p) if exp >= 2 => {
                    expansions.push(p.pow((exp / 2) as u32)?);
                    if exp % 2 == 1 {
                        rest.insert(Atom::Sqrt(p), 1);
                    }
                }
                other => {
                    if exp != 0 {
                        rest.insert(other, exp);
                    }
                }
            }
        }
        let mut result = Poly::raw_term(coeff, rest);
        for factor in expansions {
            result = result.mul(&factor)?;
        }
        Ok(result)
    }

    pub fn div(&self, divisor: &Poly) -> Result<Poly, SimplifyError> {
        self.div_with_budget(divisor, MAX_RATIONALIZE_STEPS)
    }

    fn div_with_budget(&self, divisor: &Poly, budget: usize) -> Result<Poly, SimplifyError> {
        if divisor.is_zero() {
            return Err(SimplifyError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Poly::zero());
        }
        if self == divisor {
            return Ok(Poly::constant(Rational::ONE));
        }

        // 单项式除数：系数取倒数，指数取负
        if divisor.terms.len() == 1 {
            if let Some((mono, coeff)) = divisor.terms.iter().next() {
                let inverse_coeff = coeff.recip().ok_or(SimplifyError::DivisionByZero)?;
                let inverse_mono: Monomial = mono.iter().map(|(a, e)| (a.clone(), -e)).collect();
                return self.mul(&Self::term(inverse_coeff, inverse_mono)?);
            }
        }

        // 除数为 A + B*r 时乘以共轭 A - B*r
        if budget > 0 {
            if let Some(radical) = divisor.rationalizable_radical() {
                let (rest, coefficient) = divisor.split_on(&radical);
                let conjugate = rest.sub(&coefficient.mul(&Poly::atom(radical.clone()))?)?;
                let numerator = self.mul(&conjugate)?;
                let denominator = rest
                    .mul(&rest)?
                    .sub(&coefficient.mul(&coefficient)?.mul(&radical.squared()?)?)?;
                return numerator.div_with_budget(&denominator, budget - 1);
            }
        }

        Ok(Poly::atom(Atom::Quotient(self.clone(), divisor.clone())))
    }

    /// 只以一次幂出现的根式原子
    fn rationalizable_radical(&self) -> Option<Atom> {
        let mut exponents: BTreeMap<&Atom, bool> = BTreeMap::new();
        for mono in self.terms.keys() {
            for (atom, exp) in mono {
                if atom.is_radical() {
                    let ok = exponents.entry(atom).or_insert(true);
                    *ok &= *exp == 1;
                }
            }
        }
        exponents
            .into_iter()
            .find(|(_, ok)| *ok)
            .map(|(atom, _)| atom.clone())
    }

    /// 按原子 `r` 拆分：`self = rest + coefficient * r`
    fn split_on(&self, radical: &Atom) -> (Poly, Poly) {
        let mut rest = BTreeMap::new();
        let mut coefficient = BTreeMap::new();
        for (mono, coeff) in &self.terms {
            if mono.contains_key(radical) {
                let mut reduced = mono.clone();
                reduced.remove(radical);
                coefficient.insert(reduced, *coeff);
            } else {
                rest.insert(mono.clone(), *coeff);
            }
        }
        (Poly { terms: rest }, Poly { terms: coefficient })
    }

    pub fn sqrt(&self) -> Result<Poly, SimplifyError> {
        if let Some(c) = self.as_constant() {
            if c.is_negative() {
                return Ok(Poly::atom(Atom::Sqrt(self.clone())));
            }
            let (outer, inner) = c.sqrt_parts().ok_or_else(overflow)?;
            return if inner == 1 {
                Ok(Poly::constant(outer))
            } else {
                Ok(Poly::raw_term(outer, Monomial::from([(Atom::Root(inner), 1)])))
            };
        }

        // 根号内首项系数规范为 ±1，公因子移到根号外
        let lead = self
            .terms
            .values()
            .next()
            .map(|c| c.abs())
            .ok_or(SimplifyError::DivisionByZero)?;
        let inner = self.scale(lead.recip().ok_or(SimplifyError::DivisionByZero)?)?;
        Poly::constant(lead)
            .sqrt()?
            .mul(&Poly::atom(Atom::Sqrt(inner)))
    }

    /// 渲染回表达式树
    ///
    /// 常数项在前，后续项的负系数渲染为减法。分数系数的分母放到整体分母上，
    /// 例如 `sqrt(3)/2`。
    pub fn to_expr(&self) -> Expr {
        let mut acc: Option<Expr> = None;
        for (mono, coeff) in &self.terms {
            acc = Some(match acc {
                None => term_expr(*coeff, mono),
                Some(prev) if coeff.is_negative() => Expr::Sub(
                    Rc::new(prev),
                    Rc::new(term_expr(coeff.abs(), mono)),
                ),
                Some(prev) => Expr::Add(Rc::new(prev), Rc::new(term_expr(*coeff, mono))),
            });
        }
        acc.unwrap_or_else(Expr::zero)
    }
}

fn product(acc: Option<Expr>, factor: Expr) -> Option<Expr> {
    Some(match acc {
        None => factor,
        Some(prev) => Expr::Mul(Rc::new(prev), Rc::new(factor)),
    })
}

fn term_expr(coeff: Rational, mono: &Monomial) -> Expr {
    if mono.is_empty() {
        return Expr::Const(coeff);
    }
    let numer = coeff.numer();
    let mut numerator = (numer.abs() != 1).then(|| Expr::Const(Rational::integer(numer)));
    let mut denominator =
        (coeff.denom() != 1).then(|| Expr::Const(Rational::integer(coeff.denom())));
    for (atom, exp) in mono {
        let factor = atom.to_expr();
        for _ in 0..exp.unsigned_abs() {
            if *exp > 0 {
                numerator = product(numerator, factor.clone());
            } else {
                denominator = product(denominator, factor.clone());
            }
        }
    }

    let numerator = numerator.unwrap_or_else(|| Expr::int(1));
    let numerator = if numer == -1 { -numerator } else { numerator };
    match denominator {
        None => numerator,
        Some(q) => Expr::Div(Rc::new(numerator), Rc::new(q)),
    }
}

/// 把表达式树化为范式
///
/// 共享的子树（同一个 `Rc` 节点）只化简一次，代价与共享图的大小成正比。
pub fn normalize(expr: &Expr) -> Result<Poly, SimplifyError> {
    Normalizer::default().poly(expr)
}

#[derive(Default)]
struct Normalizer {
    memo: HashMap<*const Expr, Poly>,
}

impl Normalizer {
    fn shared(&mut self, node: &Rc<Expr>) -> Result<Poly, SimplifyError> {
        let key = Rc::as_ptr(node);
        if let Some(poly) = self.memo.get(&key) {
            return Ok(poly.clone());
        }
        let poly = self.poly(node)?;
        self.memo.insert(key, poly.clone());
        Ok(poly)
    }

    fn poly(&mut self, expr: &Expr) -> Result<Poly, SimplifyError> {
        match expr {
            Expr::Const(c) => Ok(Poly::constant(*c)),
            Expr::Symbol(name) => Ok(Poly::symbol(name.clone())),
            Expr::Neg(a) => self.shared(a)?.neg(),
            Expr::Add(a, b) => self.shared(a)?.add(&self.shared(b)?),
            Expr::Sub(a, b) => self.shared(a)?.sub(&self.shared(b)?),
            Expr::Mul(a, b) => self.shared(a)?.mul(&self.shared(b)?),
            Expr::Div(a, b) => self.shared(a)?.div(&self.shared(b)?),
            Expr::Sqrt(a) => self.shared(a)?.sqrt(),
        }
    }
}

/// 化简表达式树
pub fn simplify_expr(expr: &Expr) -> Result<Expr, SimplifyError> {
    Ok(normalize(expr)?.to_expr())
}

/// 基于多项式范式的内置后端
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalFormBackend;

impl AlgebraBackend for NormalFormBackend {
    fn name(&self) -> &str {
        "normal-form"
    }

    fn simplify(&self, input: &str) -> Result<String, SimplifyError> {
        let expr = expr_parser::parse(input)?;
        Ok(simplify_expr(&expr)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simplify(text: &str) -> String {
        NormalFormBackend.simplify(text).unwrap()
    }

    #[test]
    fn test_constant_radicals() {
        assert_eq!(simplify("sqrt(3/4)"), "sqrt(3)/2");
        assert_eq!(simplify("sqrt(12)"), "2*sqrt(3)");
        assert_eq!(simplify("sqrt(3)*sqrt(3)"), "3");
        assert_eq!(simplify("sqrt(2)*sqrt(8)"), "4");
        assert_eq!(simplify("-sqrt(3/4)"), "-sqrt(3)/2");
        assert_eq!(simplify("2*sqrt(3)*x1/3"), "2*x1*sqrt(3)/3");
    }

    #[test]
    fn test_cancels_common_radical() {
        assert_eq!(simplify("(-1/2*sqrt(3))/(-sqrt(3))"), "1/2");
        assert_eq!(simplify("(x1 + sqrt(2)) - sqrt(2)"), "x1");
    }

    #[test]
    fn test_rationalizes_conjugate() {
        // 1/(1 + sqrt(2)) = sqrt(2) - 1
        assert_eq!(simplify("1/(1 + sqrt(2))"), "-1 + sqrt(2)");
        // (1 + sqrt(3))/(1 + sqrt(3)) = 1
        assert_eq!(simplify("(2 + 2*sqrt(3))/(1 + sqrt(3))"), "2");
    }

    #[test]
    fn test_symbols_expand() {
        assert_eq!(simplify("(x1 + 1)*(x1 - 1) - x1*x1"), "-1");
        assert_eq!(simplify("x2/2 + x2/2"), "x2");
    }

    #[test]
    fn test_output_is_stable() {
        for text in ["sqrt(3/4) + 1/2", "1/(1 + sqrt(2))", "x1/(x1 + y1)", "sqrt(1 - x3)"] {
            let once = simplify(text);
            assert_eq!(simplify(&once), once);
        }
    }

    #[test]
    fn test_normalize_visits_shared_nodes_once() {
        let mut e = Expr::symbol("x3");
        // 展开后约 2^64 个节点
        for _ in 0..64 {
            e = (e.clone() - e.clone()) * Expr::int(2).sqrt() + e.clone();
        }
        assert_eq!(normalize(&e).unwrap(), Poly::symbol("x3"));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            NormalFormBackend.simplify("x1/(sqrt(2)*sqrt(2) - 2)"),
            Err(SimplifyError::DivisionByZero)
        );
    }

    #[test]
    fn test_parse_error_propagates() {
        assert!(matches!(
            NormalFormBackend.simplify("1 +"),
            Err(SimplifyError::Parse { .. })
        ));
    }
}
