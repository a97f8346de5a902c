//! 数学基础类型
//!
//! 数值坐标使用 nalgebra 的二维类型；符号计算中的精确常量使用 [`Rational`]。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 二维点
pub type Point2 = nalgebra::Point2<f64>;

/// 二维向量
pub type Vector2 = nalgebra::Vector2<f64>;

/// 精确零值判断使用的极小量
pub const EPSILON: f64 = 1e-10;

/// 默认几何容差（坐标单位）
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// 二维叉积（z 分量）
#[inline]
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// 有理数
///
/// 分母恒为正且与分子互素，因此同一数值只有一种表示。
/// 所有运算都是带溢出检查的，溢出时返回 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// 创建有理数，分母为零时返回 `None`
    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = num.checked_neg()?;
            den = den.checked_neg()?;
        }
        Some(Self { num, den })
    }

    pub fn integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_one(&self) -> bool {
        self.num == 1 && self.den == 1
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        Self::new(num, self.den.checked_mul(other.den)?)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        // 先交叉约分，降低溢出概率
        let g1 = gcd(self.num, other.den);
        let g2 = gcd(other.num, self.den);
        let num = (self.num / g1).checked_mul(other.num / g2)?;
        let den = (self.den / g2).checked_mul(other.den / g1)?;
        Self::new(num, den)
    }

    pub fn checked_div(self, other: Self) -> Option<Self> {
        self.checked_mul(other.recip()?)
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Self {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn abs(self) -> Self {
        Self {
            num: self.num.saturating_abs(),
            den: self.den,
        }
    }

    /// 倒数，零没有倒数
    pub fn recip(self) -> Option<Self> {
        Self::new(self.den, self.num)
    }

    /// 整数次幂（允许负指数）
    pub fn checked_pow(self, exp: i32) -> Option<Self> {
        let base = if exp < 0 { self.recip()? } else { self };
        let mut result = Self::ONE;
        for _ in 0..exp.unsigned_abs() {
            result = result.checked_mul(base)?;
        }
        Some(result)
    }

    /// 把平方根拆成 `系数 * sqrt(m)`，其中 `m` 为无平方因子的正整数
    ///
    /// 负数返回 `None`。`sqrt(n/d) = sqrt(n*d) / d`。
    pub fn sqrt_parts(self) -> Option<(Rational, i128)> {
        if self.num < 0 {
            return None;
        }
        if self.num == 0 {
            return Some((Self::ZERO, 1));
        }
        let radicand = self.num.checked_mul(self.den)?;
        let (outer, inner) = split_square_factor(radicand);
        Some((Self::new(outer, self.den)?, inner))
    }

    /// 从十进制文本解析，例如 `"12"`、`"0.25"`、`"-3.5"`
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let mut num: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            num = num.checked_mul(10)?.checked_add(c.to_digit(10)? as i128)?;
        }
        let den = 10i128.checked_pow(frac_part.len() as u32)?;
        let value = Self::new(num, den)?;
        if negative {
            value.checked_neg()
        } else {
            Some(value)
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::integer(value as i128)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        match (
            self.num.checked_mul(other.den),
            other.num.checked_mul(self.den),
        ) {
            (Some(a), Some(b)) => a.cmp(&b),
            // 溢出时退回浮点比较，再按表示比较保证全序
            _ => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal)
                .then(self.num.cmp(&other.num))
                .then(self.den.cmp(&other.den)),
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    if a == 0 {
        1
    } else {
        a as i128
    }
}

/// 试除的上限，超过后只检查剩余部分是否为完全平方数
const TRIAL_DIVISION_LIMIT: i128 = 100_000;

/// 把正整数 `n` 拆成 `outer² * inner`
fn split_square_factor(n: i128) -> (i128, i128) {
    let mut outer = 1i128;
    let mut inner = 1i128;
    let mut rest = n;
    let mut p = 2i128;
    while p <= TRIAL_DIVISION_LIMIT && p * p <= rest {
        let mut count = 0;
        while rest % p == 0 {
            rest /= p;
            count += 1;
        }
        for _ in 0..count / 2 {
            outer *= p;
        }
        if count % 2 == 1 {
            inner *= p;
        }
        p += 1;
    }
    match isqrt(rest) {
        Some(root) if root * root == rest => outer *= root,
        _ => inner *= rest,
    }
    (outer, inner)
}

fn isqrt(n: i128) -> Option<i128> {
    if n < 0 {
        return None;
    }
    let mut x = (n as f64).sqrt() as i128;
    while x > 0 && x.checked_mul(x).map_or(true, |sq| sq > n) {
        x -= 1;
    }
    while (x + 1).checked_mul(x + 1).is_some_and(|sq| sq <= n) {
        x += 1;
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i128, d: i128) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn test_rational_normalization() {
        assert_eq!(r(2, 4), r(1, 2));
        assert_eq!(r(3, -6), r(-1, 2));
        assert_eq!(r(-3, -6).to_string(), "1/2");
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn test_rational_arithmetic() {
        let half = r(1, 2);
        let third = r(1, 3);
        assert_eq!(half.checked_add(third).unwrap(), r(5, 6));
        assert_eq!(half.checked_sub(third).unwrap(), r(1, 6));
        assert_eq!(half.checked_mul(third).unwrap(), r(1, 6));
        assert_eq!(half.checked_div(third).unwrap(), r(3, 2));
        assert!(half.checked_div(Rational::ZERO).is_none());
        assert_eq!(r(2, 3).checked_pow(-2).unwrap(), r(9, 4));
    }

    #[test]
    fn test_rational_ordering() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(-1, 2) < Rational::ZERO);
    }

    #[test]
    fn test_sqrt_parts() {
        // sqrt(3/4) = 1/2 * sqrt(3)
        assert_eq!(r(3, 4).sqrt_parts(), Some((r(1, 2), 3)));
        // sqrt(8) = 2 * sqrt(2)
        assert_eq!(r(8, 1).sqrt_parts(), Some((r(2, 1), 2)));
        // sqrt(9/4) = 3/2
        assert_eq!(r(9, 4).sqrt_parts(), Some((r(3, 2), 1)));
        assert_eq!(r(-1, 1).sqrt_parts(), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Rational::parse_decimal("0.5"), Some(r(1, 2)));
        assert_eq!(Rational::parse_decimal("-12"), Some(r(-12, 1)));
        assert_eq!(Rational::parse_decimal("2.25"), Some(r(9, 4)));
        assert_eq!(Rational::parse_decimal("abc"), None);
        assert_eq!(Rational::parse_decimal("."), None);
    }

    #[test]
    fn test_cross() {
        let a = Vector2::new(1.0, 0.0);
        let b = Vector2::new(0.0, 1.0);
        assert!((cross(&a, &b) - 1.0).abs() < EPSILON);
    }
}
