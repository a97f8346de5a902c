//! 交点代数
//!
//! 三种交点公式（直线∩直线、直线∩圆弧、圆弧∩圆弧）对标量类型泛型实现，
//! 同一份公式既用 `f64` 计算数值候选点，也用 [`Expr`] 生成符号表达式，
//! 因此两者的根分支顺序天然一致：数值上选出哪个分支，就取同一分支的符号式。

use crate::curve::CurveKind;
use crate::expr::Expr;
use crate::math::{cross, Point2, EPSILON};
use crate::point_store::PointId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 交点公式使用的标量
pub trait Scalar:
    Clone
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn int(value: i64) -> Self;

    fn square_root(self) -> Self;
}

impl Scalar for f64 {
    fn int(value: i64) -> Self {
        value as f64
    }

    /// 负值截断为 0，调用方需先排除无实根的情况
    fn square_root(self) -> Self {
        self.max(0.0).sqrt()
    }
}

impl Scalar for Expr {
    fn int(value: i64) -> Self {
        Expr::int(value)
    }

    fn square_root(self) -> Self {
        self.sqrt()
    }
}

/// 二维坐标对
#[derive(Debug, Clone, PartialEq)]
pub struct Coords<S> {
    pub x: S,
    pub y: S,
}

/// 点的符号坐标
pub type PointExpr = Coords<Expr>;

impl<S> Coords<S> {
    pub fn new(x: S, y: S) -> Self {
        Self { x, y }
    }
}

impl Coords<f64> {
    pub fn from_point(p: &Point2) -> Self {
        Self::new(p.x, p.y)
    }

    pub fn to_point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

impl Coords<Expr> {
    /// 公理点的精确坐标，非公理点返回 `None`
    pub fn axiom(id: PointId) -> Option<Self> {
        match id {
            PointId::ORIGIN => Some(Self::new(Expr::int(0), Expr::int(0))),
            PointId::UNIT => Some(Self::new(Expr::int(1), Expr::int(0))),
            _ => None,
        }
    }

    /// 以自由符号 `x<id>`、`y<id>` 代表点坐标
    pub fn placeholder(id: PointId) -> Self {
        Self::new(
            Expr::symbol(format!("x{}", id.0)),
            Expr::symbol(format!("y{}", id.0)),
        )
    }

    /// 数值求值
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Option<Point2> {
        Some(Point2::new(self.x.eval(lookup)?, self.y.eval(lookup)?))
    }

    /// 两个坐标合计的展开节点数，超过 `limit` 时返回 `None`
    pub fn size_within(&self, limit: usize) -> Option<usize> {
        let x = self.x.size_within(limit)?;
        let y = self.y.size_within(limit - x)?;
        Some(x + y)
    }
}

impl<S: fmt::Display> fmt::Display for Coords<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

fn sq<S: Scalar>(v: S) -> S {
    v.clone() * v
}

fn dist_sq<S: Scalar>(a: &Coords<S>, b: &Coords<S>) -> S {
    sq(b.x.clone() - a.x.clone()) + sq(b.y.clone() - a.y.clone())
}

/// 直线 AB 与直线 CD 的行列式（为零时平行或重合）
pub fn line_line_determinant<S: Scalar>(
    a: &Coords<S>,
    b: &Coords<S>,
    c: &Coords<S>,
    d: &Coords<S>,
) -> S {
    (a.x.clone() - b.x.clone()) * (c.y.clone() - d.y.clone())
        - (a.y.clone() - b.y.clone()) * (c.x.clone() - d.x.clone())
}

/// 直线 AB 与直线 CD 的交点（2×2 行列式公式）
pub fn line_line<S: Scalar>(
    a: &Coords<S>,
    b: &Coords<S>,
    c: &Coords<S>,
    d: &Coords<S>,
) -> Coords<S> {
    let det = line_line_determinant(a, b, c, d);
    let p = a.x.clone() * b.y.clone() - a.y.clone() * b.x.clone();
    let q = c.x.clone() * d.y.clone() - c.y.clone() * d.x.clone();
    let x = (p.clone() * (c.x.clone() - d.x.clone()) - (a.x.clone() - b.x.clone()) * q.clone())
        / det.clone();
    let y = (p * (c.y.clone() - d.y.clone()) - (a.y.clone() - b.y.clone()) * q) / det;
    Coords::new(x, y)
}

/// 直线 P1P2 与圆弧（圆心 C，过点 E）的两个交点，顺序为 `[t+, t-]`
///
/// 直线参数化为 `P1 + t·(P2 − P1)`，代入 `|X − C|² = r²` 解关于 `t` 的二次方程。
pub fn line_arc<S: Scalar>(
    p1: &Coords<S>,
    p2: &Coords<S>,
    centre: &Coords<S>,
    edge: &Coords<S>,
) -> [Coords<S>; 2] {
    let dx = p2.x.clone() - p1.x.clone();
    let dy = p2.y.clone() - p1.y.clone();
    let fx = p1.x.clone() - centre.x.clone();
    let fy = p1.y.clone() - centre.y.clone();
    let r2 = dist_sq(centre, edge);

    let a = sq(dx.clone()) + sq(dy.clone());
    let b = S::int(2) * (fx.clone() * dx.clone() + fy.clone() * dy.clone());
    let c = sq(fx) + sq(fy) - r2;
    let disc = sq(b.clone()) - S::int(4) * a.clone() * c;
    let root = disc.square_root();
    let two_a = S::int(2) * a;

    let t_plus = (-b.clone() + root.clone()) / two_a.clone();
    let t_minus = (-b - root) / two_a;

    let at = |t: S| {
        Coords::new(
            p1.x.clone() + t.clone() * dx.clone(),
            p1.y.clone() + t * dy.clone(),
        )
    };
    [at(t_plus), at(t_minus)]
}

/// 两个圆弧的交点，顺序为 `[+h, -h]`
///
/// 根轴构造：先在圆心连线上取投影点，再沿垂直方向偏移 `±h`。
pub fn arc_arc<S: Scalar>(
    c1: &Coords<S>,
    e1: &Coords<S>,
    c2: &Coords<S>,
    e2: &Coords<S>,
) -> [Coords<S>; 2] {
    let dx = c2.x.clone() - c1.x.clone();
    let dy = c2.y.clone() - c1.y.clone();
    let d2 = sq(dx.clone()) + sq(dy.clone());
    let r1 = dist_sq(c1, e1);
    let r2 = dist_sq(c2, e2);

    // 投影点在连线上的比例，以及 (h/d)²
    let k = (r1.clone() - r2 + d2.clone()) / (S::int(2) * d2.clone());
    let h2 = r1 / d2 - sq(k.clone());
    let s = h2.square_root();

    let bx = c1.x.clone() + k.clone() * dx.clone();
    let by = c1.y.clone() + k * dy.clone();

    [
        Coords::new(
            bx.clone() - s.clone() * dy.clone(),
            by.clone() + s.clone() * dx.clone(),
        ),
        Coords::new(bx + s.clone() * dy, by - s * dx),
    ]
}

/// 选中的根分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// 直线∩直线只有一个解
    Unique,
    /// `t+` 或 `+h`
    Plus,
    /// `t-` 或 `-h`
    Minus,
}

impl Branch {
    fn index(&self) -> usize {
        match self {
            Branch::Unique | Branch::Plus => 0,
            Branch::Minus => 1,
        }
    }
}

/// 数值上无法求交的情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// 两直线平行或重合
    Parallel,
    /// 判别式为负或两圆相离/内含
    NoRealIntersection,
    /// 两圆同心
    CoincidentCentres,
    /// 定义点重合，曲线退化
    DegenerateCurve,
}

/// 参与求交的一条曲线：类型、两个定义点的符号坐标和实时数值坐标
#[derive(Debug, Clone)]
pub struct CurveInput {
    pub kind: CurveKind,
    pub first: PointExpr,
    pub second: PointExpr,
    pub first_pos: Point2,
    pub second_pos: Point2,
}

impl CurveInput {
    fn numeric(&self) -> (Coords<f64>, Coords<f64>) {
        (
            Coords::from_point(&self.first_pos),
            Coords::from_point(&self.second_pos),
        )
    }
}

/// 求交结果
#[derive(Debug, Clone)]
pub struct Solution {
    pub branch: Branch,
    pub expr: PointExpr,
    /// 选中分支的数值交点
    pub numeric: Point2,
    /// 数值交点到目标点的距离
    pub distance: f64,
}

/// 求两条曲线的交点，并按数值位置选出与 `target` 最近的根分支
pub fn solve(
    first: &CurveInput,
    second: &CurveInput,
    target: &Point2,
    tolerance: f64,
) -> Result<Solution, Degeneracy> {
    match (first.kind, second.kind) {
        (CurveKind::Line, CurveKind::Line) => solve_line_line(first, second, target),
        (CurveKind::Line, CurveKind::Arc) => solve_line_arc(first, second, target, tolerance),
        (CurveKind::Arc, CurveKind::Line) => solve_line_arc(second, first, target, tolerance),
        (CurveKind::Arc, CurveKind::Arc) => solve_arc_arc(first, second, target, tolerance),
    }
}

fn solve_line_line(
    l1: &CurveInput,
    l2: &CurveInput,
    target: &Point2,
) -> Result<Solution, Degeneracy> {
    let (a, b) = l1.numeric();
    let (c, d) = l2.numeric();
    let len1 = (l1.second_pos - l1.first_pos).norm();
    let len2 = (l2.second_pos - l2.first_pos).norm();
    if len1 <= EPSILON || len2 <= EPSILON {
        return Err(Degeneracy::DegenerateCurve);
    }
    let det = line_line_determinant(&a, &b, &c, &d);
    if det.abs() <= EPSILON * len1 * len2 {
        return Err(Degeneracy::Parallel);
    }

    let numeric = line_line(&a, &b, &c, &d).to_point();
    let expr = line_line(&l1.first, &l1.second, &l2.first, &l2.second);
    Ok(Solution {
        branch: Branch::Unique,
        expr,
        numeric,
        distance: (numeric - target).norm(),
    })
}

fn solve_line_arc(
    line: &CurveInput,
    arc: &CurveInput,
    target: &Point2,
    tolerance: f64,
) -> Result<Solution, Degeneracy> {
    let (p1, p2) = line.numeric();
    let (centre, edge) = arc.numeric();

    let dir = line.second_pos - line.first_pos;
    let len = dir.norm();
    if len <= EPSILON {
        return Err(Degeneracy::DegenerateCurve);
    }
    let radius = (arc.second_pos - arc.first_pos).norm();
    let offset = arc.first_pos - line.first_pos;
    let distance = (cross(&dir, &offset) / len).abs();
    if distance - radius > tolerance.max(tolerance * radius) {
        return Err(Degeneracy::NoRealIntersection);
    }

    let numeric = line_arc(&p1, &p2, &centre, &edge).map(|c| c.to_point());
    let branch = closest_branch(&numeric, target);
    let [plus, minus] = line_arc(&line.first, &line.second, &arc.first, &arc.second);
    Ok(pick(branch, &numeric, [plus, minus], target))
}

fn solve_arc_arc(
    a1: &CurveInput,
    a2: &CurveInput,
    target: &Point2,
    tolerance: f64,
) -> Result<Solution, Degeneracy> {
    let (c1, e1) = a1.numeric();
    let (c2, e2) = a2.numeric();

    let d = (a2.first_pos - a1.first_pos).norm();
    if d <= EPSILON {
        return Err(Degeneracy::CoincidentCentres);
    }
    let r1 = (a1.second_pos - a1.first_pos).norm();
    let r2 = (a2.second_pos - a2.first_pos).norm();
    let slack = tolerance.max(tolerance * r1.max(r2));
    if d > r1 + r2 + slack || d < (r1 - r2).abs() - slack {
        return Err(Degeneracy::NoRealIntersection);
    }

    let numeric = arc_arc(&c1, &e1, &c2, &e2).map(|c| c.to_point());
    let branch = closest_branch(&numeric, target);
    let symbolic = arc_arc(&a1.first, &a1.second, &a2.first, &a2.second);
    Ok(pick(branch, &numeric, symbolic, target))
}

/// 与目标点最近的分支，距离相等时取第一个（`+`）分支
pub fn closest_branch(candidates: &[Point2; 2], target: &Point2) -> Branch {
    let d_plus = (candidates[0] - target).norm();
    let d_minus = (candidates[1] - target).norm();
    if d_minus < d_plus - EPSILON {
        Branch::Minus
    } else {
        Branch::Plus
    }
}

fn pick(
    branch: Branch,
    numeric: &[Point2; 2],
    symbolic: [PointExpr; 2],
    target: &Point2,
) -> Solution {
    let index = branch.index();
    let [plus, minus] = symbolic;
    let expr = if index == 0 { plus } else { minus };
    Solution {
        branch,
        expr,
        numeric: numeric[index],
        distance: (numeric[index] - target).norm(),
    }
}
