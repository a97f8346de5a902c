//! 点与曲线的隶属判断
//!
//! 新点的父曲线完全由数值判断决定，符号推导从不代替这里的检查。

use crate::config::EngineConfig;
use crate::curve::{CurveHandle, CurveKind};
use crate::error::ProvenanceError;
use crate::math::{cross, Point2};
use crate::point_store::{PointId, PointStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 点到过 `a`、`b` 的无限长直线的距离是否不超过容差
///
/// `a == b` 时直线退化，返回 false。
pub fn point_on_line(p: &Point2, a: &Point2, b: &Point2, tolerance: f64) -> bool {
    let v = b - a;
    let len = v.norm();
    if len <= f64::EPSILON {
        return false;
    }
    let w = p - a;
    (cross(&v, &w) / len).abs() <= tolerance
}

/// 点到圆心的距离与半径之差是否在容差内
///
/// 容差按半径放大：`max(tol, tol * r)`。
pub fn point_on_arc(p: &Point2, centre: &Point2, edge: &Point2, tolerance: f64) -> bool {
    let radius = (edge - centre).norm();
    let tolerance = tolerance.max(tolerance * radius);
    ((p - centre).norm() - radius).abs() <= tolerance
}

/// 溯源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    /// 两条曲线的普通交点
    Intersection,
    /// 两条直线重合，交点不唯一
    Collinear,
    /// 两个圆弧落在同一个圆上
    Concentric,
}

impl ProvenanceKind {
    pub fn is_degenerate(&self) -> bool {
        !matches!(self, ProvenanceKind::Intersection)
    }
}

/// 一个点的两条父曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentPair {
    pub first: CurveHandle,
    pub second: CurveHandle,
    pub kind: ProvenanceKind,
}

/// 隶属分类器
///
/// 从点存储读取实时坐标，按配置的容差判断。
pub struct Classifier<'a, S: PointStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: PointStore + ?Sized> Classifier<'a, S> {
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// 点是否在曲线上，定义点缺失时返回 false
    pub fn on_curve(&self, p: &Point2, handle: &CurveHandle) -> bool {
        let (Some(first), Some(second)) = (
            self.store.position(handle.first),
            self.store.position(handle.second),
        ) else {
            return false;
        };
        match handle.kind {
            CurveKind::Line => point_on_line(p, &first, &second, self.config.tolerance),
            CurveKind::Arc => {
                let radius = (second - first).norm();
                ((p - first).norm() - radius).abs() <= self.config.arc_tolerance(radius)
            }
        }
    }

    /// 在候选曲线中为点找出两条父曲线
    ///
    /// 候选按创建顺序给出，按 (i, j) 字典序检查无序对，第一对同时通过
    /// 隶属判断的曲线对胜出。重合直线或同心圆弧对同样被记录，并标记为退化。
    pub fn describe_intersection(
        &self,
        point: PointId,
        candidates: &[CurveHandle],
    ) -> Result<ParentPair, ProvenanceError> {
        let p = self
            .store
            .position(point)
            .ok_or(ProvenanceError::UnknownPoint(point))?;

        let members: Vec<&CurveHandle> = candidates
            .iter()
            .filter(|h| self.on_curve(&p, h))
            .collect();

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (first, second) = (*members[i], *members[j]);
                if first == second {
                    continue;
                }
                let kind = self.pair_kind(&first, &second);
                debug!("point {} = {} ∩ {} ({:?})", point, first, second, kind);
                return Ok(ParentPair { first, second, kind });
            }
        }

        Err(ProvenanceError::Unresolvable(point))
    }

    /// 判断曲线对是否退化
    fn pair_kind(&self, first: &CurveHandle, second: &CurveHandle) -> ProvenanceKind {
        let positions = (
            self.store.position(first.first),
            self.store.position(first.second),
            self.store.position(second.first),
            self.store.position(second.second),
        );
        let (Some(a1), Some(b1), Some(a2), Some(b2)) = positions else {
            return ProvenanceKind::Intersection;
        };

        match (first.kind, second.kind) {
            (CurveKind::Line, CurveKind::Line) => {
                let d1 = b1 - a1;
                let d2 = b2 - a2;
                // 两条直线都经过该点，平行即重合
                if cross(&d1, &d2).abs() <= self.config.tolerance * d1.norm() * d2.norm() {
                    ProvenanceKind::Collinear
                } else {
                    ProvenanceKind::Intersection
                }
            }
            (CurveKind::Arc, CurveKind::Arc) => {
                let r1 = (b1 - a1).norm();
                let r2 = (b2 - a2).norm();
                let same_centre = (a2 - a1).norm() <= self.config.tolerance;
                if same_centre && (r1 - r2).abs() <= self.config.arc_tolerance(r1) {
                    ProvenanceKind::Concentric
                } else {
                    ProvenanceKind::Intersection
                }
            }
            _ => ProvenanceKind::Intersection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEFAULT_TOLERANCE;
    use crate::point_store::MemoryPointStore;

    #[test]
    fn test_point_on_line() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        assert!(point_on_line(&Point2::new(5.0, 0.0), &a, &b, DEFAULT_TOLERANCE));
        assert!(point_on_line(&Point2::new(0.5, 1e-7), &a, &b, DEFAULT_TOLERANCE));
        assert!(!point_on_line(&Point2::new(0.5, 1e-3), &a, &b, DEFAULT_TOLERANCE));
        // 退化直线
        assert!(!point_on_line(&a, &a, &a, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_point_on_arc() {
        let c = Point2::new(0.0, 0.0);
        let e = Point2::new(1.0, 0.0);
        let p = Point2::new(0.5, 3f64.sqrt() / 2.0);
        assert!(point_on_arc(&p, &c, &e, DEFAULT_TOLERANCE));
        assert!(!point_on_arc(&Point2::new(0.5, 0.5), &c, &e, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_point_on_large_arc_uses_relative_tolerance() {
        let c = Point2::new(0.0, 0.0);
        let e = Point2::new(1.0e4, 0.0);
        // 偏差 5e-3 小于 1e-6 * 1e4 = 1e-2
        let p = Point2::new(0.0, 1.0e4 + 5e-3);
        assert!(point_on_arc(&p, &c, &e, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_describe_intersection_picks_first_pair() {
        let mut store = MemoryPointStore::with_axioms();
        let top = store.add(0.5, 3f64.sqrt() / 2.0);
        let config = EngineConfig::default();
        let classifier = Classifier::new(&store, &config);

        let line = CurveHandle::line(PointId::ORIGIN, PointId::UNIT);
        let c0 = CurveHandle::arc(PointId::ORIGIN, PointId::UNIT);
        let c1 = CurveHandle::arc(PointId::UNIT, PointId::ORIGIN);

        let pair = classifier.describe_intersection(top, &[line, c0, c1]).unwrap();
        assert_eq!(pair.first, c0);
        assert_eq!(pair.second, c1);
        assert_eq!(pair.kind, ProvenanceKind::Intersection);
    }

    #[test]
    fn test_describe_intersection_fails_without_pair() {
        let mut store = MemoryPointStore::with_axioms();
        let stray = store.add(3.0, 3.0);
        let config = EngineConfig::default();
        let classifier = Classifier::new(&store, &config);
        let line = CurveHandle::line(PointId::ORIGIN, PointId::UNIT);

        let err = classifier.describe_intersection(stray, &[line]).unwrap_err();
        assert_eq!(err, ProvenanceError::Unresolvable(stray));
    }

    #[test]
    fn test_first_passing_pair_wins_even_when_collinear() {
        let mut store = MemoryPointStore::with_axioms();
        let far = store.add(2.0, 0.0);
        let mid = store.add(3.0, 0.0);
        let config = EngineConfig::default();
        let classifier = Classifier::new(&store, &config);

        let l1 = CurveHandle::line(PointId::ORIGIN, PointId::UNIT);
        let l2 = CurveHandle::line(PointId::UNIT, far);
        let pair = classifier.describe_intersection(mid, &[l1, l2]).unwrap();
        assert_eq!(pair.kind, ProvenanceKind::Collinear);

        // 重合直线对排在前面时照样胜出
        let arc = CurveHandle::arc(far, PointId::UNIT);
        let pair = classifier.describe_intersection(mid, &[l1, l2, arc]).unwrap();
        assert_eq!(pair.kind, ProvenanceKind::Collinear);
        assert_eq!((pair.first, pair.second), (l1, l2));

        let pair = classifier.describe_intersection(mid, &[l1, arc, l2]).unwrap();
        assert_eq!(pair.kind, ProvenanceKind::Intersection);
        assert_eq!((pair.first, pair.second), (l1, arc));
    }
}
