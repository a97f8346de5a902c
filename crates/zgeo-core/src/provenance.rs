//! 溯源图
//!
//! 每个构造点一条记录，按点ID存放在有序表中。记录保存两条父曲线、
//! 选中的根分支、符号表达式和化简缓存。
//!
//! 表达式按需递归解析：端点若是构造点则先解析端点，
//! 解析过程中维护"正在解析"集合，重入即为循环。
//!
//! 解析成功的表达式先化为范式再存入记录，后代引用的是紧凑形式，
//! 表达式规模不会随作图深度指数增长。

use crate::algebra::{self, Branch, CurveInput, Degeneracy, PointExpr};
use crate::config::EngineConfig;
use crate::curve::{CurveHandle, CurveRegistry};
use crate::error::ProvenanceError;
use crate::expr::Expr;
use crate::membership::{ParentPair, ProvenanceKind};
use crate::normal_form;
use crate::point_store::{PointId, PointStore};
use crate::simplify::SimplifiedExpr;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, warn};

/// 记录的解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 尚未计算表达式
    Pending,
    Resolved,
    /// 父曲线重合，交点不唯一
    Collinear,
    /// 父曲线在当前数值位置下没有实交点
    NoRealIntersection,
    /// 表达式超出节点上限
    Unavailable,
    /// 解析失败（例如循环依赖）
    Failed,
}

/// 溯源记录
#[derive(Debug, Clone)]
pub struct ProvenanceRecord {
    pub point: PointId,
    pub parents: [CurveHandle; 2],
    pub kind: ProvenanceKind,
    /// 创建该点的动作序号
    pub action: usize,
    pub branch: Option<Branch>,
    pub expr: Option<PointExpr>,
    pub status: Resolution,
    /// 化简缓存
    pub simplified: Option<SimplifiedExpr>,
    /// 是否在当前批次中等待计算表达式
    pub flagged: bool,
}

impl ProvenanceRecord {
    pub fn new(point: PointId, pair: ParentPair, action: usize) -> Self {
        Self {
            point,
            parents: [pair.first, pair.second],
            kind: pair.kind,
            action,
            branch: None,
            expr: None,
            status: Resolution::Pending,
            simplified: None,
            flagged: true,
        }
    }

    /// 形如 `point 5 = line(0,1) ∩ arc(2,3)` 的描述
    pub fn describe(&self) -> String {
        let mut text = format!(
            "point {} = {} ∩ {}",
            self.point, self.parents[0], self.parents[1]
        );
        match self.kind {
            ProvenanceKind::Collinear => text.push_str(" [collinear]"),
            ProvenanceKind::Concentric => text.push_str(" [concentric]"),
            ProvenanceKind::Intersection => {}
        }
        text
    }

    /// 表达式是否可供后代引用
    pub fn is_available(&self) -> bool {
        self.status == Resolution::Resolved && self.expr.is_some()
    }

}

/// 溯源图
#[derive(Debug, Clone, Default)]
pub struct ProvenanceGraph {
    records: BTreeMap<PointId, ProvenanceRecord>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入记录，返回被替换的旧记录
    ///
    /// 公理点永远没有溯源记录；两条父曲线必须不同。
    pub fn insert(
        &mut self,
        record: ProvenanceRecord,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceError> {
        if record.point.is_axiomatic() {
            return Err(ProvenanceError::AxiomaticPoint(record.point));
        }
        if record.parents[0] == record.parents[1] {
            return Err(ProvenanceError::Unresolvable(record.point));
        }
        Ok(self.records.insert(record.point, record))
    }

    pub fn get(&self, point: PointId) -> Option<&ProvenanceRecord> {
        self.records.get(&point)
    }

    pub fn get_mut(&mut self, point: PointId) -> Option<&mut ProvenanceRecord> {
        self.records.get_mut(&point)
    }

    pub fn contains(&self, point: PointId) -> bool {
        self.records.contains_key(&point)
    }

    pub fn remove(&mut self, point: PointId) -> Option<ProvenanceRecord> {
        self.records.remove(&point)
    }

    /// 按点ID升序遍历
    pub fn records(&self) -> impl Iterator<Item = &ProvenanceRecord> {
        self.records.values()
    }

    pub fn points(&self) -> Vec<PointId> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 等待计算表达式的点
    pub fn flagged(&self) -> Vec<PointId> {
        self.records
            .values()
            .filter(|r| r.flagged)
            .map(|r| r.point)
            .collect()
    }

    /// 删除某个动作（及其之后的动作）创建的记录
    pub fn remove_action(&mut self, action: usize) -> Vec<PointId> {
        let doomed: Vec<PointId> = self
            .records
            .values()
            .filter(|r| r.action >= action)
            .map(|r| r.point)
            .collect();
        for point in &doomed {
            self.records.remove(point);
        }
        doomed
    }

    /// 删除引用了未注册曲线的记录
    pub fn prune(&mut self, curves: &CurveRegistry) -> Vec<PointId> {
        let dangling: Vec<PointId> = self
            .records
            .values()
            .filter(|r| r.parents.iter().any(|h| !curves.contains(h)))
            .map(|r| r.point)
            .collect();
        for point in &dangling {
            debug!("Pruning record of point {} with dangling parent", point);
            self.records.remove(point);
        }
        dangling
    }

    /// 结构校验：记录的点存在，父曲线已注册且互不相同，公理点没有记录
    pub fn validate<S: PointStore + ?Sized>(
        &self,
        curves: &CurveRegistry,
        store: &S,
    ) -> Result<(), ProvenanceError> {
        for record in self.records.values() {
            if record.point.is_axiomatic() {
                return Err(ProvenanceError::AxiomaticPoint(record.point));
            }
            if !store.contains(record.point) {
                return Err(ProvenanceError::HistoryDesync(format!(
                    "record for missing point {}",
                    record.point
                )));
            }
            if record.parents[0] == record.parents[1] {
                return Err(ProvenanceError::HistoryDesync(format!(
                    "point {} has identical parents",
                    record.point
                )));
            }
            if let Some(handle) = record.parents.iter().find(|h| !curves.contains(h)) {
                return Err(ProvenanceError::UnknownCurve(*handle));
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// 递归表达式解析器
pub struct Resolver<'a, S: PointStore + ?Sized> {
    graph: &'a mut ProvenanceGraph,
    store: &'a S,
    tolerance: f64,
    max_nodes: usize,
    visiting: BTreeSet<PointId>,
}

impl<'a, S: PointStore + ?Sized> Resolver<'a, S> {
    pub fn new(graph: &'a mut ProvenanceGraph, store: &'a S, config: &EngineConfig) -> Self {
        Self {
            graph,
            store,
            tolerance: config.tolerance,
            max_nodes: config.max_expr_nodes,
            visiting: BTreeSet::new(),
        }
    }

    /// 解析全部排队中的记录，按点ID升序，返回失败点的诊断
    pub fn resolve_all(&mut self) -> Vec<ProvenanceError> {
        self.graph
            .flagged()
            .into_iter()
            .filter_map(|p| self.resolve(p).err())
            .collect()
    }

    /// 点的符号坐标
    ///
    /// - 公理点：精确常量
    /// - 没有记录的点（来源未知）或记录不可用的点：自由符号
    /// - 已解析的点：缓存的表达式
    /// - 待解析的点：按两条父曲线求交
    pub fn resolve(&mut self, point: PointId) -> Result<PointExpr, ProvenanceError> {
        if let Some(expr) = PointExpr::axiom(point) {
            return Ok(expr);
        }
        let Some(record) = self.graph.get(point) else {
            return Ok(PointExpr::placeholder(point));
        };
        match record.status {
            Resolution::Resolved => {
                if let Some(expr) = &record.expr {
                    return Ok(expr.clone());
                }
            }
            Resolution::Pending => {}
            _ => return Ok(PointExpr::placeholder(point)),
        }

        if !self.visiting.insert(point) {
            error!("Cycle detected while resolving point {}", point);
            return Err(ProvenanceError::Cycle(point));
        }
        let result = self.compute(point);
        self.visiting.remove(&point);

        if let Err(e) = &result {
            let status = match e {
                ProvenanceError::Degenerate { .. } => Resolution::Collinear,
                ProvenanceError::NoRealIntersection { .. } => Resolution::NoRealIntersection,
                ProvenanceError::ExpressionTooLarge { .. } => Resolution::Unavailable,
                _ => Resolution::Failed,
            };
            if let Some(record) = self.graph.get_mut(point) {
                record.status = status;
                record.flagged = false;
            }
            match e {
                ProvenanceError::Cycle(_) => error!("Point {} failed: {}", point, e),
                _ => warn!("Point {} has no expression: {}", point, e),
            }
        }
        result
    }

    /// 曲线定义点的表达式，不可用时退化为自由符号
    fn endpoint(&mut self, point: PointId) -> Result<PointExpr, ProvenanceError> {
        match self.resolve(point) {
            Ok(expr) => Ok(expr),
            Err(e @ ProvenanceError::Cycle(_)) => Err(e),
            Err(_) => Ok(PointExpr::placeholder(point)),
        }
    }

    fn curve_input(&mut self, handle: &CurveHandle) -> Result<CurveInput, ProvenanceError> {
        let first = self.endpoint(handle.first)?;
        let second = self.endpoint(handle.second)?;
        let first_pos = self
            .store
            .position(handle.first)
            .ok_or(ProvenanceError::UnknownPoint(handle.first))?;
        let second_pos = self
            .store
            .position(handle.second)
            .ok_or(ProvenanceError::UnknownPoint(handle.second))?;
        Ok(CurveInput {
            kind: handle.kind,
            first,
            second,
            first_pos,
            second_pos,
        })
    }

    fn compute(&mut self, point: PointId) -> Result<PointExpr, ProvenanceError> {
        let (parents, kind) = {
            let record = self
                .graph
                .get(point)
                .ok_or(ProvenanceError::UnknownPoint(point))?;
            (record.parents, record.kind)
        };
        let [first, second] = parents;
        if kind.is_degenerate() {
            return Err(ProvenanceError::Degenerate {
                point,
                first,
                second,
            });
        }

        let target = self
            .store
            .position(point)
            .ok_or(ProvenanceError::UnknownPoint(point))?;
        let a = self.curve_input(&first)?;
        let b = self.curve_input(&second)?;

        let solution = algebra::solve(&a, &b, &target, self.tolerance).map_err(|d| match d {
            Degeneracy::Parallel => ProvenanceError::Degenerate {
                point,
                first,
                second,
            },
            Degeneracy::NoRealIntersection
            | Degeneracy::CoincidentCentres
            | Degeneracy::DegenerateCurve => ProvenanceError::NoRealIntersection {
                point,
                first,
                second,
            },
        })?;

        if solution.distance > self.tolerance.max(self.tolerance * target.coords.norm()) {
            warn!(
                "Point {} is {:.3e} away from the nearest root of {} ∩ {}",
                point, solution.distance, first, second
            );
        }
        debug!("point {} takes {:?} branch", point, solution.branch);

        let expr = canonical(solution.expr);
        let record = self
            .graph
            .get_mut(point)
            .ok_or(ProvenanceError::UnknownPoint(point))?;
        record.branch = Some(solution.branch);
        if expr.size_within(self.max_nodes).is_none() {
            return Err(ProvenanceError::ExpressionTooLarge {
                point,
                limit: self.max_nodes,
            });
        }
        record.expr = Some(expr.clone());
        record.status = Resolution::Resolved;
        record.flagged = false;
        Ok(expr)
    }
}

/// 坐标化为范式；化简失败（例如溢出）的坐标保持原样
fn canonical(expr: PointExpr) -> PointExpr {
    let reduce = |e: Expr| match normal_form::normalize(&e) {
        Ok(poly) => poly.to_expr(),
        Err(err) => {
            debug!("Keeping raw expression: {}", err);
            e
        }
    };
    PointExpr::new(reduce(expr.x), reduce(expr.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveHandle;
    use crate::math::{Rational, EPSILON};
    use crate::point_store::MemoryPointStore;

    fn pair(first: CurveHandle, second: CurveHandle) -> ParentPair {
        ParentPair {
            first,
            second,
            kind: ProvenanceKind::Intersection,
        }
    }

    /// 两个单位圆 + 过原点和单位点的直线
    fn unit_circles() -> (MemoryPointStore, CurveRegistry, PointId, PointId) {
        let mut store = MemoryPointStore::with_axioms();
        let h = 3f64.sqrt() / 2.0;
        let top = store.add(0.5, h);
        let bottom = store.add(0.5, -h);
        let mut curves = CurveRegistry::new();
        curves.register(CurveHandle::arc(PointId::ORIGIN, PointId::UNIT), 1);
        curves.register(CurveHandle::arc(PointId::UNIT, PointId::ORIGIN), 2);
        (store, curves, top, bottom)
    }

    #[test]
    fn test_axiomatic_point_rejected() {
        let mut graph = ProvenanceGraph::new();
        let record = ProvenanceRecord::new(
            PointId::UNIT,
            pair(
                CurveHandle::line(PointId(0), PointId(1)),
                CurveHandle::arc(PointId(0), PointId(1)),
            ),
            1,
        );
        assert_eq!(
            graph.insert(record).unwrap_err(),
            ProvenanceError::AxiomaticPoint(PointId::UNIT)
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_describe() {
        let record = ProvenanceRecord::new(
            PointId(5),
            pair(
                CurveHandle::line(PointId(1), PointId(0)),
                CurveHandle::arc(PointId(2), PointId(3)),
            ),
            3,
        );
        assert_eq!(record.describe(), "point 5 = line(0,1) ∩ arc(2,3)");
    }

    #[test]
    fn test_resolve_unit_circle_roots() {
        let (store, curves, top, bottom) = unit_circles();
        let handles = curves.all_handles();
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(top, pair(handles[0], handles[1]), 2))
            .unwrap();
        graph
            .insert(ProvenanceRecord::new(bottom, pair(handles[0], handles[1]), 2))
            .unwrap();

        let config = EngineConfig::default();
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        assert!(resolver.resolve_all().is_empty());
        assert!(graph.flagged().is_empty());

        let up = graph.get(top).unwrap();
        assert_eq!(up.branch, Some(Branch::Plus));
        assert_eq!(up.status, Resolution::Resolved);
        assert!(!up.flagged);
        let expr = up.expr.as_ref().unwrap();
        assert_eq!(expr.x, Expr::Const(Rational::new(1, 2).unwrap()));
        let y = expr.y.eval(&|_| None).unwrap();
        assert!((y - 3f64.sqrt() / 2.0).abs() < EPSILON);

        assert_eq!(graph.get(bottom).unwrap().branch, Some(Branch::Minus));
    }

    #[test]
    fn test_resolved_expression_is_stored_in_normal_form() {
        let (store, curves, top, _) = unit_circles();
        let handles = curves.all_handles();
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(top, pair(handles[0], handles[1]), 2))
            .unwrap();

        let config = EngineConfig::default();
        let expr = Resolver::new(&mut graph, &store, &config)
            .resolve(top)
            .unwrap();
        assert_eq!(expr.y.to_string(), "sqrt(3)/2");
        assert_eq!(graph.get(top).unwrap().expr.as_ref(), Some(&expr));
    }

    #[test]
    fn test_expression_over_budget_is_unavailable() {
        let (store, curves, top, _) = unit_circles();
        let handles = curves.all_handles();
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(top, pair(handles[0], handles[1]), 2))
            .unwrap();

        let config = EngineConfig {
            max_expr_nodes: 3,
            ..Default::default()
        };
        let failures = Resolver::new(&mut graph, &store, &config).resolve_all();
        assert_eq!(
            failures,
            vec![ProvenanceError::ExpressionTooLarge {
                point: top,
                limit: 3
            }]
        );
        let record = graph.get(top).unwrap();
        assert_eq!(record.status, Resolution::Unavailable);
        assert_eq!(record.branch, Some(Branch::Plus));
        assert!(record.expr.is_none());
        assert!(!record.flagged);

        // 后代以自由符号引用该点
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        assert_eq!(resolver.resolve(top).unwrap(), PointExpr::placeholder(top));
    }

    #[test]
    fn test_unknown_ancestor_becomes_symbol() {
        let mut store = MemoryPointStore::with_axioms();
        // 点 2 来源未知
        let free = store.add(0.0, 1.0);
        let p = store.add(0.0, 2.0);
        let mut curves = CurveRegistry::new();
        let vertical = CurveHandle::line(PointId::ORIGIN, free);
        let arc = CurveHandle::arc(free, PointId::ORIGIN);
        curves.register(vertical, 1);
        curves.register(arc, 2);

        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(p, pair(vertical, arc), 2))
            .unwrap();

        let config = EngineConfig::default();
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        let expr = resolver.resolve(p).unwrap();
        assert!(expr.x.symbols().contains("x2"));
        assert!(expr.y.symbols().contains("y2"));
        let value = expr
            .eval(&|name| match name {
                "x2" => Some(0.0),
                "y2" => Some(1.0),
                _ => None,
            })
            .unwrap();
        assert!((value.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_marks_point_failed() {
        let mut store = MemoryPointStore::with_axioms();
        let a = store.add(2.0, 0.0);
        let b = store.add(0.0, 2.0);
        let mut graph = ProvenanceGraph::new();
        // a 依赖以 b 为端点的曲线，b 又依赖以 a 为端点的曲线
        graph
            .insert(ProvenanceRecord::new(
                a,
                pair(
                    CurveHandle::line(PointId::ORIGIN, PointId::UNIT),
                    CurveHandle::arc(b, PointId::ORIGIN),
                ),
                1,
            ))
            .unwrap();
        graph
            .insert(ProvenanceRecord::new(
                b,
                pair(
                    CurveHandle::line(PointId::ORIGIN, PointId::UNIT),
                    CurveHandle::arc(a, PointId::ORIGIN),
                ),
                1,
            ))
            .unwrap();

        let config = EngineConfig::default();
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        assert!(matches!(resolver.resolve(a), Err(ProvenanceError::Cycle(_))));
        assert_eq!(graph.get(a).unwrap().status, Resolution::Failed);
        assert_eq!(graph.get(b).unwrap().status, Resolution::Failed);

        // 失败的点之后以自由符号参与计算，不再重复报错
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        assert_eq!(resolver.resolve(a).unwrap(), PointExpr::placeholder(a));
    }

    #[test]
    fn test_collinear_record_is_not_solved() {
        let mut store = MemoryPointStore::with_axioms();
        let far = store.add(2.0, 0.0);
        let mid = store.add(3.0, 0.0);
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(
                mid,
                ParentPair {
                    first: CurveHandle::line(PointId::ORIGIN, PointId::UNIT),
                    second: CurveHandle::line(PointId::UNIT, far),
                    kind: ProvenanceKind::Collinear,
                },
                1,
            ))
            .unwrap();

        let config = EngineConfig::default();
        let mut resolver = Resolver::new(&mut graph, &store, &config);
        assert!(matches!(
            resolver.resolve(mid),
            Err(ProvenanceError::Degenerate { .. })
        ));
        let record = graph.get(mid).unwrap();
        assert_eq!(record.status, Resolution::Collinear);
        assert!(record.describe().ends_with("[collinear]"));
    }

    #[test]
    fn test_prune_and_validate() {
        let (store, mut curves, top, _) = unit_circles();
        let handles = curves.all_handles();
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(top, pair(handles[0], handles[1]), 2))
            .unwrap();
        assert!(graph.validate(&curves, &store).is_ok());

        curves.remove(&handles[1]);
        assert_eq!(
            graph.validate(&curves, &store).unwrap_err(),
            ProvenanceError::UnknownCurve(handles[1])
        );
        assert_eq!(graph.prune(&curves), vec![top]);
        assert!(graph.validate(&curves, &store).is_ok());
    }

    #[test]
    fn test_remove_action() {
        let (_, curves, top, bottom) = unit_circles();
        let handles = curves.all_handles();
        let mut graph = ProvenanceGraph::new();
        graph
            .insert(ProvenanceRecord::new(top, pair(handles[0], handles[1]), 2))
            .unwrap();
        graph
            .insert(ProvenanceRecord::new(bottom, pair(handles[0], handles[1]), 3))
            .unwrap();
        assert_eq!(graph.remove_action(3), vec![bottom]);
        assert!(graph.contains(top));
    }
}
