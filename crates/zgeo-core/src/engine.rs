//! 作图溯源引擎
//!
//! 引擎拥有全部注册表（曲线、溯源图、历史、活动日志），每个会话一个实例。
//! 所有操作都是同步的，按提交顺序逐个处理动作。
//!
//! 点的数值坐标始终由外部点存储提供，引擎只观察：
//! 提交前后的点快照之差就是动作新建的点。

use crate::action::{Action, ActionLog};
use crate::activity::ActivityLog;
use crate::algebra::PointExpr;
use crate::config::EngineConfig;
use crate::curve::{CurveHandle, CurveRegistry};
use crate::error::{LogError, ProvenanceError};
use crate::history::{CommittedAction, History};
use crate::membership::Classifier;
use crate::normal_form::NormalFormBackend;
use crate::point_store::{self, PointId, PointSnapshot, PointStore};
use crate::provenance::{ProvenanceGraph, ProvenanceRecord, Resolver};
use crate::report::{
    CommitReport, ConstructionReport, CurveReport, Diagnostic, Origin, PointReport, ReplayReport,
    UndoReport,
};
use crate::simplify::{AlgebraBackend, SimplifiedExpr, Simplifier};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// 作图溯源引擎
#[derive(Debug)]
pub struct ConstructionEngine {
    config: EngineConfig,
    curves: CurveRegistry,
    graph: ProvenanceGraph,
    history: History,
    activity: ActivityLog,
    simplifier: Simplifier,
    /// 最近一次观察到的点集合
    known: PointSnapshot,
}

fn axioms_only() -> PointSnapshot {
    PointSnapshot::from_ids([PointId::ORIGIN, PointId::UNIT])
}

impl ConstructionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(config, Box::new(NormalFormBackend))
    }

    /// 使用指定的代数后端
    pub fn with_backend(config: EngineConfig, backend: Box<dyn AlgebraBackend>) -> Self {
        let activity = ActivityLog::new(config.max_log_entries);
        Self {
            config,
            curves: CurveRegistry::new(),
            graph: ProvenanceGraph::new(),
            history: History::new(),
            activity,
            simplifier: Simplifier::new(backend),
            known: axioms_only(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn curves(&self) -> &CurveRegistry {
        &self.curves
    }

    pub fn graph(&self) -> &ProvenanceGraph {
        &self.graph
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn record(&self, point: PointId) -> Option<&ProvenanceRecord> {
        self.graph.get(point)
    }

    /// 提交一个动作
    ///
    /// `before` 是外部引擎执行动作之前的点快照，`store` 是执行之后的状态。
    /// 提交会清空重做历史。
    pub fn commit<S: PointStore + ?Sized>(
        &mut self,
        action: Action,
        before: &PointSnapshot,
        store: &S,
    ) -> CommitReport {
        let after = PointSnapshot::capture(store);
        let created = created_points(&action, before, &after, store);
        let (report, committed) = self.apply(action, created, store);
        self.history.push(committed);
        self.known = after;
        report
    }

    /// 撤销最近的动作
    ///
    /// `store` 是外部引擎撤销之后的状态。
    pub fn undo<S: PointStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<UndoReport, ProvenanceError> {
        let entry = self
            .history
            .undo()
            .cloned()
            .ok_or(ProvenanceError::NothingToUndo)?;

        let mut removed_curves = Vec::new();
        for handle in &entry.curves {
            if self.curves.remove(handle).is_some() {
                removed_curves.push(*handle);
            }
        }

        let mut removed_points = self.graph.remove_action(entry.index);
        let now = PointSnapshot::capture(store);
        for point in point_store::removed(&self.known, &now) {
            if self.graph.remove(point).is_some() {
                removed_points.push(point);
            }
        }
        let pruned = self.graph.prune(&self.curves);

        let mut replayed = false;
        if let Err(e) = self.graph.validate(&self.curves, store) {
            error!("History desync after undoing action {}: {}", entry.index, e);
            let actions: Vec<Action> = self
                .history
                .done()
                .iter()
                .map(CommittedAction::replayable)
                .collect();
            self.rebuild(&actions, store);
            replayed = true;
        }

        self.activity.remove_action(entry.index);
        self.known = now;
        info!(
            "Undid action {} ({} curves, {} points removed)",
            entry.index,
            removed_curves.len(),
            removed_points.len()
        );
        Ok(UndoReport {
            action: entry.index,
            removed_curves,
            removed_points,
            pruned,
            replayed,
        })
    }

    /// 重做最近撤销的动作
    ///
    /// `store` 是外部引擎重做之后的状态，新建点按与撤销后快照的差计算。
    pub fn redo<S: PointStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<CommitReport, ProvenanceError> {
        let action = self
            .history
            .peek_redo()
            .map(|c| c.action.clone())
            .ok_or(ProvenanceError::NothingToRedo)?;
        let after = PointSnapshot::capture(store);
        let created = created_points(&action, &self.known, &after, store);
        let (report, committed) = self.apply(action, created, store);
        if !self.history.redo(committed) {
            return Err(ProvenanceError::HistoryDesync(
                "redo stack changed during redo".to_string(),
            ));
        }
        self.known = after;
        Ok(report)
    }

    /// 清空全部状态后按顺序重新提交每个动作
    ///
    /// 重放时点存储已经处于最终状态，没有列出新建点的动作按几何关系推断。
    pub fn replay<S: PointStore + ?Sized>(&mut self, actions: &[Action], store: &S) -> ReplayReport {
        self.history.clear();
        let report = self.rebuild(actions, store);
        info!(
            "Replayed {} actions, {} provenance records",
            actions.len(),
            self.graph.len()
        );
        report
    }

    /// 从动作日志重放
    pub fn replay_log<S: PointStore + ?Sized>(
        &mut self,
        log: &ActionLog,
        store: &S,
    ) -> Result<ReplayReport, LogError> {
        let actions = log.actions()?;
        Ok(self.replay(&actions, store))
    }

    /// 回到初始状态：没有曲线、没有记录，只有两个公理点
    pub fn reset(&mut self) {
        self.curves.clear();
        self.graph.clear();
        self.history.clear();
        self.activity.clear();
        self.known = axioms_only();
        info!("Engine reset");
    }

    /// 重建已提交部分，保留重做历史
    fn rebuild<S: PointStore + ?Sized>(&mut self, actions: &[Action], store: &S) -> ReplayReport {
        self.curves.clear();
        self.graph.clear();
        self.activity.clear();
        self.history.rebase(Vec::new());

        let explicit: BTreeSet<PointId> = actions
            .iter()
            .filter_map(|a| a.created.as_ref())
            .flatten()
            .copied()
            .collect();
        let mut unassigned: BTreeSet<PointId> = store
            .ids()
            .into_iter()
            .filter(|p| !p.is_axiomatic() && !explicit.contains(p))
            .collect();

        let mut commits = Vec::with_capacity(actions.len());
        for action in actions {
            let created = match &action.created {
                Some(ids) => ids.iter().copied().filter(|&id| store.contains(id)).collect(),
                None => self.attribute(action, &mut unassigned, store),
            };
            let (report, committed) = self.apply(action.clone(), created, store);
            self.history.push_done(committed);
            commits.push(report);
        }

        if !unassigned.is_empty() {
            warn!("{} points not attributed to any action", unassigned.len());
        }
        self.known = PointSnapshot::capture(store);
        ReplayReport {
            commits,
            unattributed: unassigned.into_iter().collect(),
        }
    }

    /// 推断动作新建的点
    ///
    /// 尚未归属的点若位于本动作新画的曲线上，并且同时位于另一条已知曲线上，
    /// 就归属于本动作。
    fn attribute<S: PointStore + ?Sized>(
        &self,
        action: &Action,
        unassigned: &mut BTreeSet<PointId>,
        store: &S,
    ) -> Vec<PointId> {
        let fresh: Vec<CurveHandle> = action
            .handles()
            .into_iter()
            .filter(|h| !self.curves.contains(h))
            .collect();
        if fresh.is_empty() {
            return Vec::new();
        }
        let mut all = self.curves.all_handles();
        all.extend(fresh.iter().copied());

        let classifier = Classifier::new(store, &self.config);
        let claimed: Vec<PointId> = unassigned
            .iter()
            .copied()
            .filter(|&p| {
                let Some(pos) = store.position(p) else {
                    return false;
                };
                let on = |h: &&CurveHandle| !h.depends_on(p) && classifier.on_curve(&pos, h);
                fresh.iter().any(|h| on(&h)) && all.iter().filter(on).count() >= 2
            })
            .collect();
        for p in &claimed {
            unassigned.remove(p);
        }
        claimed
    }

    /// 注册曲线、分类新点、计算表达式
    fn apply<S: PointStore + ?Sized>(
        &mut self,
        action: Action,
        created: Vec<PointId>,
        store: &S,
    ) -> (CommitReport, CommittedAction) {
        let index = self.history.next_index();

        let mut owned = Vec::new();
        for handle in action.handles() {
            if self.curves.register(handle, index) {
                owned.push(handle);
            }
        }

        let created: Vec<PointId> = created.into_iter().filter(|p| !p.is_axiomatic()).collect();
        let candidates: Vec<CurveHandle> = self
            .curves
            .up_to_action(index)
            .into_iter()
            .map(|c| c.handle)
            .collect();

        let mut diagnostics = Vec::new();
        let mut recorded = Vec::new();
        let mut unknown_origin = Vec::new();
        for &point in &created {
            let usable: Vec<CurveHandle> = candidates
                .iter()
                .copied()
                .filter(|h| !h.depends_on(point))
                .collect();
            let outcome = Classifier::new(store, &self.config)
                .describe_intersection(point, &usable)
                .and_then(|pair| {
                    self.graph
                        .insert(ProvenanceRecord::new(point, pair, index))
                        .map(|_| ())
                });
            match outcome {
                Ok(()) => recorded.push(point),
                Err(e) => {
                    warn!("Point {} has unknown origin: {}", point, e);
                    diagnostics.push(Diagnostic::from(&e));
                    unknown_origin.push(point);
                }
            }
        }

        let failures = Resolver::new(&mut self.graph, store, &self.config).resolve_all();
        diagnostics.extend(failures.iter().map(Diagnostic::from));

        if self.config.simplify_on_commit {
            for &point in &recorded {
                self.simplified(point, false);
            }
        }

        self.activity.record_action(index, &action, store);
        for &point in &created {
            let description = self.describe(point);
            debug!("{}", description);
            self.activity.record_point(index, description);
        }

        info!(
            "Committed action {} ({} new curves, {} new points)",
            index,
            owned.len(),
            created.len()
        );
        let report = CommitReport {
            action: index,
            curves: owned.clone(),
            created: created.clone(),
            unknown_origin,
            diagnostics,
        };
        let committed = CommittedAction {
            index,
            action,
            created,
            curves: owned,
        };
        (report, committed)
    }

    /// 点的符号坐标（公理点为常量，没有可用表达式时返回 `None`）
    pub fn expression(&self, point: PointId) -> Option<PointExpr> {
        PointExpr::axiom(point).or_else(|| self.graph.get(point)?.expr.clone())
    }

    /// 化简后的坐标，结果缓存在记录中；`force` 时重新计算
    pub fn simplified(&mut self, point: PointId, force: bool) -> Option<SimplifiedExpr> {
        if let Some(expr) = PointExpr::axiom(point) {
            return Some(SimplifiedExpr {
                x: expr.x.to_string(),
                y: expr.y.to_string(),
            });
        }
        let record = self.graph.get_mut(point)?;
        if !force {
            if let Some(cached) = &record.simplified {
                return Some(cached.clone());
            }
        }
        let expr = record.expr.as_ref()?;
        let simplified = self.simplifier.simplify_point(expr);
        record.simplified = Some(simplified.clone());
        Some(simplified)
    }

    /// 化简全部已解析的点
    pub fn simplify_all(&mut self, force: bool) {
        for point in self.graph.points() {
            self.simplified(point, force);
        }
    }

    /// 点的溯源描述
    pub fn describe(&self, point: PointId) -> String {
        if let Some(expr) = PointExpr::axiom(point) {
            return format!("point {} = axiom {}", point, expr);
        }
        match self.graph.get(point) {
            Some(record) => record.describe(),
            None => format!("point {} = unknown origin", point),
        }
    }

    /// 生成整个作图的报告
    ///
    /// 超出节点上限的表达式不渲染，文本报告中显示为 `expression unavailable`。
    pub fn report<S: PointStore + ?Sized>(&self, store: &S) -> ConstructionReport {
        let curves = self
            .curves
            .iter()
            .map(|c| CurveReport {
                handle: c.handle.to_string(),
                kind: c.kind(),
                points: c.handle.points(),
                action: c.action,
            })
            .collect();

        let points = store
            .ids()
            .into_iter()
            .filter_map(|id| {
                let position = store.position(id)?;
                let record = self.graph.get(id);
                let origin = if id.is_axiomatic() {
                    Origin::Axiom
                } else if record.is_some() {
                    Origin::Constructed
                } else {
                    Origin::Unknown
                };
                Some(PointReport {
                    id,
                    x: position.x,
                    y: position.y,
                    origin,
                    description: self.describe(id),
                    parents: record.map(|r| r.parents),
                    kind: record.map(|r| r.kind),
                    status: record.map(|r| r.status),
                    branch: record.and_then(|r| r.branch),
                    expression: self
                        .expression(id)
                        .filter(|e| e.size_within(self.config.max_expr_nodes).is_some())
                        .map(|e| e.to_string()),
                    simplified: record.and_then(|r| r.simplified.clone()),
                })
            })
            .collect();

        ConstructionReport {
            actions: self.history.len(),
            moves: self.activity.move_count(),
            layers: self.activity.layer_count(),
            curves,
            points,
        }
    }
}

impl Default for ConstructionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// 动作新建的点：显式列出的优先，否则取快照之差
fn created_points<S: PointStore + ?Sized>(
    action: &Action,
    before: &PointSnapshot,
    after: &PointSnapshot,
    store: &S,
) -> Vec<PointId> {
    match &action.created {
        Some(ids) => ids.iter().copied().filter(|&id| store.contains(id)).collect(),
        None => point_store::diff(before, after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_store::MemoryPointStore;

    /// 模拟外部引擎：执行动作时把交点加入存储
    fn draw(
        engine: &mut ConstructionEngine,
        store: &mut MemoryPointStore,
        action: Action,
        new_points: &[(f64, f64)],
    ) -> CommitReport {
        let before = PointSnapshot::capture(store);
        for &(x, y) in new_points {
            store.add(x, y);
        }
        engine.commit(action, &before, store)
    }

    #[test]
    fn test_empty_engine() {
        let engine = ConstructionEngine::default();
        assert!(engine.curves().is_empty());
        assert!(engine.graph().is_empty());
        assert_eq!(engine.describe(PointId(0)), "point 0 = axiom (0, 0)");
        assert_eq!(engine.describe(PointId(1)), "point 1 = axiom (1, 0)");
        assert_eq!(engine.describe(PointId(9)), "point 9 = unknown origin");
    }

    #[test]
    fn test_commit_two_circles() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        let h = 3f64.sqrt() / 2.0;

        draw(&mut engine, &mut store, Action::arc(PointId(0), PointId(1)), &[]);
        let report = draw(
            &mut engine,
            &mut store,
            Action::arc(PointId(1), PointId(0)),
            &[(0.5, h), (0.5, -h)],
        );
        assert_eq!(report.action, 2);
        assert_eq!(report.created, vec![PointId(2), PointId(3)]);
        assert!(report.diagnostics.is_empty());
        assert_eq!(engine.describe(PointId(2)), "point 2 = arc(0,1) ∩ arc(1,0)");

        let top = engine.simplified(PointId(2), false).unwrap();
        assert_eq!(top.x, "1/2");
        assert_eq!(top.y, "sqrt(3)/2");
        let bottom = engine.simplified(PointId(3), false).unwrap();
        assert_eq!(bottom.y, "-sqrt(3)/2");
    }

    #[test]
    fn test_unresolvable_point_is_reported() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        let report = draw(
            &mut engine,
            &mut store,
            Action::line(PointId(0), PointId(1)),
            &[(5.0, 5.0)],
        );
        assert_eq!(report.unknown_origin, vec![PointId(2)]);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(engine.record(PointId(2)).is_none());
        assert_eq!(engine.describe(PointId(2)), "point 2 = unknown origin");
    }

    #[test]
    fn test_undo_and_redo() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        let h = 3f64.sqrt() / 2.0;
        draw(&mut engine, &mut store, Action::arc(PointId(0), PointId(1)), &[]);
        draw(
            &mut engine,
            &mut store,
            Action::arc(PointId(1), PointId(0)),
            &[(0.5, h), (0.5, -h)],
        );

        store.remove(PointId(2));
        store.remove(PointId(3));
        let undo = engine.undo(&store).unwrap();
        assert_eq!(undo.action, 2);
        assert_eq!(undo.removed_curves, vec![CurveHandle::arc(PointId(1), PointId(0))]);
        assert!(!undo.replayed);
        assert!(engine.graph().is_empty());
        assert_eq!(engine.curves().len(), 1);
        assert_eq!(engine.activity().move_count(), 1);

        store.add(0.5, h);
        store.add(0.5, -h);
        let redo = engine.redo(&store).unwrap();
        assert_eq!(redo.action, 2);
        assert_eq!(engine.graph().len(), 2);
        assert!(matches!(engine.redo(&store), Err(ProvenanceError::NothingToRedo)));
    }

    #[test]
    fn test_undo_desync_rebuilds_and_keeps_redo() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        let h = 3f64.sqrt() / 2.0;
        draw(&mut engine, &mut store, Action::arc(PointId(0), PointId(1)), &[]);
        draw(
            &mut engine,
            &mut store,
            Action::arc(PointId(1), PointId(0)),
            &[(0.5, h), (0.5, -h)],
        );
        // 外部引擎悄悄删掉了点 3，随后的提交观察不到这次删除
        store.remove(PointId(3));
        draw(&mut engine, &mut store, Action::line(PointId(0), PointId(1)), &[]);
        assert!(engine.record(PointId(3)).is_some());

        let undo = engine.undo(&store).unwrap();
        assert_eq!(undo.action, 3);
        assert!(undo.replayed);
        assert!(engine.graph().validate(engine.curves(), &store).is_ok());
        assert!(engine.record(PointId(2)).is_some());
        assert!(engine.record(PointId(3)).is_none());
        assert_eq!(engine.history().len(), 2);
        assert_eq!(engine.activity().move_count(), 2);

        assert!(engine.history().can_redo());
        assert_eq!(engine.history().peek_redo().map(|c| c.index), Some(3));
        let redo = engine.redo(&store).unwrap();
        assert_eq!(redo.action, 3);
        assert_eq!(engine.curves().len(), 3);
    }

    #[test]
    fn test_nothing_to_undo() {
        let mut engine = ConstructionEngine::default();
        let store = MemoryPointStore::with_axioms();
        assert!(matches!(engine.undo(&store), Err(ProvenanceError::NothingToUndo)));
    }

    #[test]
    fn test_layer_action_owns_no_curves() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        let report = draw(&mut engine, &mut store, Action::new_layer(), &[]);
        assert!(report.curves.is_empty());
        assert_eq!(engine.activity().layer_count(), 1);
        assert_eq!(engine.history().len(), 1);

        engine.undo(&store).unwrap();
        assert_eq!(engine.history().len(), 0);
        assert_eq!(engine.activity().move_count(), 0);
    }

    #[test]
    fn test_reset() {
        let mut engine = ConstructionEngine::default();
        let mut store = MemoryPointStore::with_axioms();
        draw(&mut engine, &mut store, Action::line(PointId(0), PointId(1)), &[]);
        engine.reset();
        assert!(engine.curves().is_empty());
        assert!(engine.history().is_empty());
        assert!(engine.activity().is_empty());
        assert_eq!(engine.activity().move_count(), 0);
    }

    #[test]
    fn test_simplify_on_commit() {
        let config = EngineConfig {
            simplify_on_commit: true,
            ..Default::default()
        };
        let mut engine = ConstructionEngine::new(config);
        let mut store = MemoryPointStore::with_axioms();
        let h = 3f64.sqrt() / 2.0;
        draw(&mut engine, &mut store, Action::arc(PointId(0), PointId(1)), &[]);
        draw(
            &mut engine,
            &mut store,
            Action::arc(PointId(1), PointId(0)),
            &[(0.5, h), (0.5, -h)],
        );
        let record = engine.record(PointId(2)).unwrap();
        assert_eq!(record.simplified.as_ref().map(|s| s.x.as_str()), Some("1/2"));
    }
}
