//! ZGEO 作图溯源引擎
//!
//! 观察一个尺规作图会话：每当作图动作产生新的交点，就找出定义它的两条父曲线，
//! 递归推导出以公理点 (0, 0)、(1, 0) 为基的精确代数坐标，并化简为根式形式。
//!
//! # 架构设计
//!
//! - `point_store`: 外部点存储的只读接口与快照
//! - `curve` / `membership`: 曲线注册表与点在曲线上的判定
//! - `algebra` / `provenance`: 交点公式与递归推导
//! - `expr` / `normal_form` / `simplify`: 符号表达式与化简后端
//! - `action` / `history` / `activity`: 动作日志、撤销重做与活动日志
//! - `engine`: 把以上部分组合成每个会话一个的引擎
//!
//! # 示例
//!
//! ```rust
//! use zgeo_core::prelude::*;
//!
//! let mut engine = ConstructionEngine::default();
//! let mut store = MemoryPointStore::with_axioms();
//!
//! // 以原点为圆心、过单位点画圆
//! let before = PointSnapshot::capture(&store);
//! engine.commit(Action::arc(PointId::ORIGIN, PointId::UNIT), &before, &store);
//!
//! // 以单位点为圆心、过原点画圆，外部引擎加入两个交点
//! let before = PointSnapshot::capture(&store);
//! let h = 3f64.sqrt() / 2.0;
//! let top = store.add(0.5, h);
//! store.add(0.5, -h);
//! engine.commit(Action::arc(PointId::UNIT, PointId::ORIGIN), &before, &store);
//!
//! let coords = engine.simplified(top, false).unwrap();
//! assert_eq!(coords.to_string(), "(1/2, sqrt(3)/2)");
//! ```

pub mod action;
pub mod activity;
pub mod algebra;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod expr;
pub mod expr_parser;
pub mod history;
pub mod math;
pub mod membership;
pub mod normal_form;
pub mod point_store;
pub mod provenance;
pub mod report;
pub mod simplify;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::action::{Action, ActionLog, Change, LogEntry};
    pub use crate::algebra::{Branch, PointExpr};
    pub use crate::config::EngineConfig;
    pub use crate::curve::{CurveHandle, CurveKind, CurveRegistry};
    pub use crate::engine::ConstructionEngine;
    pub use crate::error::{LogError, ProvenanceError, SimplifyError};
    pub use crate::expr::Expr;
    pub use crate::math::{Point2, Rational};
    pub use crate::membership::ProvenanceKind;
    pub use crate::normal_form::NormalFormBackend;
    pub use crate::point_store::{MemoryPointStore, PointId, PointSnapshot, PointStore};
    pub use crate::provenance::{ProvenanceGraph, ProvenanceRecord, Resolution};
    pub use crate::report::{CommitReport, ConstructionReport, ReplayReport, UndoReport};
    pub use crate::simplify::{AlgebraBackend, SimplifiedExpr, Simplifier};
}
