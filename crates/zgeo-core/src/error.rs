//! 错误定义

use crate::curve::CurveHandle;
use crate::point_store::PointId;
use thiserror::Error;

/// 溯源引擎错误
///
/// 除 `NothingToUndo` / `NothingToRedo` 外，这些错误都只影响单个点，
/// 以诊断信息的形式随报告返回，不会中断同一批次中其他点的处理。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProvenanceError {
    #[error("No candidate curve pair passes through point {0}")]
    Unresolvable(PointId),

    #[error("Point {point} has no real intersection between {first} and {second}")]
    NoRealIntersection {
        point: PointId,
        first: CurveHandle,
        second: CurveHandle,
    },

    #[error("Point {point} lies on coincident curves {first} and {second}")]
    Degenerate {
        point: PointId,
        first: CurveHandle,
        second: CurveHandle,
    },

    #[error("Expression for point {point} exceeds {limit} nodes")]
    ExpressionTooLarge { point: PointId, limit: usize },

    #[error("Cyclic provenance while resolving point {0}")]
    Cycle(PointId),

    #[error("Axiomatic point {0} cannot have a provenance record")]
    AxiomaticPoint(PointId),

    #[error("Point {0} not found in point store")]
    UnknownPoint(PointId),

    #[error("Curve {0} is not registered")]
    UnknownCurve(CurveHandle),

    #[error("Provenance graph out of sync with history: {0}")]
    HistoryDesync(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

impl ProvenanceError {
    /// 相关的点（如果有）
    pub fn point(&self) -> Option<PointId> {
        match self {
            ProvenanceError::Unresolvable(p)
            | ProvenanceError::Cycle(p)
            | ProvenanceError::AxiomaticPoint(p)
            | ProvenanceError::UnknownPoint(p) => Some(*p),
            ProvenanceError::NoRealIntersection { point, .. }
            | ProvenanceError::Degenerate { point, .. }
            | ProvenanceError::ExpressionTooLarge { point, .. } => Some(*point),
            _ => None,
        }
    }
}

/// 表达式化简错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimplifyError {
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Algebra backend unavailable: {0}")]
    Unavailable(String),
}

/// 作图日志解码错误
#[derive(Error, Debug)]
pub enum LogError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Action boundary {boundary} out of range (log has {len} entries)")]
    BoundaryOutOfRange { boundary: usize, len: usize },

    #[error("Action boundaries are not monotonic at position {0}")]
    NonMonotonicBoundary(usize),
}
