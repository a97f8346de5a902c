//! 引擎输出的报告结构
//!
//! 全部可序列化，命令行工具直接输出为 JSON。

use crate::algebra::Branch;
use crate::curve::{CurveHandle, CurveKind};
use crate::error::ProvenanceError;
use crate::membership::ProvenanceKind;
use crate::point_store::PointId;
use crate::provenance::Resolution;
use crate::simplify::SimplifiedExpr;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// 不中断批处理的诊断信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub point: Option<PointId>,
    pub message: String,
}

impl From<&ProvenanceError> for Diagnostic {
    fn from(error: &ProvenanceError) -> Self {
        Self {
            point: error.point(),
            message: error.to_string(),
        }
    }
}

/// 一次提交（或重做）的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitReport {
    pub action: usize,
    /// 首次注册的曲线
    pub curves: Vec<CurveHandle>,
    pub created: Vec<PointId>,
    /// 找不到父曲线的新点
    pub unknown_origin: Vec<PointId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 一次撤销的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct UndoReport {
    pub action: usize,
    pub removed_curves: Vec<CurveHandle>,
    pub removed_points: Vec<PointId>,
    pub pruned: Vec<PointId>,
    /// 校验失败后是否通过完整重放恢复
    pub replayed: bool,
}

/// 一次重放的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub commits: Vec<CommitReport>,
    /// 没有归属到任何动作的点
    pub unattributed: Vec<PointId>,
}

impl ReplayReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.commits.iter().flat_map(|c| c.diagnostics.iter())
    }
}

/// 点的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Axiom,
    Constructed,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointReport {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    pub origin: Origin,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<[CurveHandle; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProvenanceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplified: Option<SimplifiedExpr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurveReport {
    pub handle: String,
    pub kind: CurveKind,
    pub points: [PointId; 2],
    pub action: usize,
}

/// 整个作图的溯源报告
#[derive(Debug, Clone, Serialize)]
pub struct ConstructionReport {
    pub actions: usize,
    pub moves: usize,
    pub layers: usize,
    pub curves: Vec<CurveReport>,
    pub points: Vec<PointReport>,
}

impl ConstructionReport {
    /// 文本形式，每行一个曲线或点
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} actions, {} moves, {} layers",
            self.actions, self.moves, self.layers
        );
        for curve in &self.curves {
            let _ = writeln!(out, "{} [action {}]", curve.handle, curve.action);
        }
        for point in &self.points {
            let _ = writeln!(out, "{}", point.description);
            match (&point.simplified, &point.expression) {
                (Some(simplified), _) => {
                    let _ = writeln!(out, "    = {}", simplified);
                }
                (None, Some(expression)) => {
                    let _ = writeln!(out, "    = {}", expression);
                }
                (None, None) if point.origin == Origin::Constructed => {
                    let _ = writeln!(out, "    = expression unavailable");
                }
                (None, None) => {}
            }
        }
        out
    }
}
