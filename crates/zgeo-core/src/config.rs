//! 引擎配置

use crate::math::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};

/// 溯源引擎参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 点在曲线上的绝对容差
    pub tolerance: f64,

    /// 圆弧容差是否按半径放大（`max(tol, tol * r)`）
    pub relative_tolerance: bool,

    /// 提交动作时是否立即化简新点的表达式
    pub simplify_on_commit: bool,

    /// 作图日志最多保留的条目数
    pub max_log_entries: usize,

    /// 单个坐标表达式展开后的节点上限，超过时该点的表达式不可用
    pub max_expr_nodes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            relative_tolerance: true,
            simplify_on_commit: false,
            max_log_entries: 10_000,
            max_expr_nodes: 4096,
        }
    }
}

impl EngineConfig {
    /// 半径为 `radius` 的圆弧使用的容差
    pub fn arc_tolerance(&self, radius: f64) -> f64 {
        if self.relative_tolerance {
            self.tolerance.max(self.tolerance * radius)
        } else {
            self.tolerance
        }
    }
}
