//! 表达式化简器
//!
//! 化简能力通过 [`AlgebraBackend`] 接入，引擎只和文本打交道：
//! 表达式树在这里渲染为文本交给后端，后端返回化简后的文本。
//! 后端失败时原样返回输入并记录警告，化简失败从不影响溯源结果。

use crate::algebra::PointExpr;
use crate::error::SimplifyError;
use crate::normal_form::NormalFormBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// 计算机代数后端
pub trait AlgebraBackend {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 化简表达式文本
    fn simplify(&self, input: &str) -> Result<String, SimplifyError>;
}

/// 化简后的坐标文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedExpr {
    pub x: String,
    pub y: String,
}

impl fmt::Display for SimplifiedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 化简器
pub struct Simplifier {
    backend: Box<dyn AlgebraBackend>,
}

impl Simplifier {
    pub fn new(backend: Box<dyn AlgebraBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 化简单个表达式文本，失败时返回输入本身
    pub fn simplify(&self, input: &str) -> String {
        match self.backend.simplify(input) {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Simplification by {} failed, keeping unsimplified form: {}",
                    self.backend.name(),
                    e
                );
                input.to_string()
            }
        }
    }

    /// 化简点的两个坐标
    pub fn simplify_point(&self, expr: &PointExpr) -> SimplifiedExpr {
        SimplifiedExpr {
            x: self.simplify(&expr.x.to_string()),
            y: self.simplify(&expr.y.to_string()),
        }
    }
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::new(Box::new(NormalFormBackend))
    }
}

impl fmt::Debug for Simplifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simplifier")
            .field("backend", &self.backend.name())
            .finish()
    }
}
