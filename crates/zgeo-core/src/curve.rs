//! 曲线注册表
//!
//! 作图中只有两种曲线：
//! - 直线 (Line)：由两个端点确定
//! - 圆弧 (Arc)：由圆心和圆上一点确定，半径为两点距离
//!
//! 曲线的身份（句柄）由类型和两个定义点ID组成。直线与端点顺序无关，
//! 圆弧按 (圆心, 边缘点) 的角色顺序。

use crate::point_store::PointId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Line,
    Arc,
}

impl CurveKind {
    pub fn name(&self) -> &'static str {
        match self {
            CurveKind::Line => "line",
            CurveKind::Arc => "arc",
        }
    }
}

/// 曲线句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurveHandle {
    pub kind: CurveKind,
    pub first: PointId,
    pub second: PointId,
}

impl CurveHandle {
    /// 直线句柄，端点按ID升序规范化
    pub fn line(a: PointId, b: PointId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            kind: CurveKind::Line,
            first,
            second,
        }
    }

    /// 圆弧句柄
    pub fn arc(centre: PointId, edge: PointId) -> Self {
        Self {
            kind: CurveKind::Arc,
            first: centre,
            second: edge,
        }
    }

    pub fn points(&self) -> [PointId; 2] {
        [self.first, self.second]
    }

    /// 曲线是否以该点为定义点
    pub fn depends_on(&self, point: PointId) -> bool {
        self.first == point || self.second == point
    }
}

impl fmt::Display for CurveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind.name(), self.first, self.second)
    }
}

/// 已注册的曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub handle: CurveHandle,
    /// 创建该曲线的动作序号
    pub action: usize,
}

impl Curve {
    pub fn kind(&self) -> CurveKind {
        self.handle.kind
    }
}

/// 曲线注册表
///
/// 保持创建顺序，候选曲线的遍历顺序即由此决定。
#[derive(Debug, Clone, Default)]
pub struct CurveRegistry {
    curves: HashMap<CurveHandle, Curve>,
    order: Vec<CurveHandle>,
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册曲线，重复注册同一句柄不做任何事
    ///
    /// 返回是否为新注册。
    pub fn register(&mut self, handle: CurveHandle, action: usize) -> bool {
        if self.curves.contains_key(&handle) {
            return false;
        }
        self.curves.insert(handle, Curve { handle, action });
        self.order.push(handle);
        true
    }

    pub fn lookup(&self, handle: &CurveHandle) -> Option<&Curve> {
        self.curves.get(handle)
    }

    pub fn contains(&self, handle: &CurveHandle) -> bool {
        self.curves.contains_key(handle)
    }

    pub fn remove(&mut self, handle: &CurveHandle) -> Option<Curve> {
        let curve = self.curves.remove(handle)?;
        self.order.retain(|h| h != handle);
        Some(curve)
    }

    /// 按创建顺序列出全部句柄
    pub fn all_handles(&self) -> Vec<CurveHandle> {
        self.order.clone()
    }

    /// 按创建顺序遍历曲线
    pub fn iter(&self) -> impl Iterator<Item = &Curve> {
        self.order.iter().filter_map(|h| self.curves.get(h))
    }

    /// 截至某个动作（含）已存在的曲线，按创建顺序
    pub fn up_to_action(&self, action: usize) -> Vec<&Curve> {
        self.iter().filter(|c| c.action <= action).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.curves.clear();
        self.order.clear();
    }
}
