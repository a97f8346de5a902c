//! 点存储适配
//!
//! 点的数值坐标由外部作图引擎提供，这里只负责读取和比较快照，
//! 用来发现某个作图动作新建了哪些点。

use crate::math::Point2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 点ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u64);

impl PointId {
    /// 公理点：原点 (0, 0)
    pub const ORIGIN: PointId = PointId(0);

    /// 公理点：单位点 (1, 0)
    pub const UNIT: PointId = PointId(1);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// 是否为两个公理点之一
    pub fn is_axiomatic(&self) -> bool {
        *self == Self::ORIGIN || *self == Self::UNIT
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 外部点存储接口（只读）
pub trait PointStore {
    /// 按ID查询坐标
    fn position(&self, id: PointId) -> Option<Point2>;

    /// 当前存在的全部点ID
    fn ids(&self) -> BTreeSet<PointId>;

    fn contains(&self, id: PointId) -> bool {
        self.position(id).is_some()
    }
}

/// 内存点存储
///
/// 用于测试和命令行重放，真实宿主通常提供自己的实现。
#[derive(Debug, Clone, Default)]
pub struct MemoryPointStore {
    points: BTreeMap<PointId, Point2>,
}

impl MemoryPointStore {
    /// 创建空存储（不含公理点）
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建只含两个公理点的存储
    pub fn with_axioms() -> Self {
        let mut store = Self::new();
        store.insert(PointId::ORIGIN, Point2::new(0.0, 0.0));
        store.insert(PointId::UNIT, Point2::new(1.0, 0.0));
        store
    }

    pub fn insert(&mut self, id: PointId, position: Point2) {
        self.points.insert(id, position);
    }

    /// 以下一个可用ID添加点
    pub fn add(&mut self, x: f64, y: f64) -> PointId {
        let id = self
            .points
            .keys()
            .next_back()
            .map_or(PointId(0), |last| PointId(last.0 + 1));
        self.insert(id, Point2::new(x, y));
        id
    }

    pub fn remove(&mut self, id: PointId) -> Option<Point2> {
        self.points.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PointStore for MemoryPointStore {
    fn position(&self, id: PointId) -> Option<Point2> {
        self.points.get(&id).copied()
    }

    fn ids(&self) -> BTreeSet<PointId> {
        self.points.keys().copied().collect()
    }
}

/// 点ID快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointSnapshot {
    ids: BTreeSet<PointId>,
}

impl PointSnapshot {
    /// 记录存储中当前的点ID
    pub fn capture<S: PointStore + ?Sized>(store: &S) -> Self {
        Self { ids: store.ids() }
    }

    pub fn from_ids(ids: impl IntoIterator<Item = PointId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: PointId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &BTreeSet<PointId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `after` 中存在而 `before` 中没有的点（升序）
pub fn diff(before: &PointSnapshot, after: &PointSnapshot) -> Vec<PointId> {
    after.ids.difference(&before.ids).copied().collect()
}

/// `before` 中存在而 `after` 中消失的点（升序）
pub fn removed(before: &PointSnapshot, after: &PointSnapshot) -> Vec<PointId> {
    before.ids.difference(&after.ids).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axiomatic_ids() {
        assert!(PointId::ORIGIN.is_axiomatic());
        assert!(PointId::UNIT.is_axiomatic());
        assert!(!PointId(2).is_axiomatic());
    }

    #[test]
    fn test_store_add_assigns_next_id() {
        let mut store = MemoryPointStore::with_axioms();
        assert_eq!(store.add(0.5, 0.5), PointId(2));
        assert_eq!(store.add(0.5, -0.5), PointId(3));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_snapshot_diff() {
        let mut store = MemoryPointStore::with_axioms();
        let before = PointSnapshot::capture(&store);
        let p = store.add(2.0, 0.0);
        let q = store.add(3.0, 0.0);
        let after = PointSnapshot::capture(&store);

        assert_eq!(diff(&before, &after), vec![p, q]);
        assert!(removed(&before, &after).is_empty());

        store.remove(p);
        let later = PointSnapshot::capture(&store);
        assert_eq!(removed(&after, &later), vec![p]);
        assert!(diff(&after, &later).is_empty());
    }
}
