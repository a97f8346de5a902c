//! 作图活动日志
//!
//! 每个提交的动作追加一条人类可读的条目，并附上新建点的溯源描述：
//!
//! ```text
//! [line] Move 3: (0, 0) → (1, 0) [action 3]
//! [arc] Move 4: Center (0, 0), Point (1, 0) [action 4]
//! [newlayer] Layer 2 [action 5]
//! ```

use crate::action::{Action, Change};
use crate::point_store::{PointId, PointStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// 条目类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Move,
    Layer,
    /// 新建点的溯源描述
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: usize,
    pub kind: EntryKind,
    pub text: String,
}

/// 活动日志
///
/// 超过容量时丢弃最旧的条目。
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    move_count: usize,
    /// 每个动作贡献的移动数，不受条目淘汰影响
    moves_by_action: BTreeMap<usize, usize>,
    layer_count: usize,
    max_entries: usize,
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            move_count: 0,
            moves_by_action: BTreeMap::new(),
            layer_count: 0,
            max_entries,
        }
    }

    fn push(&mut self, action: usize, kind: EntryKind, text: String) {
        self.entries.push_back(ActivityEntry { action, kind, text });
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// 记录一个动作的每个变更
    pub fn record_action<S: PointStore + ?Sized>(&mut self, index: usize, action: &Action, store: &S) {
        for change in &action.changes {
            match *change {
                Change::Line { a, b } => {
                    self.count_move(index);
                    let text = format!(
                        "[line] Move {}: {} → {} [action {}]",
                        self.move_count,
                        coords(store, a),
                        coords(store, b),
                        index
                    );
                    self.push(index, EntryKind::Move, text);
                }
                Change::Arc { centre, edge } => {
                    self.count_move(index);
                    let text = format!(
                        "[arc] Move {}: Center {}, Point {} [action {}]",
                        self.move_count,
                        coords(store, centre),
                        coords(store, edge),
                        index
                    );
                    self.push(index, EntryKind::Move, text);
                }
                Change::NewLayer => {
                    self.layer_count += 1;
                    let text = format!("[newlayer] Layer {} [action {}]", self.layer_count, index);
                    self.push(index, EntryKind::Layer, text);
                }
            }
        }
    }

    fn count_move(&mut self, index: usize) {
        self.move_count += 1;
        *self.moves_by_action.entry(index).or_default() += 1;
    }

    /// 记录新建点的溯源描述
    pub fn record_point(&mut self, index: usize, description: String) {
        self.push(index, EntryKind::Point, format!("  {} [action {}]", description, index));
    }

    /// 撤销某个动作的全部条目，返回删除的条目数
    ///
    /// 移动计数按该动作的移动数递减（包括已被淘汰的条目）；图层计数保持不变。
    pub fn remove_action(&mut self, index: usize) -> usize {
        let before = self.entries.len();
        let moves = self.moves_by_action.remove(&index).unwrap_or(0);
        self.entries.retain(|e| e.action != index);
        self.move_count = self.move_count.saturating_sub(moves);
        before - self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn move_count(&self) -> usize {
        self.move_count
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.move_count = 0;
        self.moves_by_action.clear();
        self.layer_count = 0;
    }
}

fn coords<S: PointStore + ?Sized>(store: &S, id: PointId) -> String {
    match store.position(id) {
        Some(p) => format!("({}, {})", p.x, p.y),
        None => format!("(point {}?)", id),
    }
}
