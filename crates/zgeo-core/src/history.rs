//! 动作历史
//!
//! 线性历史加游标：游标之前是已提交的动作，之后是可重做的动作。
//! 提交新动作时截断重做历史。

use crate::action::Action;
use crate::curve::CurveHandle;
use crate::point_store::PointId;

/// 已提交的动作
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedAction {
    /// 动作序号，从 1 开始
    pub index: usize,
    pub action: Action,
    /// 该动作新建的点
    pub created: Vec<PointId>,
    /// 该动作首次注册的曲线
    pub curves: Vec<CurveHandle>,
}

impl CommittedAction {
    /// 带上已知新建点的动作，重放时不必再推断
    pub fn replayable(&self) -> Action {
        self.action.clone().with_created(self.created.clone())
    }
}

/// 动作历史
#[derive(Debug, Clone, Default)]
pub struct History {
    items: Vec<CommittedAction>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一个提交的动作序号
    pub fn next_index(&self) -> usize {
        self.cursor + 1
    }

    pub fn push(&mut self, committed: CommittedAction) {
        // 截断 redo 历史
        self.items.truncate(self.cursor);
        self.items.push(committed);
        self.cursor = self.items.len();
    }

    /// 在游标处插入一个已提交动作，不影响重做历史
    pub fn push_done(&mut self, committed: CommittedAction) {
        self.items.insert(self.cursor, committed);
        self.cursor += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.items.len()
    }

    pub fn undo(&mut self) -> Option<&CommittedAction> {
        if self.can_undo() {
            self.cursor -= 1;
            Some(&self.items[self.cursor])
        } else {
            None
        }
    }

    /// 下一个可重做的动作
    pub fn peek_redo(&self) -> Option<&CommittedAction> {
        self.items.get(self.cursor)
    }

    /// 用重新计算的结果替换可重做的动作并前移游标
    pub fn redo(&mut self, committed: CommittedAction) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.items[self.cursor] = committed;
        self.cursor += 1;
        true
    }

    /// 用重建出的已提交动作替换游标之前的部分，保留重做历史
    pub fn rebase(&mut self, done: Vec<CommittedAction>) {
        let redo = self.items.split_off(self.cursor);
        self.cursor = done.len();
        self.items = done;
        self.items.extend(redo);
    }

    pub fn done(&self) -> &[CommittedAction] {
        &self.items[..self.cursor]
    }

    pub fn undone_len(&self) -> usize {
        self.items.len() - self.cursor
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(index: usize) -> CommittedAction {
        CommittedAction {
            index,
            action: Action::line(PointId(0), PointId(1)),
            created: vec![PointId(index as u64 + 1)],
            curves: Vec::new(),
        }
    }

    #[test]
    fn test_undo_redo_cursor() {
        let mut history = History::new();
        history.push(committed(1));
        history.push(committed(2));
        assert_eq!(history.next_index(), 3);

        assert_eq!(history.undo().map(|c| c.index), Some(2));
        assert!(history.can_redo());
        assert_eq!(history.len(), 1);
        assert_eq!(history.peek_redo().map(|c| c.index), Some(2));

        assert!(history.redo(committed(2)));
        assert!(!history.can_redo());
        assert!(!history.redo(committed(3)));
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut history = History::new();
        history.push(committed(1));
        history.push(committed(2));
        history.undo();
        history.push(committed(2));
        assert_eq!(history.undone_len(), 0);
        assert_eq!(history.done().len(), 2);
    }

    #[test]
    fn test_rebase_keeps_redo() {
        let mut history = History::new();
        history.push(committed(1));
        history.push(committed(2));
        history.undo();
        history.rebase(Vec::new());
        history.push_done(committed(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history.undone_len(), 1);
        assert_eq!(history.peek_redo().map(|c| c.index), Some(2));
    }

    #[test]
    fn test_replayable_carries_created_points() {
        let action = committed(4).replayable();
        assert_eq!(action.created, Some(vec![PointId(5)]));
    }
}
