//! 作图动作与动作日志
//!
//! 外部引擎记录一个只追加的变更日志，`boundaries` 标出每个已提交动作的结束位置。
//! 日志条目在这里一次性解码为 [`Change`]，之后的代码不再接触原始条目。

use crate::curve::CurveHandle;
use crate::error::LogError;
use crate::point_store::PointId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 一次变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Change {
    Line { a: PointId, b: PointId },
    Arc { centre: PointId, edge: PointId },
    NewLayer,
}

impl Change {
    /// 变更引入的曲线句柄
    pub fn handle(&self) -> Option<CurveHandle> {
        match *self {
            Change::Line { a, b } => Some(CurveHandle::line(a, b)),
            Change::Arc { centre, edge } => Some(CurveHandle::arc(centre, edge)),
            Change::NewLayer => None,
        }
    }

    pub fn is_move(&self) -> bool {
        !matches!(self, Change::NewLayer)
    }
}

/// 一个作图动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub changes: Vec<Change>,
    /// 动作新建的点；缺省时由点快照差或重放推断得出
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Vec<PointId>>,
}

impl Action {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            changes,
            created: None,
        }
    }

    pub fn line(a: PointId, b: PointId) -> Self {
        Self::new(vec![Change::Line { a, b }])
    }

    pub fn arc(centre: PointId, edge: PointId) -> Self {
        Self::new(vec![Change::Arc { centre, edge }])
    }

    pub fn new_layer() -> Self {
        Self::new(vec![Change::NewLayer])
    }

    pub fn with_created(mut self, created: Vec<PointId>) -> Self {
        self.created = Some(created);
        self
    }

    /// 动作引入的全部曲线句柄（按出现顺序）
    pub fn handles(&self) -> Vec<CurveHandle> {
        self.changes.iter().filter_map(Change::handle).collect()
    }

    /// 是否只包含新建图层
    pub fn is_layer(&self) -> bool {
        !self.changes.is_empty() && self.changes.iter().all(|c| !c.is_move())
    }
}

/// 原始日志条目
///
/// 直线和圆弧条目除两个定义点外还带有仅供显示的字段，这里只保留数值型的几个。
/// 无法识别的类型解码为 [`LogEntry::Auxiliary`] 并被忽略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    #[serde(alias = "realline")]
    Line {
        a: PointId,
        b: PointId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        angle: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created: Option<Vec<PointId>>,
    },
    Arc {
        /// 圆心
        a: PointId,
        /// 圆上一点
        b: PointId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created: Option<Vec<PointId>>,
    },
    #[serde(alias = "new-layer")]
    NewLayer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<u32>,
    },
    #[serde(other)]
    Auxiliary,
}

impl LogEntry {
    pub fn line(a: PointId, b: PointId) -> Self {
        LogEntry::Line {
            a,
            b,
            length: None,
            angle: None,
            created: None,
        }
    }

    pub fn arc(centre: PointId, edge: PointId) -> Self {
        LogEntry::Arc {
            a: centre,
            b: edge,
            radius: None,
            created: None,
        }
    }

    pub fn change(&self) -> Option<Change> {
        match *self {
            LogEntry::Line { a, b, .. } => Some(Change::Line { a, b }),
            LogEntry::Arc { a, b, .. } => Some(Change::Arc { centre: a, edge: b }),
            LogEntry::NewLayer { .. } => Some(Change::NewLayer),
            LogEntry::Auxiliary => None,
        }
    }

    fn created(&self) -> Option<&[PointId]> {
        match self {
            LogEntry::Line { created, .. } | LogEntry::Arc { created, .. } => created.as_deref(),
            _ => None,
        }
    }
}

/// 只追加的动作日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub entries: Vec<LogEntry>,
    /// 每个已提交动作结束处的条目数
    #[serde(default)]
    pub boundaries: Vec<usize>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, LogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, LogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 追加一个动作的全部条目并记录边界
    pub fn push_action(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.entries.extend(entries);
        self.boundaries.push(self.entries.len());
    }

    /// 按边界切分出已提交的动作
    ///
    /// 最后一个边界之后的条目属于尚未提交的动作，被忽略；
    /// 只含辅助条目的动作也被跳过。
    pub fn actions(&self) -> Result<Vec<Action>, LogError> {
        let mut actions = Vec::with_capacity(self.boundaries.len());
        let mut start = 0;
        for (position, &boundary) in self.boundaries.iter().enumerate() {
            if boundary > self.entries.len() {
                return Err(LogError::BoundaryOutOfRange {
                    boundary,
                    len: self.entries.len(),
                });
            }
            if boundary < start {
                return Err(LogError::NonMonotonicBoundary(position));
            }

            let slice = &self.entries[start..boundary];
            start = boundary;

            let changes: Vec<Change> = slice.iter().filter_map(LogEntry::change).collect();
            if changes.is_empty() {
                debug!("Skipping auxiliary-only action at boundary {}", position);
                continue;
            }
            let mut action = Action::new(changes);
            let listed: Vec<&[PointId]> = slice.iter().filter_map(LogEntry::created).collect();
            if !listed.is_empty() {
                action.created = Some(listed.concat());
            }
            actions.push(action);
        }

        let pending = self.entries.len() - start;
        if pending > 0 {
            debug!("Ignoring {} speculative entries after the last boundary", pending);
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tagged_entries() {
        let json = r#"{
            "entries": [
                {"type": "realline", "a": 0, "b": 1, "length": 1.0, "angle": 0.0, "name": "l0"},
                {"type": "arc", "a": 0, "b": 1, "radius": 1.0, "created": [2, 3]},
                {"type": "newlayer", "layer": 1},
                {"type": "loadhash", "hash": "abc"}
            ],
            "boundaries": [1, 2, 4]
        }"#;
        let log = ActionLog::from_json(json).unwrap();
        assert_eq!(log.entries[3], LogEntry::Auxiliary);

        let actions = log.actions().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], Action::line(PointId(0), PointId(1)));
        assert_eq!(
            actions[1],
            Action::arc(PointId(0), PointId(1)).with_created(vec![PointId(2), PointId(3)])
        );
        assert!(actions[2].is_layer());
    }

    #[test]
    fn test_speculative_and_auxiliary_entries_ignored() {
        let mut log = ActionLog::new();
        log.push_action([LogEntry::Auxiliary]);
        log.push_action([LogEntry::line(PointId(0), PointId(1))]);
        // 最后一个边界之后的条目
        log.entries.push(LogEntry::arc(PointId(1), PointId(0)));

        let actions = log.actions().unwrap();
        assert_eq!(actions, vec![Action::line(PointId(0), PointId(1))]);
    }

    #[test]
    fn test_bad_boundaries() {
        let mut log = ActionLog::new();
        log.entries.push(LogEntry::line(PointId(0), PointId(1)));
        log.boundaries = vec![2];
        assert!(matches!(
            log.actions(),
            Err(LogError::BoundaryOutOfRange { boundary: 2, len: 1 })
        ));

        log.boundaries = vec![1, 0];
        assert!(matches!(log.actions(), Err(LogError::NonMonotonicBoundary(1))));
    }

    #[test]
    fn test_action_handles() {
        let action = Action::new(vec![
            Change::Line {
                a: PointId(3),
                b: PointId(1),
            },
            Change::NewLayer,
        ]);
        assert_eq!(action.handles(), vec![CurveHandle::line(PointId(1), PointId(3))]);
        assert!(!action.is_layer());
    }

    #[test]
    fn test_log_json_round_trip() {
        let mut log = ActionLog::new();
        log.push_action([LogEntry::arc(PointId(0), PointId(1))]);
        let text = log.to_json().unwrap();
        assert_eq!(ActionLog::from_json(&text).unwrap(), log);
    }
}
