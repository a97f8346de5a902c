//! 会话文件
//!
//! 一个会话文件保存外部引擎的最终点集和动作日志：
//!
//! ```json
//! {
//!   "points": [{"id": 0, "x": 0.0, "y": 0.0}, {"id": 1, "x": 1.0, "y": 0.0}],
//!   "log": {"entries": [{"type": "arc", "a": 0, "b": 1}], "boundaries": [1]}
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use zgeo_core::action::ActionLog;
use zgeo_core::config::EngineConfig;
use zgeo_core::math::Point2;
use zgeo_core::point_store::{MemoryPointStore, PointId, PointStore};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionPoint {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub points: Vec<SessionPoint>,
    #[serde(default)]
    pub log: ActionLog,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        let session: Session = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse session {}", path.display()))?;
        debug!(
            "Loaded session with {} points and {} log entries",
            session.points.len(),
            session.log.entries.len()
        );
        Ok(session)
    }

    /// 构建点存储，缺少的公理点按默认位置补上
    pub fn store(&self) -> MemoryPointStore {
        let axioms = MemoryPointStore::with_axioms();
        let mut store = axioms.clone();
        for point in &self.points {
            let position = Point2::new(point.x, point.y);
            if point.id.is_axiomatic() && axioms.position(point.id) != Some(position) {
                warn!("Axiomatic point {} moved to ({}, {})", point.id, point.x, point.y);
            }
            store.insert(point.id, position);
        }
        store
    }
}

/// 读取引擎配置，未给出路径时使用默认值
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_session_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "points": [{{"id": 2, "x": 0.5, "y": 0.8660254037844386}}],
                "log": {{"entries": [{{"type": "arc", "a": 0, "b": 1}}], "boundaries": [1]}}
            }}"#
        )
        .unwrap();

        let session = Session::load(file.path()).unwrap();
        let store = session.store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.position(PointId(1)), Some(Point2::new(1.0, 0.0)));
        assert_eq!(session.log.actions().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read session"));
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"tolerance": 1e-4}}"#).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.tolerance, 1e-4);
        assert!(config.relative_tolerance);
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }
}
