use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 性能数据记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// 开始时间 (Unix 时间戳，毫秒)
    pub start_time: u64,
    /// 结束时间 (Unix 时间戳，毫秒)
    pub end_time: u64,
    /// 行组 (同一行组颜色相同)，例如 "pipeline"
    pub channel_group: String,
    /// 行号，阶段名称，如 "grid", "evaluate", "combine"
    pub channel_index: String,
    /// 消息 (hover 时除了时间外的显示信息)
    pub msg: String,
}

/// 阶段计时器：start 时记录时间，finish 时生成记录
pub struct StageTimer {
    started_ms: u64,
    started: Instant,
    stage: &'static str,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            started_ms: get_unix_timestamp_ms(),
            started: Instant::now(),
            stage,
        }
    }

    pub fn finish(self, msg: impl Into<String>) -> PerformanceRecord {
        let elapsed = self.started.elapsed().as_millis() as u64;
        PerformanceRecord {
            start_time: self.started_ms,
            end_time: self.started_ms + elapsed,
            channel_group: "pipeline".to_string(),
            channel_index: self.stage.to_string(),
            msg: msg.into(),
        }
    }
}

/// 性能数据存储
/// 按 task_id 存储各计算阶段的耗时
pub struct PerformanceStore {
    /// task_id -> 性能记录列表
    records: RwLock<HashMap<String, Vec<PerformanceRecord>>>,
    /// TTL（Time-To-Live）过期时间
    default_ttl: Duration,
    /// task_id -> 创建时间
    session_times: RwLock<HashMap<String, SystemTime>>,
}

impl PerformanceStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            default_ttl: ttl,
            session_times: RwLock::new(HashMap::new()),
        }
    }

    /// 添加性能记录
    pub fn add_record(&self, task_id: &str, record: PerformanceRecord) {
        self.add_records(task_id, vec![record]);
    }

    /// 批量添加性能记录
    pub fn add_records(&self, task_id: &str, records: Vec<PerformanceRecord>) {
        let mut all_records = self.records.write();
        all_records
            .entry(task_id.to_string())
            .or_default()
            .extend(records);

        // 记录创建时间（如果还没有）
        self.session_times
            .write()
            .entry(task_id.to_string())
            .or_insert_with(SystemTime::now);
    }

    /// 获取指定任务的所有性能记录
    pub fn get_records(&self, task_id: &str) -> Option<Vec<PerformanceRecord>> {
        self.records.read().get(task_id).cloned()
    }

    /// 清理过期的记录，返回清理的任务数
    pub fn cleanup_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut records = self.records.write();
        let mut session_times = self.session_times.write();
        let before_count = records.len();

        let expired: Vec<String> = session_times
            .iter()
            .filter(|(_, created_at)| {
                now.duration_since(**created_at).unwrap_or(Duration::ZERO) > self.default_ttl
            })
            .map(|(task_id, _)| task_id.clone())
            .collect();

        for task_id in &expired {
            records.remove(task_id);
            session_times.remove(task_id);
        }

        before_count - records.len()
    }
}

impl Default for PerformanceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 获取 Unix 时间戳（毫秒）
pub fn get_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
