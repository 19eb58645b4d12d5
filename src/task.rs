use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::palette::Color;
use crate::pipeline::{LayerInfo, LayerKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkDescriptor {
    pub index: usize,
    /// 开始位置（包含），单位：体素索引
    pub start: usize,
    /// 结束位置（不包含），单位：体素索引
    pub end: usize,
}

/// 按 chunk_size 把 data_length 个体素切分成若干块
pub fn plan_chunks(data_length: usize, chunk_size: usize) -> Vec<ChunkDescriptor> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    while start < data_length {
        let end = (start + chunk_size).min(data_length);
        chunks.push(ChunkDescriptor { index, start, end });
        start = end;
        index += 1;
    }
    chunks
}

/// 图层描述，前端据此把标签值映射成颜色
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: LayerKind,
    /// 标签体素中的取值
    pub label: u16,
    /// 0xRRGGBB
    pub color: Color,
    /// "#RRGGBB"
    pub color_hex: String,
}

impl From<&LayerInfo> for LayerDescriptor {
    fn from(info: &LayerInfo) -> Self {
        Self {
            name: info.name.clone(),
            kind: info.kind,
            label: info.label,
            color: info.color,
            color_hex: info.color.to_hex(),
        }
    }
}

/// 计算完成后的统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub union_count: usize,
    pub intersection_count: usize,
    /// 每个谓词独占区域的体素数
    pub distinct_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Ready(RegionSummary),
    Failed { error: String },
}

/// 任务数据，存储分块的标签体素
/// 使用 HashMap 独立存储每个 chunk，允许单独释放
pub struct TaskData {
    /// 网格维度 [nx, ny, nz]
    pub shape: [usize; 3],
    /// 分块描述列表
    pub chunks: Vec<ChunkDescriptor>,
    pub layers: Vec<LayerDescriptor>,
    /// 每个 chunk 的数据，key 是 chunk_index
    /// 当 chunk 被请求后，对应的数据会被移除以释放内存
    /// None 表示 chunk 正在计算中，Some(Vec) 表示已就绪
    chunk_data: RwLock<HashMap<usize, Option<Vec<u16>>>>,
    status: RwLock<TaskStatus>,
    /// 任务创建时间，用于 TTL 过期检查
    pub created_at: Instant,
}

impl TaskData {
    /// 创建新的 TaskData（此时 chunk 尚未计算）
    pub fn new(shape: [usize; 3], chunks: Vec<ChunkDescriptor>, layers: Vec<LayerDescriptor>) -> Self {
        let chunk_data = chunks
            .iter()
            .map(|descriptor| (descriptor.index, None))
            .collect();

        Self {
            shape,
            chunks,
            layers,
            chunk_data: RwLock::new(chunk_data),
            status: RwLock::new(TaskStatus::Processing),
            created_at: Instant::now(),
        }
    }

    /// 设置指定 chunk 的数据（后台计算完成后调用）
    pub fn set_chunk(&self, chunk_index: usize, data: Vec<u16>) {
        self.chunk_data.write().insert(chunk_index, Some(data));
    }

    /// 获取并移除指定 chunk 的数据（用于请求后释放内存）
    /// 返回 None 如果：
    /// - chunk 不存在
    /// - chunk 正在计算中（还未就绪）
    /// - chunk 已被请求
    pub fn take_chunk(&self, chunk_index: usize) -> Option<Vec<u16>> {
        let mut chunk_data = self.chunk_data.write();
        match chunk_data.get(&chunk_index) {
            Some(Some(_)) => chunk_data.remove(&chunk_index).flatten(),
            _ => None,
        }
    }

    /// 检查指定 chunk 是否已就绪
    pub fn is_chunk_ready(&self, chunk_index: usize) -> bool {
        self.chunk_data
            .read()
            .get(&chunk_index)
            .is_some_and(|opt| opt.is_some())
    }

    /// 剩余未被请求的 chunk 数量
    pub fn remaining_chunk_count(&self) -> usize {
        self.chunk_data.read().len()
    }

    pub fn status(&self) -> TaskStatus {
        self.status.read().clone()
    }

    pub fn set_status(&self, status: TaskStatus) {
        *self.status.write() = status;
    }

    /// 计算失败：记录错误并丢弃所有未就绪的 chunk
    pub fn fail(&self, error: impl Into<String>) {
        self.chunk_data.write().clear();
        self.set_status(TaskStatus::Failed {
            error: error.into(),
        });
    }
}

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<TaskData>>>,
    /// TTL（Time-To-Live）过期时间
    default_ttl: Duration,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    /// 创建带自定义 TTL 的 TaskStore
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    pub fn insert(&self, data: TaskData) -> (String, Arc<TaskData>) {
        let task_id = Uuid::new_v4().to_string();
        let task = Arc::new(data);
        self.tasks.write().insert(task_id.clone(), task.clone());
        (task_id, task)
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<TaskData>> {
        self.tasks.read().get(task_id).cloned()
    }

    /// 清理过期的任务
    /// 返回清理的任务数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.write();
        let before_count = tasks.len();

        tasks.retain(|_, task| now.duration_since(task.created_at) < self.default_ttl);

        before_count - tasks.len()
    }

    /// 获取当前任务数量
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// 获取默认 TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
