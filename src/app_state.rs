use std::sync::Arc;

use crate::config::ServerConfig;
use crate::performance::PerformanceStore;
use crate::task::TaskStore;

/// 全局应用状态，在各个 handler 之间共享配置与任务存储
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub task_store: Arc<TaskStore>,
    pub performance_store: Arc<PerformanceStore>,
}

impl AppState {
    /// 按配置创建空的任务存储
    pub fn new(config: ServerConfig) -> Self {
        let ttl = config.tasks.ttl();
        Self {
            config: Arc::new(config),
            task_store: Arc::new(TaskStore::with_ttl(ttl)),
            performance_store: Arc::new(PerformanceStore::with_ttl(ttl)),
        }
    }
}
