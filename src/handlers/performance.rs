use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct PerformanceQuery {
    pub task_id: String,
}

/// 获取指定任务各计算阶段的耗时
#[get("/performance")]
pub async fn get_performance(
    data: web::Data<AppState>,
    query: web::Query<PerformanceQuery>,
) -> impl Responder {
    let records = data.performance_store.get_records(&query.task_id);
    log::debug!(
        "[性能数据查询] task_id: {}, 记录数: {}",
        query.task_id,
        records.as_ref().map_or(0, Vec::len)
    );

    // 计算未完成时记录为空，返回空数组而不是 404
    HttpResponse::Ok().json(serde_json::json!({
        "task_id": query.task_id,
        "records": records.unwrap_or_default(),
    }))
}
