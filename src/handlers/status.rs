use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct StatusQuery {
    pub task_id: String,
}

/// 查询任务状态：processing / ready（附统计） / failed（附错误）
#[get("/regions/status")]
pub async fn get_region_status(
    data: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> impl Responder {
    let Some(task) = data.task_store.get(&query.task_id) else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "任务不存在或已过期",
            "task_id": query.task_id,
        }));
    };

    let mut body = serde_json::json!({
        "task_id": query.task_id,
        "shape": task.shape,
        "layers": task.layers,
        "chunk_count": task.chunks.len(),
        "remaining_chunks": task.remaining_chunk_count(),
    });
    // 状态字段平铺到顶层
    if let (Some(obj), Ok(serde_json::Value::Object(status))) =
        (body.as_object_mut(), serde_json::to_value(task.status()))
    {
        obj.extend(status);
    }

    HttpResponse::Ok().json(body)
}
