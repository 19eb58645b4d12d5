use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;
use crate::palette::{DEFAULT_INTERSECTION_COLOR, DEFAULT_PALETTE};

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let palette: Vec<String> = DEFAULT_PALETTE.iter().map(|c| c.to_hex()).collect();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "三维谓词区域服务",
        "endpoints": [
            "POST /regions",
            "GET /regions/status?task_id=<id>",
            "GET /regions/chunk?task_id=<id>&chunk_index=<n>&compress=gzip",
            "GET /performance?task_id=<id>",
        ],
        "default_palette": palette,
        "intersection_color": DEFAULT_INTERSECTION_COLOR.to_hex(),
        "limits": data.config.limits,
        "active_tasks": data.task_store.task_count(),
    }))
}
