use actix_web::web;

use crate::handlers;

/// 统一注册 HTTP 路由，方便集中管理
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::hello)
        .service(handlers::create_regions)
        .service(handlers::get_region_status)
        .service(handlers::get_region_chunk)
        .service(handlers::get_performance);
}
