use actix_web::{App, HttpServer, web};

use pie_3d_backend::app_state::AppState;
use pie_3d_backend::config::ServerConfig;
use pie_3d_backend::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 配置加载失败时使用默认配置继续启动
    let (config, config_error) = match ServerConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };

    // RUST_LOG 优先于配置文件中的日志级别
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log.level.as_str()),
    )
    .init();

    if let Some(e) = config_error {
        log::warn!("{}，使用默认配置", e);
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let workers = config.server.workers;
    let cleanup_interval = config.tasks.cleanup_interval();

    let app_state = web::Data::new(AppState::new(config));

    // 启动后台清理任务：定期清理过期的任务和性能记录，避免长期占用内存
    let task_store = app_state.task_store.clone();
    let performance_store = app_state.performance_store.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let cleaned_count = task_store.cleanup_expired();
            let cleaned_records = performance_store.cleanup_expired();
            if cleaned_count > 0 || cleaned_records > 0 {
                log::info!(
                    "[清理任务] 清理了 {} 个过期任务、{} 组性能记录，当前剩余: {} 个任务",
                    cleaned_count,
                    cleaned_records,
                    task_store.task_count()
                );
            }
        }
    });

    log::info!("服务器启动在 http://{}:{}", host, port);
    log::info!(
        "任务 TTL: {} 分钟",
        app_state.task_store.default_ttl().as_secs() / 60
    );
    log::info!("可用接口:");
    log::info!("  GET / - API 信息");
    log::info!("  POST /regions - 提交表达式，创建区域计算任务");
    log::info!("  GET /regions/status?task_id=<id> - 查询任务状态");
    log::info!("  GET /regions/chunk?task_id=<id>&chunk_index=<n> - 拉取标签数据");
    log::info!("  GET /performance?task_id=<id> - 查询各阶段耗时");

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    });
    if workers > 0 {
        server = server.workers(workers);
    }
    server.bind((host.as_str(), port))?.run().await
}
