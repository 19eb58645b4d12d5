use std::sync::Arc;

use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::RegionError;
use crate::expr::ExprPredicate;
use crate::grid::{Domain, Grid};
use crate::palette::assign_colors;
use crate::performance::{PerformanceRecord, PerformanceStore, StageTimer};
use crate::pipeline::{RegionOptions, plan_layers};
use crate::predicate_set::PredicateSet;
use crate::regions::combine;
use crate::task::{
    ChunkDescriptor, LayerDescriptor, RegionSummary, TaskData, TaskStatus, plan_chunks,
};

/// 单个表达式或表达式列表，单个会被包装成只含一个元素的列表
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Expressions {
    One(String),
    Many(Vec<String>),
}

impl Expressions {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Expressions::One(expr) => vec![expr],
            Expressions::Many(exprs) => exprs,
        }
    }
}

fn default_resolution() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct RegionRequest {
    pub expressions: Expressions,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(flatten)]
    pub options: RegionOptions,
    /// 分块大小（体素个数），缺省使用配置值
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub task_id: String,
    pub shape: [usize; 3],
    pub data_length: usize,
    pub chunk_size: usize,
    /// chunk 二进制编码：每体素一个 u16 小端标签
    pub encoding: &'static str,
    pub chunks: Vec<ChunkDescriptor>,
    pub layers: Vec<LayerDescriptor>,
    /// 随机补齐的颜色数量
    pub generated_colors: usize,
}

#[post("/regions")]
pub async fn create_regions(
    data: web::Data<AppState>,
    payload: web::Json<RegionRequest>,
) -> impl Responder {
    match run_regions(data.get_ref(), payload.into_inner()) {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(err) => err,
    }
}

fn bad_request(error: &str, details: impl ToString) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": error,
        "details": details.to_string(),
    }))
}

/// 创建区域计算任务：校验请求、编译表达式、配色，然后启动后台计算
///
/// ## 流程
/// 1. 校验表达式数量、分辨率、定义域和体素上限（不分配网格）
/// 2. 按顺序编译表达式，任一失败即返回 400
/// 3. 分配颜色并规划图层、分块
/// 4. 创建任务（task_id），在阻塞线程池中计算标签体素
///
/// 立即返回，前端通过 chunk 接口拉取数据，未就绪时返回 202
pub fn run_regions(
    app_state: &AppState,
    request: RegionRequest,
) -> Result<RegionResponse, HttpResponse> {
    let limits = &app_state.config.limits;
    let expressions = request.expressions.into_vec();

    // ==================== 步骤 1: 参数校验 ====================
    if expressions.len() > limits.max_expressions {
        return Err(bad_request(
            "表达式数量过多",
            format!(
                "最多允许 {} 个表达式，提供了 {} 个",
                limits.max_expressions,
                expressions.len()
            ),
        ));
    }

    if request.resolution > limits.max_resolution {
        return Err(bad_request(
            "分辨率过高",
            format!(
                "最大分辨率为 {}，请求为 {}",
                limits.max_resolution, request.resolution
            ),
        ));
    }

    // 体素数用溢出检查后的值，不能直接相乘
    let (shape, data_length) = request
        .domain
        .shape(request.resolution)
        .and_then(|shape| {
            let count = request.domain.voxel_count(request.resolution)?;
            Ok((shape, count))
        })
        .map_err(|e| bad_request("无效的网格参数", e))?;
    if data_length > limits.max_voxels {
        return Err(bad_request(
            "体素数量超出限制",
            format!(
                "shape {:?} 共 {} 个体素，上限为 {}",
                shape, data_length, limits.max_voxels
            ),
        ));
    }

    // ==================== 步骤 2: 编译表达式 ====================
    let mut predicates = PredicateSet::new();
    for (index, source) in expressions.iter().enumerate() {
        let predicate = ExprPredicate::parse(source)
            .map_err(|source| RegionError::Expression { index, source })
            .map_err(|e| bad_request("表达式解析失败", e))?;
        predicates.push(predicate);
    }

    // ==================== 步骤 3: 配色、图层、分块 ====================
    let colors = assign_colors(
        predicates.len(),
        &request.options.colors,
        &mut rand::rng(),
    );
    let layers: Vec<LayerDescriptor> = plan_layers(
        &predicates.layer_names(),
        &colors,
        request.options.intersection_only,
    )
    .map_err(|e| bad_request("图层规划失败", e))?
    .iter()
    .map(LayerDescriptor::from)
    .collect();

    let chunk_size = request
        .chunk_size
        .unwrap_or(app_state.config.tasks.default_chunk_size)
        .max(1);
    let chunks = plan_chunks(data_length, chunk_size);

    // ==================== 步骤 4: 创建任务并启动后台计算 ====================
    let (task_id, task) =
        app_state
            .task_store
            .insert(TaskData::new(shape, chunks.clone(), layers.clone()));

    log::info!(
        "创建任务 {}: {} 个表达式, domain=[{}, {}], resolution={}, shape={:?}, {} 个 chunk",
        task_id,
        predicates.len(),
        request.domain.low,
        request.domain.high,
        request.resolution,
        shape,
        chunks.len()
    );

    let job = RegionJob {
        task_id: task_id.clone(),
        task,
        predicates,
        domain: request.domain,
        resolution: request.resolution,
        intersection_only: request.options.intersection_only,
        performance: app_state.performance_store.clone(),
    };
    spawn_job(job);

    Ok(RegionResponse {
        task_id,
        shape,
        data_length,
        chunk_size,
        encoding: "u16le",
        chunks,
        layers,
        generated_colors: colors.generated,
    })
}

/// 后台计算所需的全部输入
pub struct RegionJob {
    pub task_id: String,
    pub task: Arc<TaskData>,
    pub predicates: PredicateSet,
    pub domain: Domain,
    pub resolution: u32,
    pub intersection_only: bool,
    pub performance: Arc<PerformanceStore>,
}

fn spawn_job(job: RegionJob) {
    let task_id = job.task_id.clone();
    let task = job.task.clone();

    actix_web::rt::spawn(async move {
        match actix_web::rt::task::spawn_blocking(move || job.run()).await {
            Ok(Ok(summary)) => {
                log::info!(
                    "[后台计算] 任务 {} 完成: 并集 {} 个体素, 交集 {} 个体素",
                    task_id,
                    summary.union_count,
                    summary.intersection_count
                );
            }
            Ok(Err(e)) => {
                log::warn!("[后台计算] 任务 {} 失败: {}", task_id, e);
                task.fail(e.to_string());
            }
            Err(e) => {
                log::error!("[后台计算] 任务 {} 异常退出: {}", task_id, e);
                task.fail("计算线程异常退出");
            }
        }
    });
}

impl RegionJob {
    /// 同步执行：网格 -> 求值 -> 组合 -> 标签 -> 分块
    pub fn run(self) -> Result<RegionSummary, RegionError> {
        let mut records: Vec<PerformanceRecord> = Vec::new();

        let timer = StageTimer::start("grid");
        let grid = Grid::build(self.domain, self.resolution)?;
        records.push(timer.finish(format!("shape {:?}", grid.shape())));

        let timer = StageTimer::start("evaluate");
        let volumes = self.predicates.evaluate_all(&grid)?;
        records.push(timer.finish(format!("{} 个谓词", volumes.len())));
        // 坐标数组不再需要
        drop(grid);

        let timer = StageTimer::start("combine");
        let regions = combine(self.task.shape, &volumes);
        drop(volumes);
        records.push(timer.finish(format!("交集 {} 个体素", regions.intersection.count())));

        let timer = StageTimer::start("label");
        let labels = regions.label_volume(self.intersection_only)?;
        records.push(timer.finish(format!("{} 个体素", labels.len())));

        let timer = StageTimer::start("split");
        let data = labels.get_data();
        for descriptor in &self.task.chunks {
            self.task
                .set_chunk(descriptor.index, data[descriptor.start..descriptor.end].to_vec());
        }
        records.push(timer.finish(format!("{} 个 chunk", self.task.chunks.len())));

        let summary = RegionSummary {
            union_count: regions.union.count(),
            intersection_count: regions.intersection.count(),
            distinct_counts: regions.distinct_counts(),
        };
        self.task.set_status(TaskStatus::Ready(summary.clone()));
        self.performance.add_records(&self.task_id, records);

        Ok(summary)
    }
}
