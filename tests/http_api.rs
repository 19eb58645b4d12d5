use std::io::Read;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use flate2::read::GzDecoder;
use serde_json::{Value, json};

use pie_3d_backend::app_state::AppState;
use pie_3d_backend::config::ServerConfig;
use pie_3d_backend::routes;

fn app_state() -> web::Data<AppState> {
    let mut config = ServerConfig::default();
    config.limits.max_voxels = 200_000;
    config.limits.max_expressions = 4;
    web::Data::new(AppState::new(config))
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(routes::configure),
        )
        .await
    };
}

/// 轮询状态接口直到任务不再处于 processing
macro_rules! wait_until_done {
    ($app:expr, $task_id:expr) => {{
        let mut status = Value::Null;
        for _ in 0..200 {
            let req = test::TestRequest::get()
                .uri(&format!("/regions/status?task_id={}", $task_id))
                .to_request();
            status = test::call_and_read_body_json(&$app, req).await;
            if status["status"] != "processing" {
                break;
            }
            actix_web::rt::time::sleep(Duration::from_millis(10)).await;
        }
        status
    }};
}

#[actix_web::test]
async fn root_lists_endpoints() {
    let state = app_state();
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["intersection_color"], "#A93C3E");
    assert_eq!(body["default_palette"][0], "#FF5733");
    assert_eq!(body["limits"]["max_voxels"], 200_000);
}

#[actix_web::test]
async fn region_task_streams_label_chunks() {
    let state = app_state();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/regions")
        .set_json(json!({
            "expressions": ["x <= 1", "x >= 1"],
            "domain": [0, 2],
            "chunk_size": 10,
            "colors": ["#112233", 0x445566],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = test::read_body_json(resp).await;

    assert_eq!(created["shape"], json!([3, 3, 3]));
    assert_eq!(created["data_length"], 27);
    assert_eq!(created["chunks"].as_array().unwrap().len(), 3);
    assert_eq!(created["layers"][0]["kind"], "expression");
    assert_eq!(created["layers"][0]["color"], 0x112233);
    assert_eq!(created["layers"][1]["color_hex"], "#445566");
    assert_eq!(created["layers"][2]["label"], 1);
    assert_eq!(created["generated_colors"], 0);

    let task_id = created["task_id"].as_str().unwrap().to_string();
    let status = wait_until_done!(app, task_id);
    assert_eq!(status["status"], "ready");
    assert_eq!(status["union_count"], 27);
    assert_eq!(status["intersection_count"], 9);
    assert_eq!(status["distinct_counts"], json!([9, 9]));

    let mut labels = Vec::new();
    for index in 0..3 {
        let compress = if index == 1 { "&compress=gzip" } else { "" };
        let req = test::TestRequest::get()
            .uri(&format!(
                "/regions/chunk?task_id={}&chunk_index={}{}",
                task_id, index, compress
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let length: usize = resp
            .headers()
            .get("X-Chunk-Length")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let gzipped = resp.headers().contains_key("Content-Encoding");
        let body = test::read_body(resp).await;

        let bytes = if gzipped {
            let mut out = Vec::new();
            GzDecoder::new(body.as_ref()).read_to_end(&mut out).unwrap();
            out
        } else {
            body.to_vec()
        };
        assert_eq!(bytes.len(), length * 2);
        labels.extend(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        );
    }

    assert_eq!(labels.len(), 27);
    // x = 0 -> 第一个谓词，x = 1 -> 交集，x = 2 -> 第二个谓词
    assert!(labels[..9].iter().all(|&l| l == 2));
    assert!(labels[9..18].iter().all(|&l| l == 1));
    assert!(labels[18..].iter().all(|&l| l == 3));

    // chunk 只能被请求一次
    let req = test::TestRequest::get()
        .uri(&format!("/regions/chunk?task_id={}&chunk_index=0", task_id))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::get()
        .uri(&format!("/performance?task_id={}", task_id))
        .to_request();
    let perf: Value = test::call_and_read_body_json(&app, req).await;
    let stages: Vec<&str> = perf["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["channel_index"].as_str().unwrap())
        .collect();
    assert_eq!(stages, ["grid", "evaluate", "combine", "label", "split"]);
}

#[actix_web::test]
async fn invalid_requests_are_rejected() {
    let state = app_state();
    let app = init_app!(state);

    let cases = [
        json!({ "expressions": "x >= ", "domain": [0, 5] }),
        json!({ "expressions": "x + 1", "domain": [0, 5] }),
        json!({ "expressions": "x >= 1", "domain": [-2, 5] }),
        json!({ "expressions": "x >= 1", "domain": [0, 5], "resolution": 0 }),
        json!({ "expressions": "x >= 1", "domain": [0, 100] }),
        json!({ "expressions": ["x>1", "x>2", "x>3", "x>4", "x>5"], "domain": [0, 5] }),
        // n³ 超出 usize，不能绕过体素上限
        json!({ "expressions": "x > 1", "domain": [0, 4_194_303] }),
        json!({ "expressions": "x > 1", "domain": [0, i64::MAX], "resolution": 16 }),
        // 嵌套过深的表达式返回 400 而不是耗尽栈
        json!({
            "expressions": format!("{}x > 1{}", "(".repeat(1_000), ")".repeat(1_000)),
            "domain": [0, 5],
        }),
        json!({ "expressions": format!("x{} > 0", " + x".repeat(2_000)), "domain": [0, 5] }),
    ];
    for body in cases {
        let req = test::TestRequest::post()
            .uri("/regions")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", body);
        let err: Value = test::read_body_json(resp).await;
        assert!(err["error"].is_string());
    }

    let req = test::TestRequest::get()
        .uri("/regions/chunk?task_id=missing&chunk_index=0")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::get()
        .uri("/regions/status?task_id=missing")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn intersection_only_has_single_layer() {
    let state = app_state();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/regions")
        .set_json(json!({
            "expressions": "(x >= 10) & (y <= 20) & (z <= 30)",
            "domain": [0, 50],
            "intersection_only": true,
            "intersection_color": "#00FF00",
        }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["shape"], json!([51, 51, 51]));
    assert_eq!(created["layers"].as_array().unwrap().len(), 1);
    assert_eq!(created["layers"][0]["color_hex"], "#00FF00");

    let status = wait_until_done!(app, created["task_id"].as_str().unwrap());
    assert_eq!(status["intersection_count"], 41 * 21 * 31);
}
