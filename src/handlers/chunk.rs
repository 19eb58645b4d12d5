use std::io::Write;

use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::task::TaskStatus;

#[derive(Deserialize)]
pub struct ChunkQuery {
    pub task_id: String,
    pub chunk_index: usize,
    /// "gzip" 时响应体使用 gzip 压缩
    pub compress: Option<String>,
}

/// 标签编码为 u16 小端字节流
pub fn encode_labels(labels: &[u16]) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(labels.len() * std::mem::size_of::<u16>());
    for &label in labels {
        bytes.write_u16::<LittleEndian>(label)?;
    }
    Ok(bytes)
}

pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

#[get("/regions/chunk")]
pub async fn get_region_chunk(
    data: web::Data<AppState>,
    query: web::Query<ChunkQuery>,
) -> impl Responder {
    let Some(task) = data.task_store.get(&query.task_id) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 task_id",
            "task_id": query.task_id,
        }));
    };

    let Some(descriptor) = task.chunks.get(query.chunk_index) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 chunk_index",
            "chunk_index": query.chunk_index,
        }));
    };

    let use_gzip = match query.compress.as_deref() {
        None => false,
        Some(c) if c.eq_ignore_ascii_case("gzip") => true,
        Some(other) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "不支持的压缩方式",
                "compress": other,
                "supported": ["gzip"],
            }));
        }
    };

    if let TaskStatus::Failed { error } = task.status() {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "区域计算失败",
            "task_id": query.task_id,
            "details": error,
        }));
    }

    // 检查 chunk 是否已就绪（后台计算是否完成）
    if !task.is_chunk_ready(query.chunk_index) {
        // 已被取走的 chunk 不会再就绪
        if matches!(task.status(), TaskStatus::Ready(_)) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "chunk 已被请求或不存在",
                "task_id": query.task_id,
                "chunk_index": query.chunk_index,
            }));
        }
        return HttpResponse::Accepted().json(serde_json::json!({
            "error": "chunk 正在计算中，请稍后重试",
            "task_id": query.task_id,
            "chunk_index": query.chunk_index,
            "status": "processing",
        }));
    }

    // 获取并移除 chunk 数据（请求后立即释放内存）
    let Some(labels) = task.take_chunk(query.chunk_index) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "chunk 已被请求或不存在",
            "task_id": query.task_id,
            "chunk_index": query.chunk_index,
        }));
    };

    let encoded = encode_labels(&labels).and_then(|bytes| {
        if use_gzip { gzip(&bytes) } else { Ok(bytes) }
    });
    let body = match encoded {
        Ok(body) => body,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "写入 chunk 数据失败",
                "details": e.to_string(),
            }));
        }
    };

    let mut response = HttpResponse::Ok();
    response
        .content_type(ContentType::octet_stream())
        .append_header(("X-Chunk-Index", descriptor.index.to_string()))
        .append_header(("X-Chunk-Start", descriptor.start.to_string()))
        .append_header(("X-Chunk-End", descriptor.end.to_string()))
        .append_header((
            "X-Chunk-Length",
            (descriptor.end - descriptor.start).to_string(),
        ))
        .append_header(("X-Chunk-Task", query.task_id.clone()))
        .append_header(("X-Chunk-Encoding", "u16le"));
    if use_gzip {
        response.append_header(("Content-Encoding", "gzip"));
    }
    response.body(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn labels_are_little_endian() {
        assert_eq!(encode_labels(&[1, 0x0203]).unwrap(), vec![1, 0, 3, 2]);
    }

    #[test]
    fn gzip_round_trips() {
        let bytes = encode_labels(&[0; 512]).unwrap();
        let packed = gzip(&bytes).unwrap();
        assert!(packed.len() < bytes.len());
        let mut unpacked = Vec::new();
        GzDecoder::new(packed.as_slice())
            .read_to_end(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked, bytes);
    }
}
