//! 文档服务
//!
//! `POST /api/generate-pdf` 把试卷原文渲染成 PDF 附件返回。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::render::PaginatedDocumentBuilder;

/// 下载时的附件名
pub const ATTACHMENT_NAME: &str = "question-paper.pdf";

#[derive(Debug, Deserialize)]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct ServerState {
    builder: Arc<PaginatedDocumentBuilder>,
}

/// 创建路由
pub fn create_router(builder: Arc<PaginatedDocumentBuilder>) -> Router {
    Router::new()
        .route("/api/generate-pdf", post(handle_generate_pdf))
        .route("/health", get(handle_health))
        .with_state(ServerState { builder })
}

/// 启动服务，直到进程退出
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let builder = PaginatedDocumentBuilder::new().context("初始化 PDF 生成器失败")?;
    let router = create_router(Arc::new(builder));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;
    info!("🌐 文档服务已启动: http://{}", addr);

    axum::serve(listener, router)
        .await
        .context("文档服务异常退出")?;
    Ok(())
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_generate_pdf(
    State(state): State<ServerState>,
    Json(request): Json<GeneratePdfRequest>,
) -> Response {
    match state.builder.build(&request.content) {
        Ok(output) => {
            for issue in &output.issues {
                warn!("⚠️ 渲染提示: {}", issue);
            }
            info!(
                "📄 生成 PDF: {} 页, {} 字节",
                output.page_count,
                output.bytes.len()
            );
            (
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", ATTACHMENT_NAME),
                    ),
                ],
                output.bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!("❌ PDF 生成失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate PDF".to_string(),
                }),
            )
                .into_response()
        }
    }
}
