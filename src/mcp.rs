use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands;

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfSplitRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page ranges (e.g., '1-5,10'). Out-of-range pages are skipped.")]
    pub pages: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfMergeRequest {
    #[schemars(description = "Paths of the PDF files to merge, in order (at least 2)")]
    pub paths: Vec<String>,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConvertFileRequest {
    #[schemars(description = "Path to the input file")]
    pub path: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImageResizeRequest {
    #[schemars(description = "Path to the image file")]
    pub path: String,
    #[schemars(description = "Target width in pixels (1-10000)")]
    pub width: u32,
    #[schemars(description = "Target height in pixels (1-10000)")]
    pub height: u32,
    #[schemars(description = "Output file path (PNG)")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImageConvertRequest {
    #[schemars(description = "Path to the image file")]
    pub path: String,
    #[schemars(description = "Target format: png, jpg, webp or gif (default: png)")]
    #[serde(default = "default_format")]
    pub format: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

fn default_format() -> String {
    "png".to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImagesToPdfRequest {
    #[schemars(description = "Paths of the images, one page each, in order")]
    pub paths: Vec<String>,
    #[schemars(description = "Output file path")]
    pub output: String,
}

fn paths(list: &[String]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

fn respond<T: Serialize>(result: Result<T>) -> String {
    match result {
        Ok(summary) => {
            serde_json::to_string_pretty(&summary).unwrap_or_else(|e| format!("Error: {}", e))
        }
        Err(e) => format!("Error: {:#}", e),
    }
}

#[derive(Debug, Clone)]
pub struct ConversionServer {
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl ConversionServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for ConversionServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl ConversionServer {
    #[tool(description = "Copy selected pages of a PDF into a new file, in ascending page order")]
    fn pdf_split(&self, Parameters(req): Parameters<PdfSplitRequest>) -> String {
        respond(commands::split::run(
            Path::new(&req.path),
            &req.pages,
            Path::new(&req.output),
        ))
    }

    #[tool(description = "Concatenate every page of two or more PDFs into a new file")]
    fn pdf_merge(&self, Parameters(req): Parameters<PdfMergeRequest>) -> String {
        respond(commands::merge::run(&paths(&req.paths), Path::new(&req.output)))
    }

    #[tool(description = "Strip document metadata, drop unused objects and recompress streams")]
    fn pdf_compress(&self, Parameters(req): Parameters<ConvertFileRequest>) -> String {
        respond(commands::compress::run(
            Path::new(&req.path),
            Path::new(&req.output),
        ))
    }

    #[tool(description = "Resize an image to exact dimensions and save it as PNG")]
    fn image_resize(&self, Parameters(req): Parameters<ImageResizeRequest>) -> String {
        respond(commands::resize::run(
            Path::new(&req.path),
            req.width,
            req.height,
            Path::new(&req.output),
        ))
    }

    #[tool(description = "Convert an image to PNG, JPG, WebP or GIF")]
    fn image_convert(&self, Parameters(req): Parameters<ImageConvertRequest>) -> String {
        respond(commands::convert::run(
            Path::new(&req.path),
            &req.format,
            Path::new(&req.output),
        ))
    }

    #[tool(description = "Build a PDF with one page per image, scaled to fit A4")]
    fn images_to_pdf(&self, Parameters(req): Parameters<ImagesToPdfRequest>) -> String {
        respond(commands::images_to_pdf::run(
            &paths(&req.paths),
            Path::new(&req.output),
        ))
    }
}

impl ServerHandler for ConversionServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF and image conversion tools working on local files. Use pdf_split to copy page \
                 ranges, pdf_merge to concatenate PDFs, pdf_compress to shrink a PDF, image_resize \
                 and image_convert for images, and images_to_pdf to build a PDF from pictures."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server() -> Result<()> {
    let server = ConversionServer::new();
    info!("MCP server listening on stdio");

    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
