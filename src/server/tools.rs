//! Conversion endpoints. Each one reserves a use, reads the form, converts on
//! the blocking pool and returns the result. A failed conversion hands its
//! use back.

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::future::Future;
use tracing::{info, warn};

use crate::auth::Caller;
use crate::error::{Error, Result};
use crate::page_range::{leading_int, select_pages};
use crate::pdf::{self, PdfDocument};
use crate::raster::{self, OutputFormat, DEFAULT_COMPRESS_QUALITY};
use crate::server::form::UploadForm;
use crate::server::response::{attachment, run_tool, set_header, ApiError};
use crate::server::AppState;
use crate::usage::Remaining;

const PDF_MIME: &str = "application/pdf";

/// Run one conversion against the caller's quota. The use is reserved up
/// front, kept if the conversion succeeds and released if it fails.
async fn metered<F>(state: &AppState, caller: &Caller, work: F) -> Result<Response>
where
    F: Future<Output = Result<Response>>,
{
    let Some(reservation) = state.limiter.reserve(&caller.identity, caller.entitled)? else {
        warn!(identity = %caller.identity, "Daily limit reached");
        return Err(Error::QuotaExceeded);
    };

    match work.await {
        Ok(mut response) => {
            if let Err(e) = state.limiter.commit(&reservation) {
                warn!(error = %e, identity = %caller.identity, "Failed to record usage");
            }
            if let Remaining::Limited(remaining) = reservation.remaining {
                set_header(&mut response, "x-usage-remaining", remaining);
            }
            Ok(response)
        }
        Err(e) => {
            if let Err(release_error) = state.limiter.release(reservation) {
                warn!(error = %release_error, identity = %caller.identity, "Failed to release usage");
            }
            Err(e)
        }
    }
}

async fn read_form(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<UploadForm> {
    UploadForm::read(multipart, state.config.upload_limit_mb(caller.entitled)).await
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Processing {
            reason: e.to_string(),
        })?
}

pub async fn pdf_merge(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = pdf_merge_inner(&state, &caller, multipart);
    run_tool("merge PDF files", metered(&state, &caller, work)).await
}

async fn pdf_merge_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let uploads = form.take_files("files");
    if uploads.len() < 2 {
        return Err(Error::NotEnoughFiles { required: 2 });
    }

    let count = uploads.len();
    let bytes = blocking(move || {
        let inputs: Vec<&[u8]> = uploads.iter().map(|u| u.bytes.as_slice()).collect();
        pdf::merge(&inputs)?.to_bytes()
    })
    .await?;

    info!(files = count, "PDFs merged");
    Ok(attachment(bytes, PDF_MIME, "merged.pdf"))
}

pub async fn pdf_split(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = pdf_split_inner(&state, &caller, multipart);
    run_tool("split PDF", metered(&state, &caller, work)).await
}

async fn pdf_split_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let upload = form.take_file("file").ok_or(Error::NoFile)?;
    let ranges = form.text("pages").ok_or(Error::NoPagesSpecified)?.to_string();

    let (bytes, pages) = blocking(move || {
        let source = PdfDocument::load(&upload.bytes)?;
        let indices = select_pages(&ranges, source.page_count());
        if indices.is_empty() {
            return Err(Error::NoValidPages);
        }
        let bytes = source.extract_pages(&indices)?.to_bytes()?;
        Ok((bytes, indices.len()))
    })
    .await?;

    info!(pages, "PDF split");
    Ok(attachment(bytes, PDF_MIME, "split.pdf"))
}

pub async fn pdf_compress(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = pdf_compress_inner(&state, &caller, multipart);
    run_tool("compress PDF", metered(&state, &caller, work)).await
}

async fn pdf_compress_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    // A `quality` field may be sent; lossless compression has no knob.
    let upload = form.take_file("file").ok_or(Error::NoFile)?;
    let result = blocking(move || pdf::compress(&upload.bytes)).await?;

    let mut response = attachment(result.bytes, PDF_MIME, "compressed.pdf");
    set_header(&mut response, "x-original-size", result.original_size as u64);
    set_header(&mut response, "x-compressed-size", result.compressed_size as u64);
    Ok(response)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedImage {
    pub name: String,
    pub url: String,
    pub original_size: usize,
    pub compressed_size: usize,
}

#[derive(Debug, Serialize)]
pub struct CompressedImages {
    pub results: Vec<CompressedImage>,
}

pub async fn image_compress(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = image_compress_inner(&state, &caller, multipart);
    run_tool("compress images", metered(&state, &caller, work)).await
}

async fn image_compress_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let quality = form
        .text("quality")
        .and_then(leading_int)
        .filter(|&q| q > 0)
        .map(|q| q.min(100) as u8)
        .unwrap_or(DEFAULT_COMPRESS_QUALITY);
    let uploads = form.take_files("files");
    if uploads.is_empty() {
        return Err(Error::NoFiles);
    }

    let results = blocking(move || {
        uploads
            .into_iter()
            .map(|upload| {
                let encoded = raster::compress(&upload.bytes, quality)?;
                Ok(CompressedImage {
                    url: format!(
                        "data:{};base64,{}",
                        encoded.format.mime_type(),
                        STANDARD.encode(&encoded.bytes)
                    ),
                    name: upload.file_name,
                    original_size: upload.bytes.len(),
                    compressed_size: encoded.bytes.len(),
                })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?;

    let response = Json(CompressedImages { results }).into_response();
    Ok(response)
}

pub async fn image_convert(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = image_convert_inner(&state, &caller, multipart);
    run_tool("convert image", metered(&state, &caller, work)).await
}

async fn image_convert_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let upload = form.take_file("file").ok_or(Error::NoFile)?;
    let requested = form.text("format").unwrap_or("png").to_ascii_lowercase();
    let target: OutputFormat = requested.parse()?;

    let converted = blocking(move || raster::convert(&upload.bytes, target)).await?;

    // Keep the extension the caller asked for ("jpeg" stays "jpeg")
    let file_name = format!("converted.{}", requested);
    let response = attachment(converted.bytes, converted.format.mime_type(), &file_name);
    Ok(response)
}

pub async fn image_resize(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = image_resize_inner(&state, &caller, multipart);
    run_tool("resize image", metered(&state, &caller, work)).await
}

async fn image_resize_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let upload = form.take_file("file").ok_or(Error::NoFile)?;
    // Non-positive or missing sizes become 0 and fail validation; oversized
    // ones saturate and fail the upper bound.
    let dimension = |name| {
        form.text(name)
            .and_then(leading_int)
            .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0)
    };
    let (width, height) = (dimension("width"), dimension("height"));
    raster::validate_dimensions(width, height)?;

    let resized = blocking(move || raster::resize(&upload.bytes, width, height)).await?;
    let response = attachment(resized.bytes, resized.format.mime_type(), "resized.png");
    Ok(response)
}

pub async fn images_to_pdf(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let work = images_to_pdf_inner(&state, &caller, multipart);
    run_tool("create PDF", metered(&state, &caller, work)).await
}

async fn images_to_pdf_inner(state: &AppState, caller: &Caller, multipart: Multipart) -> Result<Response> {
    let mut form = read_form(state, caller, multipart).await?;

    let uploads = form.take_files("files");
    if uploads.is_empty() {
        return Err(Error::NoFiles);
    }

    let bytes = blocking(move || {
        let images: Vec<&[u8]> = uploads.iter().map(|u| u.bytes.as_slice()).collect();
        pdf::images_to_pdf(&images)?.to_bytes()
    })
    .await?;

    Ok(attachment(bytes, PDF_MIME, "images.pdf"))
}
