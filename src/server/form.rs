use axum::extract::multipart::{Field, Multipart, MultipartError};
use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fully read multipart form. Parts with a filename are uploads, the rest
/// are text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    uploads: Vec<Upload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part, failing as soon as one upload passes `limit_mb`.
    pub async fn read(mut multipart: Multipart, limit_mb: u64) -> Result<Self> {
        let limit_bytes = (limit_mb * 1024 * 1024) as usize;
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = read_limited(field, &file_name, limit_bytes, limit_mb).await?;
                    form.uploads.push(Upload {
                        field: name,
                        file_name,
                        bytes,
                    });
                }
                None => {
                    let text = field.text().await.map_err(bad_form)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// A text field, treating blank values as absent.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Move the matching uploads out of the form.
    pub fn take_files(&mut self, field: &str) -> Vec<Upload> {
        let (taken, kept) = std::mem::take(&mut self.uploads)
            .into_iter()
            .partition(|u| u.field == field);
        self.uploads = kept;
        taken
    }

    pub fn take_file(&mut self, field: &str) -> Option<Upload> {
        let index = self.uploads.iter().position(|u| u.field == field)?;
        Some(self.uploads.remove(index))
    }
}

async fn read_limited(
    mut field: Field<'_>,
    file_name: &str,
    limit_bytes: usize,
    limit_mb: u64,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(bad_form)? {
        if bytes.len() + chunk.len() > limit_bytes {
            return Err(Error::PayloadTooLarge {
                name: file_name.to_string(),
                limit_mb,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn bad_form(e: MultipartError) -> Error {
    Error::BadForm {
        reason: e.body_text(),
    }
}
