use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use estate_gate::IncomingFile;
use estate_saga::AdmittedFile;
use estate_types::FieldMap;
use serde_json::Value;

use crate::error::{ServerError, ServerResult};

/// A request body split into plain fields and uploaded files.
#[derive(Debug, Default)]
pub struct DecodedBody {
    pub fields: FieldMap,
    pub files: Vec<AdmittedFile>,
}

impl DecodedBody {
    /// Admission-gate view of the uploaded files.
    pub fn incoming(&self) -> Vec<IncomingFile> {
        self.files
            .iter()
            .map(|f| IncomingFile {
                field: f.field.clone(),
                file_name: f.file_name.clone(),
                content_type: f.content_type.clone(),
                size: f.bytes.len() as u64,
            })
            .collect()
    }
}

/// Decode a `multipart/form-data` or JSON body. An empty body decodes to no
/// fields.
pub async fn decode_body(request: Request) -> ServerResult<DecodedBody> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        return read_multipart(multipart).await;
    }

    let raw = Bytes::from_request(request, &())
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecodedBody::default());
    }
    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(fields)) => Ok(DecodedBody {
            fields,
            files: Vec::new(),
        }),
        Ok(_) => Err(ServerError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(ServerError::BadRequest(format!("invalid JSON body: {e}"))),
    }
}

/// Text parts become string fields (repeated names collect into a list);
/// parts with a filename become files.
pub async fn read_multipart(mut multipart: Multipart) -> ServerResult<DecodedBody> {
    let mut decoded = DecodedBody::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if name.is_empty() {
            continue;
        }

        if let Some(file_name) = field.file_name().map(str::to_owned) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            tracing::debug!(field = %name, file_name = %file_name, size = bytes.len(), "file part received");
            decoded
                .files
                .push(AdmittedFile::new(name, file_name, content_type, bytes));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        match decoded.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(Value::String(text)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(text)]);
            }
            None => {
                decoded.fields.insert(name, Value::String(text));
            }
        }
    }
    Ok(decoded)
}
