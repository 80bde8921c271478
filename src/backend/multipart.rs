//! `multipart/form-data` body for single-file uploads.

use chrono::Utc;

/// Content type hinted from the file extension. The backend decides whether
/// the file is acceptable; this only labels the part.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => "application/json",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

/// A fully assembled multipart body and its `Content-Type` header value.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Build a body carrying one file in the `file` field.
pub fn single_file(bytes: &[u8], file_name: &str) -> MultipartBody {
    let boundary = format!(
        "----vcdash{:x}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    build(&boundary, "file", bytes, file_name)
}

fn build(boundary: &str, field: &str, bytes: &[u8], file_name: &str) -> MultipartBody {
    let safe_name = file_name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{safe_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type_for(file_name)).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes: body,
    }
}
