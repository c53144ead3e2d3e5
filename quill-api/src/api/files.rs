use quill::{Context, UploadFile};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Context)]
pub struct Upload {
    files: UploadFile,
}

#[derive(Debug, Serialize)]
struct FileInfo<'a> {
    name: &'a str,
    size: usize,
}

/// Report the name and size of every uploaded file.
pub async fn upload(cx: Upload) -> Value {
    let files = cx
        .files
        .iter()
        .map(|(name, data)| FileInfo {
            name,
            size: data.len(),
        })
        .collect::<Vec<_>>();

    tracing::info!(count = files.len(), "received upload");

    json!({ "files": files })
}
