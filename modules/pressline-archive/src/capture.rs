use std::path::Path;

use serde_json::Value;
use tracing::error;

use crate::error::{ArchiveError, Result};
use crate::fetch::{FetchRequest, PageFetcher};
use crate::sink::JsonlSink;

/// Fetch one page, append its body to the raw stream, then parse it.
///
/// The raw line is written before the status check and the parse, so error
/// bodies and malformed payloads are still on disk for replay. Any failure
/// here is page-level and ends the pass.
pub async fn fetch_json(
    fetcher: &dyn PageFetcher,
    sink: &JsonlSink,
    raw_path: &Path,
    request: &FetchRequest,
    stage: &'static str,
) -> Result<Value> {
    let fetched = fetcher.fetch(request).await?;
    sink.append_raw(raw_path, &fetched.body).await?;

    if !fetched.is_success() {
        error!(stream = %raw_path.display(), stage, url = %request.url, status = fetched.status, "page request rejected");
        return Err(ArchiveError::Api {
            url: request.url.clone(),
            status: fetched.status,
            body: fetched.body,
        });
    }

    serde_json::from_str(&fetched.body).map_err(|e| {
        error!(stream = %raw_path.display(), stage, url = %request.url, error = %e, "page body is not JSON");
        ArchiveError::malformed(stage, e.to_string())
    })
}
