use std::path::Path;

use jobless_domain::entities::WorkerIdentity;
use tracing::warn;

const FALLBACK_NAME: &str = "jobless";

/// Identity of the current process: hostname, pid and executable base name
pub fn detect_identity() -> WorkerIdentity {
    let host = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Could not read hostname, using localhost: {}", e);
            "localhost".to_string()
        }
    };

    let name = std::env::args_os()
        .next()
        .map(|arg0| base_name(&arg0.to_string_lossy()))
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    WorkerIdentity::new(host, std::process::id(), name)
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}
