//! Static single-page application bundle.

use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Entry document served for paths with no matching file.
pub const INDEX_FILE: &str = "index.html";

/// Serve files under `dist_dir`, falling back to its `index.html` so that
/// client-side routes resolve to the application.
pub fn spa_service(dist_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dist_dir).fallback(ServeFile::new(dist_dir.join(INDEX_FILE)))
}
