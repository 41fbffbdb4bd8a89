use std::path::{Path, PathBuf};

use maclink_transport::Endpoint;

/// A socket path inside a private temp directory, removed on drop.
pub(crate) struct TempSocket {
    dir: PathBuf,
    path: PathBuf,
}

impl TempSocket {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::from_path(&self.path)
    }
}

impl Drop for TempSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub(crate) fn temp_socket(tag: &str) -> TempSocket {
    let dir = std::env::temp_dir().join(format!(
        "{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("s.sock");
    TempSocket { dir, path }
}
