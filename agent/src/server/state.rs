//! Server state

use std::path::PathBuf;
use std::sync::Arc;

use crate::device::orchestrator::Orchestrator;
use crate::filesys::file::File;
use crate::utils::generate_uuid;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,

    /// Number of log lines served by `/logs`
    pub log_tail_lines: usize,

    /// Directory firmware uploads are streamed into
    pub upload_dir: PathBuf,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, log_tail_lines: usize, upload_dir: PathBuf) -> Self {
        Self {
            orchestrator,
            log_tail_lines,
            upload_dir,
        }
    }

    /// Fresh file for one firmware upload
    pub fn upload_file(&self) -> File {
        File::new(self.upload_dir.join(format!("upload-{}.raucb", generate_uuid())))
    }
}
