//! One computer's share of the runtime.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cubicle_mainthread::{Executor, MainThread, MetricsObserver};
use cubicle_protocol::{
    FileUpload, InputEvent, InputState, TerminalState, UploadError, UploadFileMessage, UploadLimits,
    UploadReceiver,
};
use cubicle_terminal::Terminal;
use cubicle_vfs::path::{combine, get_name, sanitize_path};
use cubicle_vfs::{FileErrorKind, FileOperationError, FileSystem, WritableFileMount};
use thiserror::Error;

use crate::config::CubicleConfig;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    File(#[from] FileOperationError),
}

/// Everything one computer owns: its screen, its disk, its slot on the main
/// thread, and the state of the client currently viewing it.
pub struct ComputerEnvironment {
    id: u32,
    root: PathBuf,
    terminal: Arc<Terminal>,
    filesystem: FileSystem,
    executor: Executor,
    input: InputState,
    uploads: UploadReceiver,
    upload_limits: UploadLimits,
}

impl std::fmt::Debug for ComputerEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputerEnvironment")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("filesystem", &self.filesystem)
            .field("executor", &self.executor)
            .finish()
    }
}

impl ComputerEnvironment {
    /// Set up computer `id`, storing its disk in `save_dir/computer/<id>`.
    ///
    /// The directory is only created once something is written to it.
    pub fn new(
        id: u32,
        config: &CubicleConfig,
        save_dir: &Path,
        main_thread: &Arc<MainThread>,
        metrics: Arc<dyn MetricsObserver>,
    ) -> Self {
        let root = save_dir.join("computer").join(id.to_string());
        let mount = WritableFileMount::new(root.clone(), config.computer_space_limit);
        tracing::debug!(id, root = %root.display(), "creating computer environment");
        Self {
            id,
            root,
            terminal: Arc::new(Terminal::new(
                config.terminal_width,
                config.terminal_height,
                true,
            )),
            filesystem: FileSystem::with_root("hdd", Arc::new(mount)),
            executor: main_thread.create_executor(metrics),
            input: InputState::new(),
            uploads: UploadReceiver::new(),
            upload_limits: config.upload_limits(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Host directory backing the computer's disk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn terminal(&self) -> &Arc<Terminal> {
        &self.terminal
    }

    pub fn filesystem(&self) -> &FileSystem {
        &self.filesystem
    }

    /// For attaching further mounts, such as disk drives.
    pub fn filesystem_mut(&mut self) -> &mut FileSystem {
        &mut self.filesystem
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn upload_limits(&self) -> &UploadLimits {
        &self.upload_limits
    }

    /// Snapshot the terminal for a client.
    pub fn terminal_state(&self, compress: bool) -> TerminalState {
        TerminalState::from_terminal(Some(&self.terminal), compress)
    }

    /// Note an input event from the viewing client before it is passed on.
    pub fn handle_input(&mut self, event: InputEvent) -> InputEvent {
        self.input.observe(&event);
        event
    }

    /// The viewing client went away. Returns the events releasing whatever it
    /// was holding down.
    pub fn close_client(&mut self) -> Vec<InputEvent> {
        self.input.release_all()
    }

    /// Feed one upload packet in. Returns the files once the upload is
    /// complete and verified.
    pub fn receive_upload(
        &mut self,
        message: UploadFileMessage,
    ) -> Result<Option<Vec<FileUpload>>, EnvironmentError> {
        Ok(self.uploads.receive(message)?)
    }

    /// Write uploaded files into `directory`, returning the paths written.
    ///
    /// Only the final component of each name is used. Existing files are
    /// overwritten.
    pub fn save_upload(&self, directory: &str, files: &[FileUpload]) -> Result<Vec<String>, EnvironmentError> {
        let directory = sanitize_path(directory, false);
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let sanitized = sanitize_path(file.name(), false);
            let name = get_name(&sanitized);
            if sanitized.is_empty() || name == ".." {
                return Err(FileOperationError::new(file.name(), FileErrorKind::AccessDenied).into());
            }

            let path = combine(&directory, &name);
            let mut handle = self.filesystem.open_for_write(&path, false)?;
            handle
                .write_all(file.contents())
                .and_then(|()| handle.flush())
                .map_err(|error| FileOperationError::from(error).or_path(&path))?;
            written.push(path);
        }
        tracing::debug!(id = self.id, files = written.len(), "saved upload");
        Ok(written)
    }
}
