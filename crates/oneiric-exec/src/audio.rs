//! Audio capture, on-disk storage of sealed recordings, and playback.

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;

use crate::contracts::CapabilityError;

pub const CHUNK_SIZE: usize = 4096;

/// Exclusive audio input. Opening fails with `PermissionDenied` when the device is unavailable.
pub trait AudioSource: Send + Sync {
    fn open(&self) -> Result<AudioStream, CapabilityError>;
}

/// An open input. Dropping it releases the device.
pub struct AudioStream {
    reader: Box<dyn Read + Send>,
    child: Option<Child>,
}

impl AudioStream {
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    /// Next chunk of audio, or `None` once the input is exhausted.
    pub fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0_u8; CHUNK_SIZE];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays an existing recording, for headless capture and tests.
#[derive(Debug, Clone)]
pub struct FileAudioSource {
    path: PathBuf,
}

impl FileAudioSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSource for FileAudioSource {
    fn open(&self) -> Result<AudioStream, CapabilityError> {
        let file = File::open(&self.path).map_err(|err| {
            CapabilityError::PermissionDenied(format!("{}: {err}", self.path.display()))
        })?;
        Ok(AudioStream::from_reader(file))
    }
}

/// Streams the stdout of a recorder program such as `arecord`.
#[derive(Debug, Clone)]
pub struct CommandAudioSource {
    program: String,
    args: Vec<String>,
}

impl CommandAudioSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl AudioSource for CommandAudioSource {
    fn open(&self) -> Result<AudioStream, CapabilityError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                CapabilityError::PermissionDenied(format!("failed to start {}: {err}", self.program))
            })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CapabilityError::PermissionDenied(format!(
                "{} has no output stream",
                self.program
            )));
        };
        tracing::info!(program = %self.program, "recorder started");
        Ok(AudioStream {
            reader: Box::new(stdout),
            child: Some(child),
        })
    }
}

/// Sealed recordings stored under the data directory, addressed by their `audio/<id>.webm`
/// reference.
#[derive(Debug, Clone)]
pub struct AudioVault {
    root: PathBuf,
}

impl AudioVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a reference inside the vault. Absolute paths and `..` are rejected.
    pub fn path_for(&self, reference: &str) -> io::Result<PathBuf> {
        let relative = Path::new(reference);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || reference.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid audio reference: {reference}"),
            ));
        }
        Ok(self.root.join(relative))
    }

    pub fn store(&self, reference: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(reference)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Removes the stored file. A missing file is not an error.
    pub fn release(&self, reference: &str) -> io::Result<()> {
        let path = self.path_for(reference)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Plays files through an external player command.
#[derive(Debug, Clone)]
pub struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn play(&self, path: &Path) -> io::Result<PlaybackHandle> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(PlaybackHandle {
            child: Arc::new(Mutex::new(child)),
        })
    }
}

/// Shared handle to a running player. Clones refer to the same process.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    child: Arc<Mutex<Child>>,
}

impl PlaybackHandle {
    pub fn is_finished(&self) -> bool {
        match self.child.lock() {
            Ok(mut child) => !matches!(child.try_wait(), Ok(None)),
            Err(_) => true,
        }
    }

    pub fn stop(&self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
