// SPDX-License-Identifier: GPL-3.0-only

//! Diagnostic per-frame dump
//!
//! Writes one binary file per published frame, `00000.bin` onward, into a
//! dedicated directory created on first use. This path is best-effort only:
//! any I/O failure is logged and swallowed, never surfaced to the pipeline.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Sequentially numbered binary frame writer
pub struct FrameDumper {
    dir: PathBuf,
    frame_index: u32,
    dir_ready: bool,
}

impl FrameDumper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frame_index: 0,
            dir_ready: false,
        }
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u32 {
        self.frame_index
    }

    /// Write one frame's bytes to the next numbered file. Failures are
    /// logged and skipped; the frame index only advances on success.
    pub fn write(&mut self, bytes: &[u8]) {
        if !self.dir_ready {
            if let Err(e) = fs::create_dir_all(&self.dir) {
                warn!(dir = ?self.dir, error = %e, "Failed to create dump directory");
                return;
            }
            self.dir_ready = true;
        }

        let path = self.dir.join(format!("{:05}.bin", self.frame_index));
        match fs::write(&path, bytes) {
            Ok(()) => {
                debug!(path = ?path, len = bytes.len(), "Wrote frame dump");
                self.frame_index += 1;
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to write frame dump");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("depth-normals-dump-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_numbered_files() {
        let dir = scratch_dir("numbered");
        let _ = fs::remove_dir_all(&dir);

        let mut dumper = FrameDumper::new(&dir);
        dumper.write(&[1, 2, 3]);
        dumper.write(&[4, 5]);

        assert_eq!(dumper.frames_written(), 2);
        assert_eq!(fs::read(dir.join("00000.bin")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(dir.join("00001.bin")).unwrap(), vec![4, 5]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_no_directory_until_first_write() {
        let dir = scratch_dir("lazy");
        let _ = fs::remove_dir_all(&dir);

        let dumper = FrameDumper::new(&dir);
        assert!(!dir.exists());
        drop(dumper);
        assert!(!dir.exists());
    }
}
