use std::fs::OpenOptions;

/// Permission bits for files created by cryptfile: owner read/write only.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// How the backing file of an encrypted stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only. The file must exist.
    Read,
    /// Write only. Created if missing, truncated if present.
    Write,
    /// Read and write. Created if missing, never truncated.
    ReadWrite,
    /// Write only, appending. Created if missing.
    Append,
}

impl OpenMode {
    /// Whether handles opened in this mode accept writes.
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Build the `OpenOptions` for this mode, with owner-only permission
    /// bits on platforms that support them.
    pub fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => {
                options.read(true);
            }
            OpenMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            OpenMode::ReadWrite => {
                options.read(true).write(true).create(true).truncate(false);
            }
            OpenMode::Append => {
                options.append(true).create(true);
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(DEFAULT_FILE_MODE);
        }

        options
    }
}
