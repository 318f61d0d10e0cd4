use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

/// Filesystem operations used by the replacement protocol.
///
/// [`OsFs`] is the real implementation. The protocol is written against this
/// trait so tests can make individual steps fail.
pub trait ReplaceFs {
    /// Writes `content` to `path` with permission bits `mode`, replacing any
    /// existing file, and syncs it to durable storage. Returns the number of
    /// bytes written.
    fn write_synced(&self, path: &Path, content: &mut dyn Read, mode: u32) -> io::Result<u64>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Makes a leftover file hidden and inert when it cannot be deleted.
    fn hide(&self, path: &Path) -> io::Result<()>;
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl ReplaceFs for OsFs {
    fn write_synced(&self, path: &Path, content: &mut dyn Read, mode: u32) -> io::Result<u64> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }

        let mut file = options.open(path)?;
        let written = io::copy(content, &mut file)?;

        // The open mode is filtered through the umask; set the exact bits.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        file.sync_all()?;
        trace!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn hide(&self, path: &Path) -> io::Result<()> {
        hide_file(path)
    }
}

// The staged name already starts with a dot; clearing the execute bits keeps
// the leftover from being run by accident.
#[cfg(unix)]
fn hide_file(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(windows)]
fn hide_file(path: &Path) -> io::Result<()> {
    let status = std::process::Command::new("attrib").arg("+H").arg(path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("attrib +H {} exited with {status}", path.display())))
    }
}

#[cfg(not(any(unix, windows)))]
fn hide_file(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Permission bits of a file, without the file-type bits.
#[cfg(unix)]
pub(crate) fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(crate) fn permission_bits(_metadata: &fs::Metadata) -> u32 {
    0o755
}
