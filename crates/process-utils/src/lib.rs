//! Small process-related helpers for spawning external engines.

use std::ffi::OsStr;
use std::path::PathBuf;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Resolve an executable.
///
/// An explicit override wins when it resolves; otherwise each candidate name is
/// looked up on `PATH` in order and the first hit is returned.
pub fn locate_program<S: AsRef<OsStr>>(
    override_path: Option<&OsStr>,
    candidates: &[S],
) -> Option<PathBuf> {
    if let Some(path) = override_path
        && let Ok(found) = which::which(path)
    {
        return Some(found);
    }

    candidates
        .iter()
        .find_map(|name| which::which(name.as_ref()).ok())
}
