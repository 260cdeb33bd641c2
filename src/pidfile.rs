//! # PIDFILE
//!
//! Single-instance guard: an advisory, exclusive, non-blocking `flock` on
//! a well-known path, holding the daemon's PID in decimal text. A stale
//! pidfile (the recorded PID is no longer alive) may be overwritten.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::error::{PceError, Result};

/// Default location, matching the reference implementation.
pub const DEFAULT_PATH: &str = "/var/run/pce.pid";

fn io_err(path: &str, source: std::io::Error) -> PceError {
    PceError::PidfileIo {
        path: path.to_string(),
        source,
    }
}

/// Checks whether `path` is held by a live process other than the
/// current one. Returns `Ok(None)` if the pidfile is absent, unreadable,
/// unparsable, held by this process, or stale (its PID is no longer
/// alive). Returns `Ok(Some(pid))` if another live process holds it.
pub fn check(path: &Path) -> Result<Option<i32>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path.display().to_string(), err)),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Ok(None);
    }
    let pid: i32 = match contents.trim().parse() {
        Ok(pid) => pid,
        Err(_) => return Ok(None),
    };

    if pid == std::process::id() as i32 {
        return Ok(None);
    }

    // `kill(pid, 0)` sends no signal; it only probes whether the process
    // exists and we have permission to signal it. ESRCH means stale.
    let alive = unsafe { libc::kill(pid, 0) == 0 || *libc::__errno_location() != libc::ESRCH };
    if alive {
        Ok(Some(pid))
    } else {
        Ok(None)
    }
}

/// Creates (or overwrites a stale) pidfile at `path`, taking a
/// non-blocking exclusive advisory lock first. Returns an error if the
/// lock is already held by a live process.
pub fn create(path: &Path) -> Result<File> {
    if let Some(pid) = check(path)? {
        return Err(PceError::PidfileHeld {
            path: path.display().to_string(),
            pid,
        });
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .map_err(|err| io_err(&path.display().to_string(), err))?;

    let lock_result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if lock_result != 0 {
        return Err(PceError::PidfileHeld {
            path: path.display().to_string(),
            pid: 0,
        });
    }

    let mut file = file;
    writeln!(file, "{}", std::process::id()).map_err(|err| io_err(&path.display().to_string(), err))?;
    file.flush().map_err(|err| io_err(&path.display().to_string(), err))?;
    Ok(file)
}

/// Removes the pidfile. Best-effort: a missing file is not an error.
pub fn delete(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(&path.display().to_string(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("pce-pidfile-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn create_check_delete_round_trip() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        create(&path).unwrap();
        // We hold the lock ourselves; check() treats our own pid as "not held".
        assert_eq!(check(&path).unwrap(), None);

        delete(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn check_reports_stale_pidfile_as_unheld() {
        let path = temp_path("stale");
        let _ = std::fs::remove_file(&path);
        // pid 1 is init and definitely alive on any real system, so we
        // instead fabricate an unlikely-to-exist high pid. This is
        // inherently a little fuzzy on a live system; rather than probe
        // for a "certainly dead" pid we rely on a pid far past any
        // realistic process table entry.
        std::fs::write(&path, "2147483647\n").unwrap();
        let result = check(&path).unwrap();
        assert!(result.is_none(), "expected a pid this large to read as stale, got {result:?}");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn delete_is_idempotent_on_a_missing_file() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        delete(&path).unwrap();
    }
}
