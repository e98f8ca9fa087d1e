use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{sleep, Instant};
use tracing::warn;

const POLL: Duration = Duration::from_millis(10);

static ACQUISITIONS: AtomicU64 = AtomicU64::new(0);

/// Exclusive advisory lock backed by a `create_new` file, released on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub async fn acquire(path: PathBuf, timeout: Duration, stale_after: Duration) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", token())?;
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if let Some(observed) = stale_contents(&path, stale_after) {
                        if reclaim(&path, &observed) {
                            warn!(path = %path.display(), "removed abandoned lock file");
                            continue;
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("lock {} held past {:?}", path.display(), timeout),
                        ));
                    }
                    sleep(POLL).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Unique per acquisition, so a reclaimer can tell one holder from the next.
fn token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!(
        "{} {nanos} {}",
        std::process::id(),
        ACQUISITIONS.fetch_add(1, Ordering::Relaxed)
    )
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age >= stale_after)
        .unwrap_or(false)
}

fn stale_contents(path: &Path, stale_after: Duration) -> Option<String> {
    if !is_stale(path, stale_after) {
        return None;
    }
    fs::read_to_string(path).ok()
}

/// Moves the lock aside and deletes it only if it is still the file that was
/// judged stale. A fresh lock taken in between is linked back in place.
fn reclaim(path: &Path, observed: &str) -> bool {
    let tombstone = path.with_extension(format!("stale.{}", token().replace(' ', "-")));
    if fs::rename(path, &tombstone).is_err() {
        return false;
    }
    let moved = fs::read_to_string(&tombstone).unwrap_or_default();
    let reclaimed = moved == observed;
    if !reclaimed {
        if let Err(err) = fs::hard_link(&tombstone, path) {
            warn!(path = %path.display(), error = %err, "could not restore live lock file");
        }
    }
    let _ = fs::remove_file(&tombstone);
    reclaimed
}
