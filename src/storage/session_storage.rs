use std::{
    future::{self, Future},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use futures::{stream, StreamExt};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::{tracking::session::Session, utils::time::session_file_stem};

use super::entities::SessionEntity;

const SESSION_EXTENSION: &str = "json";

/// A session read back from storage together with the file it came from.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub path: PathBuf,
    pub session: Session,
}

/// Interface for abstracting storage of finished sessions.
pub trait SessionStorage {
    /// Writes a session into a new document and returns its location.
    fn save(&self, session: &Session) -> impl Future<Output = Result<PathBuf>>;

    /// Every readable session, ordered by start time. Unstarted sessions come first.
    fn list(&self) -> impl Future<Output = Result<Vec<StoredSession>>>;

    /// Looks a session up by its exact id. When several match the latest one wins.
    fn find(&self, id: &str) -> impl Future<Output = Result<Option<StoredSession>>> {
        async move {
            let sessions = self.list().await?;
            Ok(sessions.into_iter().rev().find(|v| v.session.id() == id))
        }
    }
}

/// Stores every session as a separate json document in one directory.
pub struct SessionStorageImpl {
    session_dir: PathBuf,
}

impl SessionStorageImpl {
    pub fn new(session_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self { session_dir })
    }

    /// Creates a new document named after the session start, or after its id for unstarted
    /// sessions. Taken names get a numeric suffix.
    async fn create_free_file(&self, session: &Session) -> Result<(PathBuf, File)> {
        let stem = match session.start_time() {
            Some(start) => session_file_stem(&start),
            None => sanitize_file_stem(session.id()),
        };
        let mut path = self
            .session_dir
            .join(format!("{stem}.{SESSION_EXTENSION}"));
        let mut counter = 1;
        loop {
            match File::options().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    path = self
                        .session_dir
                        .join(format!("{stem}-{counter}.{SESSION_EXTENSION}"));
                    counter += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create session file {path:?}"))
                }
            }
        }
    }

    async fn session_paths(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.session_dir).await?;
        let mut paths = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|v| v == SESSION_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl SessionStorage for SessionStorageImpl {
    async fn save(&self, session: &Session) -> Result<PathBuf> {
        let (path, file) = self.create_free_file(session).await?;
        write_locked(file, &path, &session.to_entity()).await?;
        debug!("Saved session {} to {path:?}", session.id());
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<StoredSession>> {
        let paths = self.session_paths().await?;

        let mut sessions = stream::iter(paths)
            .map(|path| async move {
                let session = Session::load(&path).await;
                (path, session)
            })
            .buffered(4)
            .filter_map(|(path, session)| {
                future::ready(match session {
                    Ok(session) => Some(StoredSession { path, session }),
                    Err(e) => {
                        // A broken document shouldn't hide the rest of the history
                        warn!("Skipping unreadable session {path:?}: {e:?}");
                        None
                    }
                })
            })
            .collect::<Vec<_>>()
            .await;

        sessions.sort_by_key(|v| v.session.start_time());
        Ok(sessions)
    }
}

fn sanitize_file_stem(id: &str) -> String {
    let stem = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>();
    if stem.is_empty() {
        "session".into()
    } else {
        stem
    }
}

/// Writes a session document while holding an exclusive lock on the file.
pub async fn write_session_document(path: &Path, entity: &SessionEntity) -> Result<()> {
    let file = File::options()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await
        .with_context(|| format!("Failed to open session file {path:?}"))?;
    write_locked(file, path, entity).await
}

async fn write_locked(mut file: File, path: &Path, entity: &SessionEntity) -> Result<()> {
    let buffer = serde_json::to_vec_pretty(entity)?;

    file.lock_exclusive()?;
    let result = async {
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;
    file.unlock_async().await?;
    result.with_context(|| format!("Failed to write session file {path:?}"))
}

pub async fn read_session_document(path: &Path) -> Result<SessionEntity> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("Failed to open session file {path:?}"))?;
    file.lock_shared()?;
    let mut content = String::new();
    let result = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    result?;

    serde_json::from_str(&content).with_context(|| format!("Malformed session file {path:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use anyhow::Result;
    use chrono::{DateTime, Duration, Local, TimeZone};
    use futures::future::join_all;
    use tempfile::tempdir;

    use crate::tracking::{kind::ActivityKind, session::Session};

    use super::{sanitize_file_stem, SessionStorage, SessionStorageImpl};

    fn at(seconds: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn finished_session(id: &str, offset: i64) -> Session {
        let mut session = Session::new(Some(id.into()));
        session.start_at(at(offset));
        session.log_event_at(ActivityKind::Away, at(offset + 20));
        session.end_at(at(offset + 30));
        session
    }

    #[tokio::test]
    async fn test_session_storage_basic() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;

        let session = finished_session("first", 0);
        let path = storage.save(&session).await?;
        assert_eq!(
            path.file_name().and_then(|v| v.to_str()),
            Some("2025-03-15_09-00-00.json")
        );

        let sessions = storage.list().await?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session, session);
        Ok(())
    }

    #[tokio::test]
    async fn test_session_storage_same_start() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;

        let first = storage.save(&finished_session("a", 0)).await?;
        let second = storage.save(&finished_session("b", 0)).await?;
        assert_ne!(first, second);
        assert_eq!(storage.list().await?.len(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_with_same_start() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;

        let sessions = (0..8)
            .map(|i| finished_session(&format!("run-{i}"), 0))
            .collect::<Vec<_>>();
        let paths = join_all(sessions.iter().map(|v| storage.save(v)))
            .await
            .into_iter()
            .collect::<Result<HashSet<_>>>()?;
        assert_eq!(paths.len(), 8);

        let mut ids = storage
            .list()
            .await?
            .into_iter()
            .map(|v| v.session.id().to_owned())
            .collect::<Vec<_>>();
        ids.sort();
        assert_eq!(
            ids,
            (0..8).map(|i| format!("run-{i}")).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_session_storage_ordering_and_find() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;

        storage.save(&finished_session("late", 3600)).await?;
        storage.save(&finished_session("early", 0)).await?;

        let sessions = storage.list().await?;
        let ids = sessions.iter().map(|v| v.session.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["early", "late"]);

        let found = storage.find("late").await?;
        assert_eq!(found.map(|v| v.session.start_time()), Some(Some(at(3600))));
        assert!(storage.find("missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_storage_skips_malformed() -> Result<()> {
        let dir = tempdir()?;
        let storage = SessionStorageImpl::new(dir.path().to_owned())?;
        storage.save(&finished_session("valid", 0)).await?;
        std::fs::write(dir.path().join("broken.json"), "{ not json")?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let sessions = storage.list().await?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session.id(), "valid");
        Ok(())
    }

    #[tokio::test]
    async fn test_load_malformed_propagates_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2")?;
        assert!(Session::load(&path).await.is_err());
        assert!(Session::load(&dir.path().join("absent.json")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_shorter_document() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("session.json");
        let long = finished_session(&"x".repeat(500), 0);
        long.save(&path).await?;
        let short = finished_session("y", 0);
        short.save(&path).await?;

        assert_eq!(Session::load(&path).await?, short);
        Ok(())
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("FocusDock Monday 02.45 PM"), "FocusDock_Monday_02_45_PM");
        assert_eq!(sanitize_file_stem(""), "session");
    }
}
