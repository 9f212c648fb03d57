//! Shared SQLite connection handling.
//!
//! Every durable store (mail, events, sessions, merge queue) opens its own
//! `.db` file under `.overstory/` but shares the same open discipline: WAL
//! journal mode for concurrent readers, a `busy_timeout` bounding how long a
//! writer waits for the single-writer lock, and foreign keys on.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

/// Maximum time a writer waits for the SQLite lock before surfacing `SQLITE_BUSY`.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Open a connection configured the way every Overstory store expects:
/// WAL mode, foreign keys enabled, and the shared busy timeout.
pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open an in-memory connection with the same pragmas, for tests.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// A store's single-writer-discipline wrapper: one `Mutex<Connection>` shared
/// across however many `Arc`s point at the store. A plain mutex, not a
/// read/write lock, since SQLite already serializes writers itself under WAL
/// and the busy timeout absorbs brief contention.
pub type SharedConnection = Mutex<Connection>;
