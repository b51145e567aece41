//! Savepoint scope over a borrowed connection.
//!
//! `rusqlite::Savepoint` needs `&mut Connection`, but repositories only
//! borrow the caller's session (which may itself be an open
//! `rusqlite::Transaction`). A named SQL savepoint nests inside whatever the
//! caller has open and commits on its own when nothing is.

use rusqlite::Connection;

pub(crate) struct SavepointScope<'conn> {
    conn: &'conn Connection,
    name: &'static str,
    finished: bool,
}

impl<'conn> SavepointScope<'conn> {
    pub(crate) fn begin(conn: &'conn Connection, name: &'static str) -> rusqlite::Result<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            name,
            finished: false,
        })
    }

    pub(crate) fn release(mut self) -> rusqlite::Result<()> {
        self.finished = true;
        self.conn.execute_batch(&format!("RELEASE {};", self.name))
    }
}

impl Drop for SavepointScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let rollback = format!("ROLLBACK TO {name}; RELEASE {name};", name = self.name);
        if let Err(err) = self.conn.execute_batch(&rollback) {
            log::error!(
                "event=savepoint_rollback module=db status=error savepoint={} error={}",
                self.name,
                err
            );
        }
    }
}
