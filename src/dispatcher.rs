//! Routes a resolved request to one of {embedded HKP action, CGI child,
//! static file, directory listing, error}, and owns the admission/child-
//! bookkeeping discipline around spawning workers. Grounded on the
//! teacher's `router.rs` dispatch-table shape and `src/cgi.rs`'s
//! child-tracking, generalized to the design's route table and
//! fork/setpgid process-group isolation the teacher lacks. The soft-then-
//! hard CGI kill deadline itself is enforced by a watchdog thread in
//! `server.rs`, not by anything here.

use crate::error::{Error, Result};
use crate::patterns::Pattern;
use crate::resolver::ResolvedResource;

pub const CGI_BYTECOUNT: u64 = 0; // bookkeeping estimate; real count is unknown until the child exits

#[derive(Debug)]
pub enum Route {
    HkpLookup,
    HkpAdd,
    Cgi,
    StaticFile,
    Directory,
    DirectoryRedirect,
}

/// First-match-wins route table, applied before filesystem resolution for
/// the embedded-action prefixes.
pub fn route_embedded(path: &str) -> Option<Route> {
    match path {
        p if p == "pks/lookup" || p.starts_with("pks/lookup?") => Some(Route::HkpLookup),
        p if p == "pks/add" => Some(Route::HkpAdd),
        _ => None,
    }
}

/// Resolver-driven routing once no embedded action matched: regular file
/// matching `cgi_pattern` and executable-by-other goes to a CGI child;
/// any other regular file is a static send; a directory with no index and
/// indexing enabled is a listing; directories lacking a trailing slash
/// were already flagged by the resolver for redirect.
pub fn route_resolved(resolved: &ResolvedResource, cgi_pattern: Option<&Pattern>) -> Result<Route> {
    if resolved.needs_trailing_slash_redirect {
        return Ok(Route::DirectoryRedirect);
    }
    if resolved.is_directory {
        return Ok(Route::Directory);
    }

    let meta = resolved.metadata.as_ref().ok_or_else(|| Error::NotFound("resource missing".to_string()))?;
    let filename = resolved.realfilename.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let executable_by_other = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o001 != 0
    };

    if executable_by_other && cgi_pattern.is_some_and(|p| p.matches(filename)) {
        Ok(Route::Cgi)
    } else {
        Ok(Route::StaticFile)
    }
}

/// Dense `pid -> connection id` table per the design's data model: grows
/// by reallocation when a pid falls outside `[pidmin, pidmax)`.
pub struct ChildTable<T> {
    pidmin: i32,
    slots: Vec<Option<T>>,
}

impl<T> ChildTable<T> {
    pub fn new() -> Self {
        ChildTable { pidmin: 0, slots: Vec::new() }
    }

    pub fn insert(&mut self, pid: i32, value: T) {
        if self.slots.is_empty() {
            self.pidmin = pid;
            self.slots.push(Some(value));
            return;
        }
        if pid < self.pidmin {
            let shift = (self.pidmin - pid) as usize;
            let mut new_slots = Vec::with_capacity(shift + self.slots.len());
            new_slots.resize_with(shift, || None);
            new_slots.extend(self.slots.drain(..));
            self.slots = new_slots;
            self.pidmin = pid;
        } else {
            let idx = (pid - self.pidmin) as usize;
            if idx >= self.slots.len() {
                self.slots.resize_with(idx + 1, || None);
            }
        }
        let idx = (pid - self.pidmin) as usize;
        self.slots[idx] = Some(value);
    }

    pub fn remove(&mut self, pid: i32) -> Option<T> {
        if pid < self.pidmin {
            return None;
        }
        let idx = (pid - self.pidmin) as usize;
        self.slots.get_mut(idx).and_then(|slot| slot.take())
    }

    pub fn get(&self, pid: i32) -> Option<&T> {
        if pid < self.pidmin {
            return None;
        }
        let idx = (pid - self.pidmin) as usize;
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ChildTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn admission: enforces `0 <= cgi_count <= cgi_limit` (a limit of 0
/// means unlimited, per the original's convention).
pub struct SpawnAdmission {
    pub cgi_count: u32,
    pub cgi_limit: u32,
}

impl SpawnAdmission {
    pub fn new(cgi_limit: u32) -> Self {
        SpawnAdmission { cgi_count: 0, cgi_limit }
    }

    pub fn admit(&mut self) -> Result<()> {
        if self.cgi_limit > 0 && self.cgi_count >= self.cgi_limit {
            return Err(Error::Overloaded("cgi_limit reached".to_string()));
        }
        self.cgi_count += 1;
        Ok(())
    }

    pub fn release(&mut self) {
        self.cgi_count = self.cgi_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejects_at_limit() {
        let mut admission = SpawnAdmission::new(1);
        admission.admit().unwrap();
        assert!(admission.admit().is_err());
        admission.release();
        assert!(admission.admit().is_ok());
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let mut admission = SpawnAdmission::new(0);
        for _ in 0..100 {
            admission.admit().unwrap();
        }
    }

    #[test]
    fn child_table_grows_downward_when_pid_precedes_pidmin() {
        let mut table: ChildTable<&str> = ChildTable::new();
        table.insert(100, "a");
        table.insert(50, "b");
        assert_eq!(table.get(100), Some(&"a"));
        assert_eq!(table.get(50), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn child_table_remove_clears_slot() {
        let mut table: ChildTable<&str> = ChildTable::new();
        table.insert(10, "a");
        assert_eq!(table.remove(10), Some("a"));
        assert_eq!(table.get(10), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn embedded_route_matches_pks_prefixes() {
        assert!(matches!(route_embedded("pks/lookup?op=get"), Some(Route::HkpLookup)));
        assert!(matches!(route_embedded("pks/add"), Some(Route::HkpAdd)));
        assert!(route_embedded("index.html").is_none());
    }
}
