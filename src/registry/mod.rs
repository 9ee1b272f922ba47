// ============================================================================
// File: src/registry/mod.rs
// ----------------------------------------------------------------------------
// Stateless queries against the OS process table.
//
// A VM is "running" when some hypervisor process carries `-name <vm>` on its
// command line. Nothing is cached: every call re-reads the process table, so
// two calls can disagree if processes come and go in between.
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;

use log::debug;

use crate::error::QvmResult;

mod procfs;

pub use procfs::ProcFsQuery;

/// Flag that carries the VM name on the hypervisor command line
pub const NAME_FLAG: &str = "-name";

/// One row of the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub argv: Vec<String>,
}

impl ProcessEntry {
    /// Token following the first `-name` flag
    pub fn vm_name(&self) -> Option<&str> {
        self.argv
            .windows(2)
            .find(|pair| pair[0] == NAME_FLAG)
            .map(|pair| pair[1].as_str())
    }

    fn program_matches(&self, program: &str) -> bool {
        self.argv
            .first()
            .and_then(|argv0| Path::new(argv0).file_name())
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(program))
    }
}

/// Access to the process table
///
/// Enumeration failure is fatal; an empty table is not.
pub trait ProcessQuery: Send + Sync + std::fmt::Debug {
    /// Snapshot of running processes
    fn processes(&self) -> QvmResult<Vec<ProcessEntry>>;

    /// Ask a process to terminate
    fn terminate(&self, pid: u32) -> QvmResult<()>;
}

/// Finds hypervisor processes by VM name
#[derive(Debug)]
pub struct ProcessRegistry<'a> {
    query: &'a dyn ProcessQuery,
    program: String,
}

impl<'a> ProcessRegistry<'a> {
    /// `hypervisor` may be a bare binary name or a path; only its file name
    /// is matched against running processes
    pub fn new(query: &'a dyn ProcessQuery, hypervisor: &str) -> Self {
        let program = Path::new(hypervisor)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(hypervisor)
            .to_string();
        Self { query, program }
    }

    fn hypervisors(&self) -> QvmResult<impl Iterator<Item = ProcessEntry> + '_> {
        let processes = self.query.processes()?;
        Ok(processes
            .into_iter()
            .filter(|entry| entry.program_matches(&self.program)))
    }

    /// PIDs of processes running the named VM
    pub fn find_running(&self, name: &str) -> QvmResult<BTreeSet<u32>> {
        let pids: BTreeSet<u32> = self
            .hypervisors()?
            .filter(|entry| entry.vm_name() == Some(name))
            .map(|entry| entry.pid)
            .collect();
        debug!("'{}' matched {} process(es)", name, pids.len());
        Ok(pids)
    }

    /// Names of every running VM
    pub fn list_names(&self) -> QvmResult<BTreeSet<String>> {
        Ok(self
            .hypervisors()?
            .filter_map(|entry| entry.vm_name().map(str::to_string))
            .collect())
    }

    pub fn terminate(&self, pid: u32) -> QvmResult<()> {
        self.query.terminate(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QvmError;

    #[derive(Debug)]
    struct StaticTable(Vec<ProcessEntry>);

    impl ProcessQuery for StaticTable {
        fn processes(&self) -> QvmResult<Vec<ProcessEntry>> {
            Ok(self.0.clone())
        }

        fn terminate(&self, _pid: u32) -> QvmResult<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct BrokenTable;

    impl ProcessQuery for BrokenTable {
        fn processes(&self) -> QvmResult<Vec<ProcessEntry>> {
            Err(QvmError::ProcessTable {
                details: "no /proc".to_string(),
            })
        }

        fn terminate(&self, _pid: u32) -> QvmResult<()> {
            Ok(())
        }
    }

    fn entry(pid: u32, cmdline: &str) -> ProcessEntry {
        ProcessEntry {
            pid,
            argv: cmdline.split(' ').map(str::to_string).collect(),
        }
    }

    fn table() -> StaticTable {
        StaticTable(vec![
            entry(10, "qemu-system-x86_64 -cpu host -name deb -m 6G"),
            entry(11, "/usr/bin/qemu-system-x86_64 -name deb -m 6G"),
            entry(12, "qemu-system-x86_64 -name debian -m 2G"),
            entry(13, "qemu-system-x86_64 -name arch -m 2G"),
            entry(14, "vim -name deb"),
            entry(15, "qemu-system-x86_64 -m 1G"),
            entry(16, "bash"),
        ])
    }

    #[test]
    fn find_running_exact_name() {
        let table = table();
        let registry = ProcessRegistry::new(&table, "qemu-system-x86_64");

        let pids = registry.find_running("deb").expect("Failed to query in test");
        assert_eq!(pids.into_iter().collect::<Vec<_>>(), vec![10, 11]);

        let pids = registry.find_running("debian").expect("Failed to query in test");
        assert_eq!(pids.into_iter().collect::<Vec<_>>(), vec![12]);
    }

    #[test]
    fn find_running_nothing_is_empty() {
        let table = table();
        let registry = ProcessRegistry::new(&table, "qemu-system-x86_64");
        let pids = registry.find_running("fedora").expect("Failed to query in test");
        assert!(pids.is_empty());
    }

    #[test]
    fn list_names_sorted_unique() {
        let table = table();
        let registry = ProcessRegistry::new(&table, "/opt/qemu/bin/qemu-system-x86_64");
        let names = registry.list_names().expect("Failed to query in test");
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["arch", "deb", "debian"]
        );
    }

    #[test]
    fn enumeration_failure_is_fatal() {
        let registry = ProcessRegistry::new(&BrokenTable, "qemu-system-x86_64");
        assert!(matches!(
            registry.find_running("deb"),
            Err(QvmError::ProcessTable { .. })
        ));
        assert!(registry.list_names().is_err());
    }

    #[test]
    fn vm_name_requires_following_token() {
        assert_eq!(entry(1, "qemu -name").vm_name(), None);
        assert_eq!(entry(1, "qemu -name x -name y").vm_name(), Some("x"));
    }
}
