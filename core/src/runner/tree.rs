//! Descendant discovery and forceful termination for a process tree.

use std::collections::{HashMap, HashSet};

use sysinfo::{Pid, System};

use crate::error::KillFailure;

/// Returns every live descendant of `root`, deepest first.
///
/// The snapshot must be taken before the root is killed: once it is gone its
/// children are re-parented and can no longer be found this way.
pub fn descendants(root: u32) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();

    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, proc_) in sys.processes() {
        if let Some(parent) = proc_.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(Pid::from_u32(root), 0usize)];
    while let Some((pid, depth)) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            for kid in kids {
                if seen.insert(*kid) {
                    order.push((*kid, depth + 1));
                    stack.push((*kid, depth + 1));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.into_iter().map(|(pid, _)| pid.as_u32()).collect()
}

/// Forcefully kills every descendant of `root` (but not `root` itself).
///
/// Processes that vanished between the snapshot and the kill are not
/// reported as failures.
pub fn kill_descendants(root: u32) -> Vec<KillFailure> {
    let targets = descendants(root);
    if targets.is_empty() {
        return Vec::new();
    }

    let mut sys = System::new();
    sys.refresh_processes();

    let mut failures = Vec::new();
    for pid in targets {
        let Some(proc_) = sys.process(Pid::from_u32(pid)) else {
            continue;
        };
        if proc_.kill() {
            tracing::debug!(target: "hk3.supervisor", pid, "killed descendant");
        } else {
            failures.push(KillFailure {
                pid,
                reason: "kill signal was not delivered".to_string(),
            });
        }
    }
    failures
}

/// Kills `root` and all of its descendants. Used on teardown, where no child
/// handle is available anymore.
pub fn kill_tree(root: u32) -> Vec<KillFailure> {
    let mut failures = kill_descendants(root);

    let mut sys = System::new();
    sys.refresh_processes();
    if let Some(proc_) = sys.process(Pid::from_u32(root)) {
        if !proc_.kill() {
            failures.push(KillFailure {
                pid: root,
                reason: "kill signal was not delivered".to_string(),
            });
        }
    }
    failures
}
