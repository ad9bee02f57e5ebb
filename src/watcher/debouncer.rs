//! Change coalescing for watcher events.
//!
//! Editors rarely produce one event per save: auto-save, format-on-save and
//! atomic-rename flows all arrive as bursts. Two timers govern a pending
//! path: it is released once no new event has arrived for the quiet window,
//! or once it has been pending for the maximum hold time, whichever comes
//! first. The hold cap keeps a file that never goes quiet (a log-style
//! appender, a save loop) from starving the index indefinitely. Ready paths
//! come out in path order, matching the pipeline's sorted enumeration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Burst {
    /// When the current burst began. The hold cap is measured from here.
    started: Instant,
    /// Most recent event. The quiet window is measured from here.
    last_event: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    pending: BTreeMap<PathBuf, Burst>,
    quiet: Duration,
    max_hold: Duration,
}

impl Debouncer {
    /// A debouncer with the given quiet window. The hold cap defaults to
    /// twenty windows, long enough for any editor burst and short enough
    /// that a chattering file still reaches the index.
    pub fn new(quiet_ms: u64) -> Self {
        Self::with_max_hold(quiet_ms, quiet_ms.saturating_mul(20))
    }

    pub fn with_max_hold(quiet_ms: u64, max_hold_ms: u64) -> Self {
        Self {
            pending: BTreeMap::new(),
            quiet: Duration::from_millis(quiet_ms),
            max_hold: Duration::from_millis(max_hold_ms.max(quiet_ms)),
        }
    }

    /// Note an event for a path. The quiet timer restarts; the burst start
    /// is kept so the hold cap still counts down.
    pub fn touch(&mut self, path: PathBuf) {
        let now = Instant::now();
        self.pending
            .entry(path)
            .and_modify(|burst| burst.last_event = now)
            .or_insert(Burst {
                started: now,
                last_event: now,
            });
    }

    /// Forget a path entirely (it was deleted before its burst settled).
    pub fn forget(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Paths whose burst has settled, or that hit the hold cap, in path
    /// order. Released paths start a fresh burst on their next event.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, burst)| {
                now.duration_since(burst.last_event) >= self.quiet
                    || now.duration_since(burst.started) >= self.max_hold
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready
    }

    /// Release everything regardless of timers (shutdown drain).
    pub fn flush(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.pending).into_keys().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn save_burst_releases_once_settled() {
        let mut debouncer = Debouncer::new(40);
        let path = PathBuf::from("/repo/src/app.py");

        // Three events in quick succession, the way format-on-save lands.
        for _ in 0..3 {
            debouncer.touch(path.clone());
            sleep(Duration::from_millis(15));
        }
        // 15ms after the last event: still inside the quiet window.
        assert!(debouncer.take_ready().is_empty());
        assert!(!debouncer.is_idle());

        sleep(Duration::from_millis(40));
        assert_eq!(debouncer.take_ready(), vec![path]);
        assert!(debouncer.is_idle());
    }

    #[test]
    fn hold_cap_bounds_a_file_that_never_goes_quiet() {
        let mut debouncer = Debouncer::with_max_hold(40, 120);
        let path = PathBuf::from("/repo/trace.log");

        // Keep touching faster than the quiet window; only the hold cap
        // can release it.
        let started = Instant::now();
        let mut released = Vec::new();
        while started.elapsed() < Duration::from_millis(200) {
            debouncer.touch(path.clone());
            released.extend(debouncer.take_ready());
            sleep(Duration::from_millis(20));
        }
        assert!(
            released.contains(&path),
            "hold cap should force a release mid-burst"
        );
    }

    #[test]
    fn released_paths_come_out_in_path_order() {
        let mut debouncer = Debouncer::new(10);
        for name in ["zeta.py", "alpha.py", "mid.py"] {
            debouncer.touch(PathBuf::from(format!("/repo/{name}")));
        }
        sleep(Duration::from_millis(20));

        let ready = debouncer.take_ready();
        assert_eq!(
            ready,
            vec![
                PathBuf::from("/repo/alpha.py"),
                PathBuf::from("/repo/mid.py"),
                PathBuf::from("/repo/zeta.py"),
            ]
        );
    }

    #[test]
    fn release_starts_a_fresh_burst() {
        let mut debouncer = Debouncer::new(10);
        let path = PathBuf::from("/repo/a.py");

        debouncer.touch(path.clone());
        sleep(Duration::from_millis(20));
        assert_eq!(debouncer.take_ready(), vec![path.clone()]);

        // A later edit pends again from scratch.
        debouncer.touch(path.clone());
        assert!(debouncer.take_ready().is_empty());
        sleep(Duration::from_millis(20));
        assert_eq!(debouncer.take_ready(), vec![path]);
    }

    #[test]
    fn forgotten_paths_are_not_released() {
        let mut debouncer = Debouncer::new(10);
        let deleted = PathBuf::from("/repo/gone.py");
        let kept = PathBuf::from("/repo/kept.py");
        debouncer.touch(deleted.clone());
        debouncer.touch(kept.clone());

        debouncer.forget(&deleted);
        sleep(Duration::from_millis(20));
        assert_eq!(debouncer.take_ready(), vec![kept]);
    }

    #[test]
    fn flush_ignores_both_timers() {
        let mut debouncer = Debouncer::new(60_000);
        debouncer.touch(PathBuf::from("/repo/b.py"));
        debouncer.touch(PathBuf::from("/repo/a.py"));

        assert_eq!(
            debouncer.flush(),
            vec![PathBuf::from("/repo/a.py"), PathBuf::from("/repo/b.py")]
        );
        assert!(debouncer.is_idle());
    }
}
