//! Backup and restore runs over a [`Gateway`](crate::gateway::Gateway).

pub mod backup;
pub mod report;
pub mod restore;

pub use backup::{BackupEngine, BackupOptions};
pub use report::{BackupReport, KindTally, RestoreReport};
pub use restore::{RestoreEngine, RestoreOptions};

/// Whether the build at `index` (0 = newest) is within `depth`.
/// A depth of `D` keeps at most `D + 1` builds.
pub fn within_depth(index: usize, depth: usize) -> bool {
    index <= depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_depth() {
        let kept: Vec<usize> = (0..10).filter(|&i| within_depth(i, 3)).collect();
        assert_eq!(kept, vec![0, 1, 2, 3]);
        assert!(within_depth(0, 0));
        assert!(!within_depth(1, 0));
    }
}
