use std::collections::{BTreeSet, VecDeque};

use super::version::Version;

/// Data received for one version, waiting to be applied by the application
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingVersion {
    pub version: Version,
    /// Full instance data rather than a delta
    pub is_instance: bool,
    pub data: Vec<u8>,
}

/// What a slave did with a received delta
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Queued for the next `sync`
    Queued,
    /// Already received, ignored
    Duplicate,
    /// A version was skipped. The delta was dropped and a new instance must
    /// be requested from the master.
    Gap { expected: Version, received: Version },
    /// Waiting for an instance, ignored
    Resyncing,
}

/// Version bookkeeping for a slave copy of a distributed object.
///
/// Versions received from the master are queued in order and applied only
/// when the application syncs, so the application decides when remote
/// changes become visible.
#[derive(Debug, Default)]
pub struct SlaveState {
    version: Version,
    head: Version,
    initialized: bool,
    resyncing: bool,
    pending: VecDeque<PendingVersion>,
    next_sequence: u32,
    outstanding_commits: BTreeSet<u32>,
}

impl SlaveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The version the application currently sees
    pub fn version(&self) -> Version {
        self.version
    }

    /// The newest version received, applied or not
    pub fn head_version(&self) -> Version {
        self.head
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_resyncing(&self) -> bool {
        self.resyncing
    }

    /// Queues a full instance, superseding anything not yet applied.
    /// Returns false if the instance is older than what was already applied.
    pub fn receive_instance(&mut self, version: Version, data: Vec<u8>) -> bool {
        if self.initialized && version < self.version {
            return false;
        }

        self.pending.clear();
        self.pending.push_back(PendingVersion {
            version,
            is_instance: true,
            data,
        });
        self.head = version;
        self.initialized = true;
        self.resyncing = false;
        true
    }

    pub fn receive_delta(&mut self, version: Version, is_instance: bool, data: Vec<u8>) -> DeltaOutcome {
        if !self.initialized || self.resyncing {
            return DeltaOutcome::Resyncing;
        }
        if version <= self.head {
            return DeltaOutcome::Duplicate;
        }
        if !version.follows(self.head) {
            self.resyncing = true;
            return DeltaOutcome::Gap {
                expected: Version::new(self.head.value().saturating_add(1)),
                received: version,
            };
        }

        self.pending.push_back(PendingVersion {
            version,
            is_instance,
            data,
        });
        self.head = version;
        DeltaOutcome::Queued
    }

    /// The version the next `apply` would make visible
    pub fn next_ready(&self) -> Option<Version> {
        self.pending.front().map(|pending| pending.version)
    }

    /// Hands the next queued version to `apply` and makes it the current
    /// version once `apply` succeeded. If `apply` fails the version stays
    /// put, everything queued is dropped and the slave waits for a new
    /// instance, since later deltas would build on data it does not have.
    pub fn apply<E, F>(&mut self, apply: F) -> Option<Result<Version, E>>
    where
        F: FnOnce(&PendingVersion) -> Result<(), E>,
    {
        let pending = self.pending.pop_front()?;
        match apply(&pending) {
            Ok(()) => {
                self.version = pending.version;
                Some(Ok(pending.version))
            }
            Err(error) => {
                self.pending.clear();
                self.head = self.version;
                self.resyncing = true;
                Some(Err(error))
            }
        }
    }

    /// Reserves the sequence number for a change this slave sends upstream
    pub fn begin_commit(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.outstanding_commits.insert(sequence);
        sequence
    }

    /// Returns false if `sequence` was not outstanding
    pub fn acknowledge_commit(&mut self, sequence: u32) -> bool {
        self.outstanding_commits.remove(&sequence)
    }

    pub fn has_outstanding_commits(&self) -> bool {
        !self.outstanding_commits.is_empty()
    }
}
