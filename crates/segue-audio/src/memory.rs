//! Available-memory checks before loading a track.

use parking_lot::Mutex;
use segue_core::{Error, Result};
use sysinfo::System;
use tracing::debug;

/// Reports how much system memory is currently available.
pub trait MemoryProbe: Send + Sync {
    fn available_bytes(&self) -> u64;
}

/// Memory probe backed by sysinfo.
pub struct SystemMemory {
    system: Mutex<System>,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.available_memory()
    }
}

/// Fixed amount of memory, for tests and embedded targets.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub u64);

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> u64 {
        self.0
    }
}

/// Reject a load whose footprint would leave less than `headroom` bytes free.
pub fn ensure_capacity(probe: &dyn MemoryProbe, required: u64, headroom: u64) -> Result<()> {
    let available = probe.available_bytes();
    debug!(
        "Memory check: {} bytes required, {} available, {} reserved",
        required, available, headroom
    );

    if required > available.saturating_sub(headroom) {
        return Err(Error::InsufficientMemory {
            required,
            available,
            headroom,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_within_headroom() {
        let probe = FixedMemory(100);
        assert!(ensure_capacity(&probe, 60, 40).is_ok());
        assert!(matches!(
            ensure_capacity(&probe, 61, 40),
            Err(Error::InsufficientMemory { required: 61, .. })
        ));
    }

    #[test]
    fn test_headroom_larger_than_available() {
        let probe = FixedMemory(10);
        assert!(ensure_capacity(&probe, 0, 20).is_ok());
        assert!(ensure_capacity(&probe, 1, 20).is_err());
    }

    #[test]
    fn test_system_memory_reports_something() {
        // Just ensure it doesn't panic on hosts without /proc
        let _ = SystemMemory::new().available_bytes();
    }
}
