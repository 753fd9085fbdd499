use std::{fmt, mem::size_of, sync::{Mutex, MutexGuard}};

use crate::error::{HuffError, Result};

/// A source of bulk memory for the coder contexts.
///
/// Contexts reserve every table they need when they are created and release
/// all of it when they are dropped. Nothing is returned piecemeal in between.
pub trait MemContext: Sync + fmt::Debug {
    fn reserve(&self, bytes: usize) -> Result<()>;
    fn release(&self, bytes: usize);
}

#[derive(Clone, Copy, Debug, Default)]
struct ArenaState {
    in_use: usize,
    peak: usize,
    allocations: usize,
}

/// Budgeted arena. Every buffer is charged at its size rounded up to a power of two.
#[derive(Debug, Default)]
pub struct MemArena {
    capacity: Option<usize>,
    state: Mutex<ArenaState>,
}

impl MemArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity), ..Default::default() }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ArenaState> {
        // The counters are updated in one step, a poisoned lock still holds them consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn in_use(&self) -> usize {
        self.state().in_use
    }

    pub fn peak(&self) -> usize {
        self.state().peak
    }

    /// Number of reservations currently outstanding.
    pub fn allocations(&self) -> usize {
        self.state().allocations
    }

    pub fn available(&self) -> Option<usize> {
        let in_use = self.in_use();
        self.capacity.map(|c| c - in_use)
    }
}

impl MemContext for MemArena {
    fn reserve(&self, bytes: usize) -> Result<()> {
        let mut state = self.state();

        if let Some(capacity) = self.capacity {
            if bytes > capacity - state.in_use {
                return Err(HuffError::OutOfMemory { requested: bytes, available: capacity - state.in_use });
            }
        }

        state.in_use += bytes;
        state.peak = state.peak.max(state.in_use);
        state.allocations += 1;
        Ok(())
    }

    fn release(&self, bytes: usize) {
        let mut state = self.state();

        debug_assert!(bytes <= state.in_use, "Releasing {} bytes with only {} in use", bytes, state.in_use);
        debug_assert!(state.allocations > 0);
        state.in_use -= bytes;
        state.allocations -= 1;
    }
}

/// Bytes charged for a buffer of `len` elements of `T`.
pub fn charge_for<T>(len: usize) -> usize {
    let bytes = len * size_of::<T>();
    if bytes == 0 { 0 } else { bytes.next_power_of_two() }
}

/// The memory a context holds from an arena for its whole lifetime.
///
/// All buffers of a context are reserved together, so a failed reservation
/// leaves the arena untouched. The reservation goes back to the arena when
/// the workspace is dropped.
#[derive(Debug)]
pub struct Workspace<'a> {
    mem: &'a dyn MemContext,
    charged: usize,
    buffers: usize,
}

impl<'a> Workspace<'a> {
    /// Reserves one charge per buffer, `charges` as returned by [`charge_for`].
    pub fn reserve(mem: &'a dyn MemContext, charges: &[usize]) -> Result<Self> {
        let charged = charges.iter().sum();
        mem.reserve(charged)?;

        Ok(Self { mem, charged, buffers: charges.len() })
    }

    pub fn charged(&self) -> usize {
        self.charged
    }

    pub fn buffers(&self) -> usize {
        self.buffers
    }
}

impl Drop for Workspace<'_> {
    fn drop(&mut self) {
        self.mem.release(self.charged);
    }
}

/// Zero-initialised table for a context's workspace.
pub fn zeroed<T: Copy + Default>(len: usize) -> Box<[T]> {
    vec![T::default(); len].into_boxed_slice()
}
