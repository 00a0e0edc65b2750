//! Two-phase object lifecycle state machine.
//!
//! Every codec, frame and packet owns two things with distinct lifetimes: a
//! *shell* (the identifying structure) and a *resource* (working memory).
//! The tracker enforces the strict ordering
//! `Destroyed → Created → Ready → Created → Destroyed`: the resource can
//! only exist inside a shell, and must be released before the shell is.
//!
//! Each transition primitive takes a closure doing the actual fallible
//! work; the state advances only when the closure succeeds, so a failed
//! allocation leaves the machine exactly where it was.

use crate::error::{precondition, MediaResult};

/// Lifecycle state of a two-phase resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No backing memory at all
    Destroyed,
    /// Shell allocated, no working resource
    Created,
    /// Shell and working resource both allocated
    Ready,
}

/// Tracker for the allocate/release protocol of one object
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    /// Start in `Destroyed`
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Destroyed,
        }
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Check if the working resource is allocated
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    /// Return a precondition error unless the object is in `expected`
    pub fn require(&self, expected: LifecycleState, what: &'static str) -> MediaResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(precondition(what))
        }
    }

    /// `Destroyed → Created`: allocate the shell via `alloc`
    pub fn allocate_shell<T>(&mut self, alloc: impl FnOnce() -> MediaResult<T>) -> MediaResult<T> {
        self.require(LifecycleState::Destroyed, "allocate_shell: not Destroyed")?;
        let out = alloc()?;
        self.state = LifecycleState::Created;
        log::trace!("lifecycle: Destroyed -> Created");
        Ok(out)
    }

    /// `Created → Ready`: allocate the working resource via `alloc`
    pub fn allocate_resource<T>(
        &mut self,
        alloc: impl FnOnce() -> MediaResult<T>,
    ) -> MediaResult<T> {
        self.require(LifecycleState::Created, "allocate_resource: not Created")?;
        let out = alloc()?;
        self.state = LifecycleState::Ready;
        log::trace!("lifecycle: Created -> Ready");
        Ok(out)
    }

    /// `Ready → Created`: release the working resource via `release`
    pub fn release_resource(&mut self, release: impl FnOnce() -> MediaResult<()>) -> MediaResult<()> {
        self.require(LifecycleState::Ready, "release_resource: not Ready")?;
        release()?;
        self.state = LifecycleState::Created;
        log::trace!("lifecycle: Ready -> Created");
        Ok(())
    }

    /// `Created → Destroyed`: release the shell via `release`
    pub fn release_shell(&mut self, release: impl FnOnce() -> MediaResult<()>) -> MediaResult<()> {
        self.require(LifecycleState::Created, "release_shell: not Created")?;
        release()?;
        self.state = LifecycleState::Destroyed;
        log::trace!("lifecycle: Created -> Destroyed");
        Ok(())
    }

    /// Tear down from any state. Idempotent.
    ///
    /// Runs `release_resource` if `Ready`, then `release_shell` if the shell
    /// exists. The release closures here are infallible; destruction never
    /// reports errors.
    pub fn destroy(&mut self, release_resource: impl FnOnce(), release_shell: impl FnOnce()) {
        if self.state == LifecycleState::Ready {
            release_resource();
            self.state = LifecycleState::Created;
        }
        if self.state == LifecycleState::Created {
            release_shell();
            self.state = LifecycleState::Destroyed;
        }
    }

    /// Move the tracked state out, leaving this tracker `Destroyed`
    pub fn take(&mut self) -> Lifecycle {
        std::mem::replace(self, Lifecycle::new())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
