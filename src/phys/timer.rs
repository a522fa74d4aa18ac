// src/phys/timer.rs

use crate::common::error::TimerContention;
use crate::common::hal_traits::VpwTimer;
use crate::common::timing::to_ticks;

/// The parts of the stack that may own the symbol timer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntityId {
    PhysRx,
    PhysTx,
    DataLink,
    App,
}

/// Arbiter for the single hardware timer.
///
/// At most one entity owns the countdown at a time. The owner is recorded on
/// [`request`](SymbolTimer::request) and handed back exactly once by
/// [`expire`](SymbolTimer::expire), so an expiry that races a cancel is dropped
/// instead of being delivered to the wrong layer.
#[derive(Debug)]
pub struct SymbolTimer<T: VpwTimer> {
    timer: T,
    owner: Option<EntityId>,
}

impl<T: VpwTimer> SymbolTimer<T> {
    pub fn new(timer: T) -> Self {
        SymbolTimer { timer, owner: None }
    }

    /// Arms the timer for `us` (rounded to whole ticks) on behalf of `entity`.
    ///
    /// The current owner may re-arm freely. Any other entity asking while the
    /// timer is armed is a layering bug.
    pub fn request(&mut self, entity: EntityId, us: u32) -> Result<(), TimerContention> {
        if let Some(held_by) = self.owner {
            if held_by != entity {
                debug_assert!(
                    false,
                    "timer contention: held by {:?}, requested by {:?}",
                    held_by, entity
                );
                #[cfg(feature = "defmt")]
                defmt::warn!("timer contention: held by {}, requested by {}", held_by, entity);
                return Err(TimerContention { held_by, requested_by: entity });
            }
        }

        self.timer.start(to_ticks(us));
        self.owner = Some(entity);
        Ok(())
    }

    /// Disarms the timer if `entity` owns it; otherwise does nothing.
    pub fn cancel(&mut self, entity: EntityId) {
        if self.owner == Some(entity) {
            self.timer.cancel();
            self.owner = None;
        }
    }

    /// Disarms the timer whoever owns it. Only for fail-safe resets.
    pub fn cancel_all(&mut self) {
        self.timer.cancel();
        self.owner = None;
    }

    /// Consumes an expiry and returns the entity it belongs to.
    ///
    /// Returns `None` when nothing was armed (a stale interrupt).
    pub fn expire(&mut self) -> Option<EntityId> {
        self.owner.take()
    }

    /// Polls the hardware timer for an expiry.
    pub fn wait(&mut self) -> nb::Result<(), core::convert::Infallible> {
        self.timer.wait()
    }

    #[inline]
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.owner.is_some()
    }

    /// Access to the wrapped hardware timer.
    pub fn inner(&self) -> &T {
        &self.timer
    }
}
