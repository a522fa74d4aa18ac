// src/phys/rx.rs

use super::timer::{EntityId, SymbolTimer};
use crate::common::{
    error::TimerContention,
    hal_traits::{Level, VpwTimer},
    symbol::Symbol,
    timing::{quantize_us, RX_ACTIVE_LIMIT_US, RX_PASSIVE_LIMIT_US},
};

/// Reported upwards by PHYS-RX.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    /// A pulse pair was classified (possibly as `Symbol::Invalid`).
    Symbol(Symbol),
    /// The bus stayed idle for the configured idle timeout.
    IdleTimeout,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Not listening; edges are ignored.
    Off,
    /// Waiting for the active edge that starts a symbol.
    Idle,
    /// Inside the active phase of a symbol.
    Active,
    /// Inside the passive phase, with the measured active length.
    Passive { active_us: u32 },
}

/// Physical receiver: measures pulse pairs between bus edges and classifies them.
///
/// The watchdog armed during a symbol bounds both phases. In the passive phase
/// it doubles as end-of-frame detection: a passive gap that reaches
/// [`RX_PASSIVE_LIMIT_US`] after a delimiter pulse is an IFS.
///
/// The idle timeout is a countdown, not a quiet-time window. Every edge and
/// watchdog expiry spends from it, so bus noise cannot push it back.
#[derive(Debug)]
pub struct PhysRx {
    state: RxState,
    /// Time left before [`RxEvent::IdleTimeout`].
    idle_timeout_us: Option<u32>,
    /// Time already spent by watchdog expiries since the last edge.
    spent_since_edge_us: u32,
}

impl Default for PhysRx {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysRx {
    pub const fn new() -> Self {
        PhysRx { state: RxState::Off, idle_timeout_us: None, spent_since_edge_us: 0 }
    }

    #[inline]
    pub fn state(&self) -> RxState {
        self.state
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.state != RxState::Off
    }

    /// Remaining idle timeout, if one is running.
    #[inline]
    pub fn idle_timeout(&self) -> Option<u32> {
        self.idle_timeout_us
    }

    /// Starts processing edges. With `idle_timeout_us`, a single
    /// [`RxEvent::IdleTimeout`] is reported once that much time has passed,
    /// at the first moment the receiver is idle. Symbols in between do not
    /// extend it.
    pub fn start_listen<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
        idle_timeout_us: Option<u32>,
    ) -> Result<(), TimerContention> {
        self.idle_timeout_us = idle_timeout_us;
        self.spent_since_edge_us = 0;
        self.enter_idle(timer)
    }

    /// Stops processing edges and releases the timer.
    pub fn stop_listen<T: VpwTimer>(&mut self, timer: &mut SymbolTimer<T>) {
        self.state = RxState::Off;
        self.idle_timeout_us = None;
        timer.cancel(EntityId::PhysRx);
    }

    /// Drops a pending idle timeout without affecting symbol reception.
    pub fn clear_idle_timeout<T: VpwTimer>(&mut self, timer: &mut SymbolTimer<T>) {
        self.idle_timeout_us = None;
        if self.state == RxState::Idle {
            timer.cancel(EntityId::PhysRx);
        }
    }

    /// Handles a bus edge. `elapsed_us` is the time since the previous edge.
    pub fn on_edge<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
        level: Level,
        elapsed_us: u32,
    ) -> Result<Option<RxEvent>, TimerContention> {
        if self.state != RxState::Off {
            self.spend(elapsed_us.saturating_sub(self.spent_since_edge_us));
            self.spent_since_edge_us = 0;
        }

        match (self.state, level) {
            (RxState::Idle, Level::Active) => {
                timer.request(EntityId::PhysRx, RX_ACTIVE_LIMIT_US)?;
                self.state = RxState::Active;
                Ok(None)
            }
            (RxState::Active, Level::Passive) => {
                timer.request(EntityId::PhysRx, RX_PASSIVE_LIMIT_US)?;
                self.state = RxState::Passive { active_us: elapsed_us };
                Ok(None)
            }
            (RxState::Passive { active_us }, Level::Active) => {
                let symbol = Symbol::classify(active_us, elapsed_us);
                if symbol == Symbol::Invalid {
                    self.enter_idle(timer)?;
                } else {
                    // This edge already starts the next symbol
                    timer.request(EntityId::PhysRx, RX_ACTIVE_LIMIT_US)?;
                    self.state = RxState::Active;
                }
                Ok(Some(RxEvent::Symbol(symbol)))
            }
            // Off, or an edge that does not change our view of the bus
            _ => Ok(None),
        }
    }

    /// Handles an expiry of a timer owned by PHYS-RX.
    pub fn on_timer_expired<T: VpwTimer>(
        &mut self,
        timer: &mut SymbolTimer<T>,
    ) -> Result<Option<RxEvent>, TimerContention> {
        match self.state {
            RxState::Off => Ok(None),
            RxState::Idle => {
                if self.idle_timeout_us.take().is_some() {
                    Ok(Some(RxEvent::IdleTimeout))
                } else {
                    Ok(None)
                }
            }
            RxState::Active => {
                #[cfg(feature = "defmt")]
                defmt::warn!("bus stuck active");
                self.spend_watchdog(RX_ACTIVE_LIMIT_US);
                self.enter_idle(timer)?;
                Ok(Some(RxEvent::Symbol(Symbol::Invalid)))
            }
            RxState::Passive { active_us } => {
                let symbol = Symbol::classify(active_us, quantize_us(RX_PASSIVE_LIMIT_US));
                self.spend_watchdog(RX_PASSIVE_LIMIT_US);
                self.enter_idle(timer)?;
                Ok(Some(RxEvent::Symbol(symbol)))
            }
        }
    }

    /// Forces the receiver off. Used by fail-safe resets after the timer was cleared.
    pub(crate) fn reset(&mut self) {
        self.state = RxState::Off;
        self.idle_timeout_us = None;
        self.spent_since_edge_us = 0;
    }

    fn spend(&mut self, us: u32) {
        if let Some(left) = self.idle_timeout_us.as_mut() {
            *left = left.saturating_sub(us);
        }
    }

    // The next edge reports its elapsed time from the previous edge, which
    // already includes this watchdog period.
    fn spend_watchdog(&mut self, limit_us: u32) {
        let us = quantize_us(limit_us);
        self.spend(us);
        self.spent_since_edge_us = self.spent_since_edge_us.saturating_add(us);
    }

    fn enter_idle<T: VpwTimer>(&mut self, timer: &mut SymbolTimer<T>) -> Result<(), TimerContention> {
        self.state = RxState::Idle;
        match self.idle_timeout_us {
            Some(timeout_us) => timer.request(EntityId::PhysRx, timeout_us),
            None => {
                timer.cancel(EntityId::PhysRx);
                Ok(())
            }
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTimer;

    fn listening() -> (PhysRx, SymbolTimer<MockTimer>, MockTimer) {
        let mock = MockTimer::new();
        let mut timer = SymbolTimer::new(mock.clone());
        let mut rx = PhysRx::new();
        rx.start_listen(&mut timer, None).unwrap();
        (rx, timer, mock)
    }

    // Active edge after `prev_passive`, then the passive edge after `active`.
    // Returns whatever the active edge reported for the previous pair.
    fn pulse(
        rx: &mut PhysRx,
        timer: &mut SymbolTimer<MockTimer>,
        prev_passive: u32,
        active: u32,
    ) -> Option<RxEvent> {
        let reported = rx.on_edge(timer, Level::Active, prev_passive).unwrap();
        assert_eq!(rx.on_edge(timer, Level::Passive, active).unwrap(), None);
        reported
    }

    #[test]
    fn test_off_ignores_edges() {
        let mut timer = SymbolTimer::new(MockTimer::new());
        let mut rx = PhysRx::new();
        assert!(!rx.is_listening());
        assert_eq!(rx.on_edge(&mut timer, Level::Active, 0).unwrap(), None);
        assert_eq!(rx.state(), RxState::Off);
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_symbol_sequence() {
        let (mut rx, mut timer, mock) = listening();

        // SOF active phase
        assert_eq!(rx.on_edge(&mut timer, Level::Active, 5_000).unwrap(), None);
        assert_eq!(rx.state(), RxState::Active);
        assert_eq!(mock.last_start(), Some(6)); // 364us -> 6 ticks

        assert_eq!(rx.on_edge(&mut timer, Level::Passive, 192).unwrap(), None);
        assert_eq!(rx.state(), RxState::Passive { active_us: 192 });
        assert_eq!(mock.last_start(), Some(5)); // 300us -> 5 ticks

        // Next active edge closes the SOF
        assert_eq!(
            rx.on_edge(&mut timer, Level::Active, 64).unwrap(),
            Some(RxEvent::Symbol(Symbol::Sof))
        );
        assert_eq!(rx.state(), RxState::Active);

        // A one bit
        assert_eq!(rx.on_edge(&mut timer, Level::Passive, 128).unwrap(), None);
        assert_eq!(
            rx.on_edge(&mut timer, Level::Active, 64).unwrap(),
            Some(RxEvent::Symbol(Symbol::BitOne))
        );
        assert_eq!(timer.owner(), Some(EntityId::PhysRx));
    }

    #[test]
    fn test_redundant_edges_ignored() {
        let (mut rx, mut timer, _mock) = listening();
        assert_eq!(rx.on_edge(&mut timer, Level::Passive, 10).unwrap(), None);
        assert_eq!(rx.state(), RxState::Idle);
        pulse(&mut rx, &mut timer, 0, 64);
        assert_eq!(rx.on_edge(&mut timer, Level::Passive, 5).unwrap(), None);
        assert_eq!(rx.state(), RxState::Passive { active_us: 64 });
    }

    #[test]
    fn test_invalid_pair_resets_to_idle() {
        let (mut rx, mut timer, _mock) = listening();
        pulse(&mut rx, &mut timer, 0, 96);
        assert_eq!(
            rx.on_edge(&mut timer, Level::Active, 128).unwrap(),
            Some(RxEvent::Symbol(Symbol::Invalid))
        );
        assert_eq!(rx.state(), RxState::Idle);
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_stuck_active_line() {
        let (mut rx, mut timer, _mock) = listening();
        rx.on_edge(&mut timer, Level::Active, 0).unwrap();
        assert_eq!(timer.expire(), Some(EntityId::PhysRx));
        assert_eq!(
            rx.on_timer_expired(&mut timer).unwrap(),
            Some(RxEvent::Symbol(Symbol::Invalid))
        );
        assert_eq!(rx.state(), RxState::Idle);
    }

    #[test]
    fn test_passive_watchdog_after_delimiter_is_ifs() {
        let (mut rx, mut timer, _mock) = listening();
        pulse(&mut rx, &mut timer, 0, 64);
        assert_eq!(timer.expire(), Some(EntityId::PhysRx));
        assert_eq!(
            rx.on_timer_expired(&mut timer).unwrap(),
            Some(RxEvent::Symbol(Symbol::Ifs))
        );
        assert_eq!(rx.state(), RxState::Idle);
    }

    #[test]
    fn test_passive_watchdog_after_data_bit_is_invalid() {
        let (mut rx, mut timer, _mock) = listening();
        pulse(&mut rx, &mut timer, 0, 128);
        timer.expire();
        assert_eq!(
            rx.on_timer_expired(&mut timer).unwrap(),
            Some(RxEvent::Symbol(Symbol::Invalid))
        );
    }

    #[test]
    fn test_idle_timeout_fires_once() {
        let mock = MockTimer::new();
        let mut timer = SymbolTimer::new(mock.clone());
        let mut rx = PhysRx::new();
        rx.start_listen(&mut timer, Some(100_000)).unwrap();
        assert_eq!(mock.last_start(), Some(1563));

        assert_eq!(timer.expire(), Some(EntityId::PhysRx));
        assert_eq!(rx.on_timer_expired(&mut timer).unwrap(), Some(RxEvent::IdleTimeout));
        assert_eq!(rx.idle_timeout(), None);
        assert!(!timer.is_armed());

        // Stale expiry after the timeout was consumed
        assert_eq!(rx.on_timer_expired(&mut timer).unwrap(), None);
    }

    #[test]
    fn test_idle_timeout_counts_down_across_symbols() {
        let mock = MockTimer::new();
        let mut timer = SymbolTimer::new(mock.clone());
        let mut rx = PhysRx::new();
        rx.start_listen(&mut timer, Some(10_000)).unwrap();

        // An IFS-terminated pulse brings RX back to Idle
        pulse(&mut rx, &mut timer, 0, 64);
        timer.expire();
        rx.on_timer_expired(&mut timer).unwrap();
        assert_eq!(rx.state(), RxState::Idle);
        assert_eq!(timer.owner(), Some(EntityId::PhysRx));
        // 64us pulse + 320us watchdog already spent
        assert_eq!(rx.idle_timeout(), Some(10_000 - 64 - 320));
        assert_eq!(mock.last_start(), Some(150));

        rx.clear_idle_timeout(&mut timer);
        assert!(!timer.is_armed());
        assert!(rx.is_listening());
    }

    #[test]
    fn test_idle_timeout_not_extended_by_noise() {
        let mock = MockTimer::new();
        let mut timer = SymbolTimer::new(mock.clone());
        let mut rx = PhysRx::new();
        rx.start_listen(&mut timer, Some(100_000)).unwrap();

        // Glitch pulses 40ms apart, each closed by the passive watchdog
        for _ in 0..2 {
            pulse(&mut rx, &mut timer, 40_000, 64);
            assert_eq!(timer.expire(), Some(EntityId::PhysRx));
            assert_eq!(rx.on_timer_expired(&mut timer).unwrap(), Some(RxEvent::Symbol(Symbol::Ifs)));
        }
        // The second gap already had 320us of it spent by the first watchdog
        assert_eq!(rx.idle_timeout(), Some(100_000 - 40_000 - 64 - 320 - (40_000 - 320) - 64 - 320));

        // A gap longer than what is left still yields a single timeout
        pulse(&mut rx, &mut timer, 50_000, 64);
        assert_eq!(rx.idle_timeout(), Some(0));
        timer.expire();
        rx.on_timer_expired(&mut timer).unwrap();
        assert_eq!(mock.last_start(), Some(1));
        assert_eq!(timer.expire(), Some(EntityId::PhysRx));
        assert_eq!(rx.on_timer_expired(&mut timer).unwrap(), Some(RxEvent::IdleTimeout));
        assert_eq!(rx.idle_timeout(), None);
    }

    #[test]
    fn test_stop_listen_releases_timer() {
        let (mut rx, mut timer, mock) = listening();
        rx.on_edge(&mut timer, Level::Active, 0).unwrap();
        rx.stop_listen(&mut timer);
        assert_eq!(rx.state(), RxState::Off);
        assert!(!timer.is_armed());
        assert_eq!(mock.deadline(), None);
    }

    #[test]
    fn test_quantized_frame_tail() {
        let (mut rx, mut timer, _mock) = listening();
        let sequence = [Symbol::Sof, Symbol::BitZero, Symbol::BitOne, Symbol::Eod, Symbol::Eof];
        let mut seen = Vec::new();
        let mut prev_passive = 0;

        for symbol in sequence {
            let t = symbol.timing().unwrap();
            if let Some(RxEvent::Symbol(s)) = pulse(&mut rx, &mut timer, prev_passive, quantize_us(t.active_us)) {
                seen.push(s);
            }
            prev_passive = quantize_us(t.passive_us);
        }

        // The IFS delimiter closes the EOF, the passive watchdog closes the IFS
        if let Some(RxEvent::Symbol(s)) = pulse(&mut rx, &mut timer, prev_passive, 64) {
            seen.push(s);
        }
        assert_eq!(timer.expire(), Some(EntityId::PhysRx));
        if let Some(RxEvent::Symbol(s)) = rx.on_timer_expired(&mut timer).unwrap() {
            seen.push(s);
        }

        assert_eq!(
            seen,
            vec![Symbol::Sof, Symbol::BitZero, Symbol::BitOne, Symbol::Eod, Symbol::Eof, Symbol::Ifs]
        );
        assert_eq!(rx.state(), RxState::Idle);
    }
}
