// src/test_support.rs

//! Shared mocks and a small bus simulator for the unit tests.

use crate::common::hal_traits::{Level, Polarity, VpwTimer};
use crate::common::symbol::Symbol;
use crate::common::timing::{quantize_us, TICK_US};
use crate::link::{DataLink, DlEvent};
use crate::phys::Physical;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embedded_hal::digital::{self, ErrorType, OutputPin};
use std::rc::Rc;
use std::vec::Vec;

// --- Mock Clock ---

/// Simulated time in microseconds, shared between the mocks of one node.
#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn now(&self) -> u64 {
        self.0.get()
    }
    pub fn set(&self, us: u64) {
        self.0.set(us);
    }
    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

// --- Mock Pin ---

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Output pin that records every write as `(is_high, time_us)`.
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    clock: Clock,
    writes: Rc<RefCell<Vec<(bool, u64)>>>,
    failing: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new(clock: Clock) -> Self {
        MockPin { clock, ..Default::default() }
    }
    pub fn writes(&self) -> Vec<(bool, u64)> {
        self.writes.borrow().clone()
    }
    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }
    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
    fn record(&mut self, high: bool) -> Result<(), MockPinError> {
        if self.failing.get() {
            return Err(MockPinError);
        }
        self.writes.borrow_mut().push((high, self.clock.now()));
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false)
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true)
    }
}

// --- Mock Timer ---

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<u64>,
    starts: Vec<u32>,
    cancels: u32,
}

/// One-shot timer running on a [`Clock`].
#[derive(Debug, Clone, Default)]
pub struct MockTimer {
    clock: Clock,
    state: Rc<RefCell<TimerState>>,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_clock(clock: Clock) -> Self {
        MockTimer { clock, ..Default::default() }
    }
    pub fn deadline(&self) -> Option<u64> {
        self.state.borrow().deadline
    }
    pub fn last_start(&self) -> Option<u32> {
        self.state.borrow().starts.last().copied()
    }
    pub fn starts(&self) -> Vec<u32> {
        self.state.borrow().starts.clone()
    }
    pub fn cancel_count(&self) -> u32 {
        self.state.borrow().cancels
    }
    /// Moves the clock to the pending deadline and consumes it.
    pub fn fire(&self) -> bool {
        let deadline = self.state.borrow_mut().deadline.take();
        match deadline {
            Some(at) => {
                self.clock.set(at);
                true
            }
            None => false,
        }
    }
}

impl VpwTimer for MockTimer {
    fn start(&mut self, ticks: u32) {
        let mut state = self.state.borrow_mut();
        state.starts.push(ticks);
        state.deadline = Some(self.clock.now() + u64::from(ticks) * u64::from(TICK_US));
    }
    fn cancel(&mut self) {
        let mut state = self.state.borrow_mut();
        state.cancels += 1;
        state.deadline = None;
    }
    fn wait(&mut self) -> nb::Result<(), Infallible> {
        let mut state = self.state.borrow_mut();
        match state.deadline {
            Some(at) if at <= self.clock.now() => {
                state.deadline = None;
                Ok(())
            }
            _ => Err(nb::Error::WouldBlock),
        }
    }
}

// --- Bus Simulation ---

/// Converts recorded pin writes into bus edges, dropping writes that did not
/// change the level.
pub fn pin_edges(writes: &[(bool, u64)], polarity: Polarity) -> Vec<(Level, u64)> {
    let mut level = Level::Passive;
    let mut edges = Vec::new();
    for &(high, at) in writes {
        let next = polarity.level(high);
        if next != level {
            edges.push((next, at));
            level = next;
        }
    }
    edges
}

/// Bus edges for a symbol sequence sent by an ideal tick-quantized transmitter.
pub fn symbol_edges(symbols: &[Symbol], start: u64) -> Vec<(Level, u64)> {
    let mut edges = Vec::new();
    let mut at = start;
    for symbol in symbols {
        let timing = symbol.timing().expect("only valid symbols go on the wire");
        edges.push((Level::Active, at));
        at += u64::from(quantize_us(timing.active_us));
        edges.push((Level::Passive, at));
        at += u64::from(quantize_us(timing.passive_us));
    }
    edges
}

/// A node on the simulated bus.
pub trait SimNode {
    type Event;
    fn edge(&mut self, level: Level, elapsed_us: u32) -> Option<Self::Event>;
    fn timer_expired(&mut self) -> Option<Self::Event>;
    fn transmitting(&self) -> bool;
}

/// Runs the node's timer until its transmission is over.
pub fn run_transmit<N: SimNode>(node: &mut N, timer: &MockTimer) -> Vec<N::Event> {
    let mut events = Vec::new();
    let mut guard = 0;
    while node.transmitting() && timer.fire() {
        events.extend(node.timer_expired());
        guard += 1;
        assert!(guard < 1_000, "transmission never finished");
    }
    events
}

/// Fires every timer expiry due at or before `until`.
pub fn run_until<N: SimNode>(node: &mut N, timer: &MockTimer, clock: &Clock, until: u64) -> Vec<N::Event> {
    let mut events = Vec::new();
    while let Some(deadline) = timer.deadline() {
        if deadline > until {
            break;
        }
        timer.fire();
        events.extend(node.timer_expired());
    }
    if clock.now() < until {
        clock.set(until);
    }
    events
}

/// Feeds `edges` to `node` starting at the node's current time, firing its
/// timer whenever an expiry falls between edges, then lets `tail_us` pass.
pub fn replay<N: SimNode>(
    node: &mut N,
    timer: &MockTimer,
    clock: &Clock,
    edges: &[(Level, u64)],
    tail_us: u64,
) -> Vec<N::Event> {
    let mut events = Vec::new();
    let Some(&(_, first)) = edges.first() else {
        return events;
    };
    let base = clock.now();
    let mut last = base;

    for &(level, at) in edges {
        let at = base + (at - first);
        events.extend(run_until(node, timer, clock, at));
        clock.set(at);
        events.extend(node.edge(level, (at - last) as u32));
        last = at;
    }

    let end = clock.now() + tail_us;
    events.extend(run_until(node, timer, clock, end));
    events
}

// --- Simulated Nodes ---

impl SimNode for DataLink<MockPin, MockTimer> {
    type Event = DlEvent;

    fn edge(&mut self, level: Level, elapsed_us: u32) -> Option<DlEvent> {
        self.on_edge(level, elapsed_us).expect("edge handling failed")
    }
    fn timer_expired(&mut self) -> Option<DlEvent> {
        self.on_timer_expired().expect("timer handling failed")
    }
    fn transmitting(&self) -> bool {
        self.is_transmitting()
    }
}

/// A data link wired to mocks that share one clock.
pub struct LinkNode {
    pub link: DataLink<MockPin, MockTimer>,
    pub pin: MockPin,
    pub timer: MockTimer,
    pub clock: Clock,
}

impl LinkNode {
    pub fn new(response_timeout_us: Option<u32>) -> Self {
        let clock = Clock::new();
        let pin = MockPin::new(clock.clone());
        let timer = MockTimer::with_clock(clock.clone());
        let phys = Physical::new(pin.clone(), timer.clone(), Polarity::ActiveHigh);
        LinkNode { link: DataLink::new(phys, response_timeout_us), pin, timer, clock }
    }

    /// A node that has been started and is listening.
    pub fn listening(response_timeout_us: Option<u32>) -> Self {
        let mut node = Self::new(response_timeout_us);
        node.link.start().expect("start failed");
        node
    }
}
