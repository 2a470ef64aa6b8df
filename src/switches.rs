//! Debounced bump switches.
//!
//! Each line gets a [`Debouncer`]: a raw level that differs from the stable
//! state opens a candidate window, and the stable state only changes once
//! the raw level has held for `debounce_ms` across consecutive polls. A
//! bounce back closes the window.
//!
//! ```rust
//! use rover_io::switches::Debouncer;
//!
//! let mut d = Debouncer::new();
//! assert_eq!(d.update(false, 0, 20), None); // first poll adopts the level
//! assert_eq!(d.update(true, 5, 20), None); // candidate opened
//! assert_eq!(d.update(false, 10, 20), None); // bounce, window closed
//! assert_eq!(d.update(true, 15, 20), None);
//! assert_eq!(d.update(true, 35, 20), Some(true)); // held 20 ms
//! assert!(d.state());
//! ```

use heapless::Vec as HVec;
use log::debug;

use crate::config::{SwitchConfig, SwitchPins};
use crate::frame::SwitchStates;
use crate::traits::{Bits, PortBus, PortId};

const SWITCH_NAMES: [&str; 4] = ["top_left", "top_right", "bottom_left", "bottom_right"];

/// Time-window debouncer for one line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Debouncer {
    stable: Option<bool>,
    candidate_since: Option<u64>,
}

impl Debouncer {
    /// A debouncer that has not seen a poll yet.
    pub const fn new() -> Self {
        Self {
            stable: None,
            candidate_since: None,
        }
    }

    /// Feeds one raw sample. Returns the new stable state when it changes.
    ///
    /// The first sample is adopted as stable without reporting a change.
    pub fn update(&mut self, raw: bool, now_ms: u64, window_ms: u32) -> Option<bool> {
        let Some(stable) = self.stable else {
            self.stable = Some(raw);
            return None;
        };

        if raw == stable {
            self.candidate_since = None;
            return None;
        }

        let since = *self.candidate_since.get_or_insert(now_ms);
        if now_ms.saturating_sub(since) >= u64::from(window_ms) {
            self.stable = Some(raw);
            self.candidate_since = None;
            return Some(raw);
        }
        None
    }

    /// Stable state; `false` before the first poll.
    #[inline]
    pub fn state(&self) -> bool {
        self.stable.unwrap_or(false)
    }

    /// A change is pending confirmation.
    #[inline]
    pub fn is_settling(&self) -> bool {
        self.candidate_since.is_some()
    }
}

/// The four bump switches.
#[derive(Debug)]
pub struct ContactSwitchPanel {
    pins: SwitchPins,
    config: SwitchConfig,
    debouncers: [Debouncer; 4],
    changed: [bool; 4],
}

impl ContactSwitchPanel {
    /// Creates a panel; every switch reads released until the first poll.
    pub fn new(pins: SwitchPins, config: SwitchConfig) -> Self {
        Self {
            pins,
            config,
            debouncers: [Debouncer::new(); 4],
            changed: [false; 4],
        }
    }

    /// Samples all four lines and returns the debounced states.
    ///
    /// Each distinct port is read once, so switches sharing a port are
    /// sampled at the same instant.
    pub fn poll<B: PortBus>(&mut self, bus: &mut B, now_ms: u64) -> SwitchStates {
        let lines = self.pins.as_array();
        let mut snapshot: HVec<(PortId, Bits), 4> = HVec::new();

        for (i, pin) in lines.iter().enumerate() {
            let bits = match snapshot.iter().find(|(p, _)| *p == pin.port) {
                Some(&(_, bits)) => bits,
                None => {
                    let bits = bus.read(pin.port);
                    // At most four distinct ports.
                    let _ = snapshot.push((pin.port, bits));
                    bits
                }
            };
            let pressed = self.config.polarity.is_asserted(bits & pin.mask() != 0);
            let change = self.debouncers[i].update(pressed, now_ms, self.config.debounce_ms);
            self.changed[i] = change.is_some();
            if let Some(state) = change {
                debug!(
                    "switch {}: {}",
                    SWITCH_NAMES[i],
                    if state { "pressed" } else { "released" }
                );
            }
        }
        self.states()
    }

    /// Debounced states as of the last poll.
    pub fn states(&self) -> SwitchStates {
        SwitchStates::from_array(self.debouncers.map(|d| d.state()))
    }

    /// Which switches changed state during the last poll, in frame order.
    pub fn changed(&self) -> [bool; 4] {
        self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{mega2560, MockPortBus};

    #[test]
    fn first_poll_adopts_level() {
        let mut d = Debouncer::new();
        assert!(!d.state());
        assert_eq!(d.update(true, 100, 20), None);
        assert!(d.state());
    }

    #[test]
    fn short_flip_ignored() {
        let mut d = Debouncer::new();
        d.update(false, 0, 30);
        for t in [10, 20] {
            assert_eq!(d.update(true, t, 30), None);
        }
        assert!(d.is_settling());
        assert_eq!(d.update(false, 30, 30), None);
        assert!(!d.is_settling());
        assert!(!d.state());
    }

    #[test]
    fn held_flip_reported_once() {
        let mut d = Debouncer::new();
        d.update(false, 0, 30);
        assert_eq!(d.update(true, 10, 30), None);
        assert_eq!(d.update(true, 20, 30), None);
        assert_eq!(d.update(true, 40, 30), Some(true));
        assert_eq!(d.update(true, 50, 30), None);
    }

    #[test]
    fn zero_window_is_immediate() {
        let mut d = Debouncer::new();
        d.update(false, 0, 0);
        assert_eq!(d.update(true, 1, 0), Some(true));
    }

    #[test]
    fn panel_reads_active_low_switches() {
        let pins = mega2560::pin_map().switches;
        let mut bus = MockPortBus::mega2560();
        let mut panel = ContactSwitchPanel::new(pins, SwitchConfig::default());

        // All released: pulled high.
        bus.set_input(pins.top_left.port, 0x0F);
        assert_eq!(panel.poll(&mut bus, 0), SwitchStates::default());

        bus.set_input_pin(pins.top_right, false);
        assert!(!panel.poll(&mut bus, 10).top_right);
        let states = panel.poll(&mut bus, 30);
        assert!(states.top_right);
        assert_eq!(panel.changed(), [false, true, false, false]);

        panel.poll(&mut bus, 40);
        assert_eq!(panel.changed(), [false; 4]);
    }

    #[test]
    fn shared_port_read_once_per_poll() {
        let pins = mega2560::pin_map().switches;
        let mut bus = MockPortBus::mega2560();
        let mut panel = ContactSwitchPanel::new(pins, SwitchConfig::default());

        panel.poll(&mut bus, 0);
        assert_eq!(bus.reads_of(pins.top_left.port), 1);
    }
}
