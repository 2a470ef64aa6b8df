//! [`PortBus`] backend over individual `embedded-hal` pins.
//!
//! Most HAL crates hand out one typed object per GPIO rather than raw port
//! registers. [`PinBankBus`] groups them into 8-bit virtual ports so the
//! core can address them by [`PortId`] and bit, and exposes each PWM
//! channel as an 8-bit duty port.
//!
//! Port numbering: digital rows are `PortId(0)..PortId(PORTS)`, PWM
//! channels follow at `PortId(PORTS)..PortId(PORTS + PWMS)`.
//!
//! Pins must be infallible (`Error = Infallible`), which is the case for
//! on-chip GPIO in the common HAL crates.

use core::convert::Infallible;

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use crate::traits::{Bits, PinAssignment, PortBus, PortId};

/// Lines per virtual port.
pub const BANK_WIDTH: u8 = 8;

/// Duty resolution exposed for PWM ports.
pub const PWM_WIDTH: u8 = 8;

const PWM_FULL_SCALE: u16 = (1 << PWM_WIDTH) - 1;

/// One slot in a virtual port.
#[derive(Debug)]
pub enum BankPin<I, O> {
    /// Sampled on `read`.
    Input(I),
    /// Driven from the latch on `store`.
    Output(O),
    /// No line; reads low, ignores writes.
    Unused,
}

/// Virtual ports built from individual pins and PWM channels.
#[derive(Debug)]
pub struct PinBankBus<I, O, W, const PORTS: usize, const PWMS: usize> {
    rows: [[BankPin<I, O>; 8]; PORTS],
    latches: [Bits; PORTS],
    pwm: [W; PWMS],
    duties: [Bits; PWMS],
}

impl<I, O, W, const PORTS: usize, const PWMS: usize> PinBankBus<I, O, W, PORTS, PWMS>
where
    I: InputPin<Error = Infallible>,
    O: OutputPin<Error = Infallible>,
    W: SetDutyCycle<Error = Infallible>,
{
    /// Creates a bus. Latches start low; outputs are not touched until the
    /// first store.
    pub fn new(rows: [[BankPin<I, O>; 8]; PORTS], pwm: [W; PWMS]) -> Self {
        Self {
            rows,
            latches: [0; PORTS],
            pwm,
            duties: [0; PWMS],
        }
    }

    /// Handle of digital row `row`.
    pub const fn port(row: u8) -> PortId {
        PortId(row)
    }

    /// Address of line `bit` in digital row `row`.
    pub const fn pin(row: u8, bit: u8) -> PinAssignment {
        PinAssignment::new(PortId(row), bit)
    }

    /// Handle of PWM channel `channel`.
    pub const fn pwm_port(channel: u8) -> PortId {
        PortId(PORTS as u8 + channel)
    }

    fn slot(port: PortId) -> Slot {
        let id = usize::from(port.0);
        if id < PORTS {
            Slot::Row(id)
        } else if id < PORTS + PWMS {
            Slot::Pwm(id - PORTS)
        } else {
            Slot::Unknown
        }
    }
}

enum Slot {
    Row(usize),
    Pwm(usize),
    Unknown,
}

fn infallible<T>(r: Result<T, Infallible>) -> T {
    match r {
        Ok(v) => v,
        Err(never) => match never {},
    }
}

impl<I, O, W, const PORTS: usize, const PWMS: usize> PortBus for PinBankBus<I, O, W, PORTS, PWMS>
where
    I: InputPin<Error = Infallible>,
    O: OutputPin<Error = Infallible>,
    W: SetDutyCycle<Error = Infallible>,
{
    fn width(&self, port: PortId) -> Option<u8> {
        match Self::slot(port) {
            Slot::Row(_) => Some(BANK_WIDTH),
            Slot::Pwm(_) => Some(PWM_WIDTH),
            Slot::Unknown => None,
        }
    }

    fn read(&mut self, port: PortId) -> Bits {
        match Self::slot(port) {
            Slot::Row(r) => {
                let latch = self.latches[r];
                self.rows[r]
                    .iter_mut()
                    .enumerate()
                    .fold(0, |bits, (bit, pin)| {
                        let high = match pin {
                            BankPin::Input(p) => infallible(p.is_high()),
                            BankPin::Output(_) => latch & (1 << bit) != 0,
                            BankPin::Unused => false,
                        };
                        if high {
                            bits | (1 << bit)
                        } else {
                            bits
                        }
                    })
            }
            Slot::Pwm(c) => self.duties[c],
            Slot::Unknown => panic!("pin bank has no {port}"),
        }
    }

    fn latch(&self, port: PortId) -> Bits {
        match Self::slot(port) {
            Slot::Row(r) => self.latches[r],
            Slot::Pwm(c) => self.duties[c],
            Slot::Unknown => panic!("pin bank has no {port}"),
        }
    }

    fn store(&mut self, port: PortId, bits: Bits) {
        match Self::slot(port) {
            Slot::Row(r) => {
                let bits = bits & 0xFF;
                for (bit, pin) in self.rows[r].iter_mut().enumerate() {
                    if let BankPin::Output(p) = pin {
                        infallible(p.set_state((bits & (1 << bit) != 0).into()));
                    }
                }
                self.latches[r] = bits;
            }
            Slot::Pwm(c) => {
                let duty = bits & PWM_FULL_SCALE;
                infallible(self.pwm[c].set_duty_cycle_fraction(duty, PWM_FULL_SCALE));
                self.duties[c] = duty;
            }
            Slot::Unknown => panic!("pin bank has no {port}"),
        }
    }
}
