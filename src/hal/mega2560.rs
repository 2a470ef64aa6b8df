//! Pin manifest for the ATmega2560 (Arduino Mega) robot board.
//!
//! Arduino pin numbers from the wiring manifest, translated to the
//! ATmega2560 port/bit they live on:
//!
//! | Line | Arduino pin | Port/bit |
//! |------|-------------|----------|
//! | Left motor PWM / DIR / EN | D5 / D38 / D36 | OCR3A / PD7 / PC1 |
//! | Right motor PWM / DIR / EN | D2 / D3 / D4 | OCR3B / PE5 / PG5 |
//! | Relay K1 / K2 | D52 / D53 | PB1 / PB0 |
//! | Switches TL / TR / BL / BR | A1 / A2 / A0 / A3 | PF1 / PF2 / PF0 / PF3 |
//! | Capacitive sample / discharge / charge | A15 / A14 / A13 | ADC15 / PK6 / PK5 |
//! | Waveform ADC data | D22–D29 | PORTA |
//! | Waveform ADC RD / INT / CS | D30 / D32 / D34 | PC7 / PC5 / PC3 |
//! | Encoders left / right | D46 / D48 | PL3 / PL1 |
//! | Reflectance array | 51,12,11,10,9,8,7,6,33,35,37,39,41,43,45,47 | RC-timed |
//!
//! PWM duty is written to the 8-bit compare registers, modelled as their
//! own ports.

use crate::config::{
    AdcPins, BusAssignment, CapacitivePins, EncoderPins, MotorPins, PinMap, RelayPins, SwitchPins,
    REFLECTANCE_CHANNELS,
};
use crate::traits::{PinAssignment, PortId, SampleChannel};

/// Digital I/O ports.
pub mod ports {
    use crate::traits::PortId;

    /// PORTA (D22–D29).
    pub const PORT_A: PortId = PortId(0);
    /// PORTB.
    pub const PORT_B: PortId = PortId(1);
    /// PORTC (D30–D37).
    pub const PORT_C: PortId = PortId(2);
    /// PORTD.
    pub const PORT_D: PortId = PortId(3);
    /// PORTE.
    pub const PORT_E: PortId = PortId(4);
    /// PORTF (A0–A7).
    pub const PORT_F: PortId = PortId(5);
    /// PORTG, six lines wide.
    pub const PORT_G: PortId = PortId(6);
    /// PORTH.
    pub const PORT_H: PortId = PortId(7);
    /// PORTJ.
    pub const PORT_J: PortId = PortId(8);
    /// PORTK (A8–A15).
    pub const PORT_K: PortId = PortId(9);
    /// PORTL.
    pub const PORT_L: PortId = PortId(10);

    /// Timer 3 compare A (D5).
    pub const OCR3A: PortId = PortId(0x30);
    /// Timer 3 compare B (D2).
    pub const OCR3B: PortId = PortId(0x31);

    /// Every digital port with its width.
    pub const DIGITAL: [(PortId, u8); 11] = [
        (PORT_A, 8),
        (PORT_B, 8),
        (PORT_C, 8),
        (PORT_D, 8),
        (PORT_E, 8),
        (PORT_F, 8),
        (PORT_G, 6),
        (PORT_H, 8),
        (PORT_J, 8),
        (PORT_K, 8),
        (PORT_L, 8),
    ];

    /// PWM compare registers with their duty resolution.
    pub const PWM: [(PortId, u8); 2] = [(OCR3A, 8), (OCR3B, 8)];
}

/// Line assignments from the manifest.
pub mod pins {
    use super::ports::*;
    use crate::traits::PinAssignment;

    // =========================================================================
    // Motors
    // =========================================================================

    /// Left motor direction (D38).
    pub const LEFT_DIR: PinAssignment = PinAssignment::new(PORT_D, 7);
    /// Left motor enable (D36).
    pub const LEFT_EN: PinAssignment = PinAssignment::new(PORT_C, 1);
    /// Right motor direction (D3).
    pub const RIGHT_DIR: PinAssignment = PinAssignment::new(PORT_E, 5);
    /// Right motor enable (D4).
    pub const RIGHT_EN: PinAssignment = PinAssignment::new(PORT_G, 5);

    // =========================================================================
    // Relays
    // =========================================================================

    /// Relay K1 (D52).
    pub const RELAY_K1: PinAssignment = PinAssignment::new(PORT_B, 1);
    /// Relay K2 (D53).
    pub const RELAY_K2: PinAssignment = PinAssignment::new(PORT_B, 0);

    // =========================================================================
    // Bump switches
    // =========================================================================

    /// Top-left switch (A1, orange).
    pub const TOP_LEFT_SWITCH: PinAssignment = PinAssignment::new(PORT_F, 1);
    /// Top-right switch (A2, yellow).
    pub const TOP_RIGHT_SWITCH: PinAssignment = PinAssignment::new(PORT_F, 2);
    /// Bottom-left switch (A0, green).
    pub const BOTTOM_LEFT_SWITCH: PinAssignment = PinAssignment::new(PORT_F, 0);
    /// Bottom-right switch (A3, red).
    pub const BOTTOM_RIGHT_SWITCH: PinAssignment = PinAssignment::new(PORT_F, 3);

    // =========================================================================
    // Capacitive contact
    // =========================================================================

    /// Discharges the sense capacitor (A14).
    pub const CAP_DISCHARGE: PinAssignment = PinAssignment::new(PORT_K, 6);
    /// Charges the sense capacitor (A13).
    pub const CAP_CHARGE: PinAssignment = PinAssignment::new(PORT_K, 5);
    /// Analog input sampling the capacitor (A15).
    pub const CAP_SAMPLE_ANALOG: u8 = 15;

    // =========================================================================
    // Waveform ADC
    // =========================================================================

    /// RD strobe (D30).
    pub const ADC_RD: PinAssignment = PinAssignment::new(PORT_C, 7);
    /// INT flag (D32).
    pub const ADC_INT: PinAssignment = PinAssignment::new(PORT_C, 5);
    /// Chip select (D34).
    pub const ADC_CS: PinAssignment = PinAssignment::new(PORT_C, 3);
    /// Data bus mask on PORTA.
    pub const ADC_DATA_MASK: u16 = 0xFF;

    // =========================================================================
    // Encoders and line sensors
    // =========================================================================

    /// Left wheel encoder (D46).
    pub const LEFT_ENCODER: PinAssignment = PinAssignment::new(PORT_L, 3);
    /// Right wheel encoder (D48).
    pub const RIGHT_ENCODER: PinAssignment = PinAssignment::new(PORT_L, 1);

    /// Reflectance sensor pins, left to right.
    pub const REFLECTANCE: [u8; 16] = [51, 12, 11, 10, 9, 8, 7, 6, 33, 35, 37, 39, 41, 43, 45, 47];
}

/// The manifest as a [`PinMap`].
pub fn pin_map() -> PinMap {
    let mut reflectance = [SampleChannel::timed(0); REFLECTANCE_CHANNELS];
    for (slot, pin) in reflectance.iter_mut().zip(pins::REFLECTANCE) {
        *slot = SampleChannel::timed(pin);
    }

    PinMap {
        left_motor: MotorPins {
            pwm: ports::OCR3A,
            dir: pins::LEFT_DIR,
            enable: pins::LEFT_EN,
        },
        right_motor: MotorPins {
            pwm: ports::OCR3B,
            dir: pins::RIGHT_DIR,
            enable: pins::RIGHT_EN,
        },
        relays: RelayPins {
            k1: pins::RELAY_K1,
            k2: pins::RELAY_K2,
        },
        switches: SwitchPins {
            top_left: pins::TOP_LEFT_SWITCH,
            top_right: pins::TOP_RIGHT_SWITCH,
            bottom_left: pins::BOTTOM_LEFT_SWITCH,
            bottom_right: pins::BOTTOM_RIGHT_SWITCH,
        },
        capacitive: CapacitivePins {
            sample: SampleChannel::analog(pins::CAP_SAMPLE_ANALOG),
            discharge: pins::CAP_DISCHARGE,
            charge: pins::CAP_CHARGE,
        },
        adc: AdcPins {
            data: BusAssignment::new(ports::PORT_A, pins::ADC_DATA_MASK),
            rd: pins::ADC_RD,
            int: pins::ADC_INT,
            cs: pins::ADC_CS,
        },
        reflectance,
        encoders: EncoderPins {
            left: pins::LEFT_ENCODER,
            right: pins::RIGHT_ENCODER,
        },
    }
}

/// Output lines on each digital port, for backends that model direction.
pub fn output_masks() -> [(PortId, u16); 6] {
    let out = |pins: &[PinAssignment]| pins.iter().fold(0u16, |m, p| m | p.mask());
    [
        (ports::PORT_B, out(&[pins::RELAY_K1, pins::RELAY_K2])),
        (
            ports::PORT_C,
            out(&[pins::LEFT_EN, pins::ADC_RD, pins::ADC_CS]),
        ),
        (ports::PORT_D, out(&[pins::LEFT_DIR])),
        (ports::PORT_E, out(&[pins::RIGHT_DIR])),
        (ports::PORT_G, out(&[pins::RIGHT_EN])),
        (
            ports::PORT_K,
            out(&[pins::CAP_DISCHARGE, pins::CAP_CHARGE]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_masks_match_manifest() {
        // RD set mask 0b1000_0000, INT set mask 0b0010_0000 on PORTC.
        assert_eq!(pins::ADC_RD.mask(), 0b1000_0000);
        assert_eq!(pins::ADC_INT.mask(), 0b0010_0000);
        assert_eq!(pins::ADC_RD.port, ports::PORT_C);
        assert_eq!(pins::ADC_INT.port, ports::PORT_C);
    }

    #[test]
    fn reflectance_order_preserved() {
        let map = pin_map();
        assert_eq!(map.reflectance[0], SampleChannel::timed(51));
        assert_eq!(map.reflectance[7], SampleChannel::timed(6));
        assert_eq!(map.reflectance[15], SampleChannel::timed(47));
    }

    #[test]
    fn output_masks_exclude_inputs() {
        let masks = output_masks();
        let (_, port_c) = masks.iter().find(|(p, _)| *p == ports::PORT_C).unwrap();
        assert_eq!(*port_c & pins::ADC_INT.mask(), 0);
        assert_ne!(*port_c & pins::ADC_RD.mask(), 0);
    }
}
