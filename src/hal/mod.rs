//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test doubles for desktop development
//! - `pin_bank`: [`PortBus`](crate::traits::PortBus) over `embedded-hal` pins and PWM channels
//! - `mega2560`: Pin manifest of the ATmega2560 robot board

pub mod mega2560;
pub mod mock;
pub mod pin_bank;

pub use mock::*;
pub use pin_bank::{BankPin, PinBankBus};
