//! Mock reader implementation for testing and development.
//!
//! This module provides a simulated PC/SC reader with an emulated MIFARE
//! Classic card that can be controlled programmatically without requiring
//! physical hardware.

pub mod reader;

pub use reader::{MockCard, MockChannel, MockReader, MockReaderHandle};
