//! Typed values for the SX1276 register map.

pub mod dio;
pub mod irq;
pub mod mode;
pub mod modem;

pub use dio::*;
pub use irq::*;
pub use mode::*;
pub use modem::*;
