//! Hardware definitions shared by the 3DS filesystem emulation.

pub mod fs;
pub mod result;
