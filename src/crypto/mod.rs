mod signing;

pub use signing::*;
