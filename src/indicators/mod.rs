// Technical indicators used by sizing and signal generation

pub mod atr;
pub mod moving_average;

pub use atr::calculate_atr;
pub use moving_average::calculate_sma;
