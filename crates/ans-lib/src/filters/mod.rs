pub mod butterworth;

pub use butterworth::{bandpass, design_bandpass, Biquad, SosFilter};
