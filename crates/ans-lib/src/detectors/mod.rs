pub mod beats;

pub use beats::detect_beats;
