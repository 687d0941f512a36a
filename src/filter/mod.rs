pub mod ema;
pub mod one_euro;

pub use ema::Ema;
pub use one_euro::OneEuroFilter;
