pub mod markup;
pub mod reference_day;
pub mod streak;

pub use reference_day::ReferenceClock;
