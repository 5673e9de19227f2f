//! Small shared helpers: money formatting/parsing, clocks, date math.

pub mod clock;
pub mod money;
pub mod time_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use money::{format_cents, parse_amount};
