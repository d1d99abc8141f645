//! Geographic primitives.
//!
//! ## Contents
//! - [`Position`] validated latitude/longitude/timestamp sample
//! - [`eta`] great-circle distance and arrival estimate
//! - [`LocationRecord`] position-shaped record from the REST polling fallback

pub mod eta;
mod position;
mod record;

pub use position::Position;
pub(crate) use position::system_time_from_millis;
pub use record::LocationRecord;
