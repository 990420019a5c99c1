pub mod memo;
pub mod priority;
pub mod timestamp;
