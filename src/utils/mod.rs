//! Small serde helpers shared by the types.

pub mod time;
