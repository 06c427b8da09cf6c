mod event;
mod fields;
mod job;
mod record;

pub use event::*;
pub use fields::*;
pub use job::*;
pub use record::*;
