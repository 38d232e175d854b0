pub mod raw_step;
pub mod result;
pub mod workflow;

pub use raw_step::*;
pub use result::*;
pub use workflow::*;
