mod latching;

pub use latching::{ExternalTrigger, LatchEvent, LatchingSensor, Override, effective_state};
