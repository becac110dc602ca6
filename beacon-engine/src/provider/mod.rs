//! Injectable capabilities
//!
//! Time and randomness are passed into the engine as trait objects so tests
//! can swap in deterministic fakes without touching the run state machine.

pub mod chance;
pub mod clock;

pub use chance::{Chance, RandomChance};
pub use clock::{Clock, FakeClock, SystemClock};
