pub mod selector;
pub mod strategies;
pub mod supplier;

pub use selector::{SelectionOutcome, ZonePreferenceSelector, ZoneSelection};
pub use strategies::RoundRobin;
pub use supplier::ZoneAwareSupplier;
