pub mod errors;

pub use errors::{GuardError, GuardResult};
