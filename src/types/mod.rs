mod dependency;
mod diagnostic;
mod dialect;
mod error;

pub use dependency::*;
pub use diagnostic::*;
pub use dialect::*;
pub use error::*;
