pub mod diagnostics;
pub mod plan;
pub mod validate;

pub use diagnostics::*;
pub use plan::*;
pub use validate::*;
