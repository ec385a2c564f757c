pub mod codec;
pub mod projector;

pub use codec::*;
pub use projector::*;
