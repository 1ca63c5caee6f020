pub mod audit;
pub mod document;
pub mod enums;
pub mod order;

pub use audit::*;
pub use document::*;
pub use enums::*;
pub use order::*;
