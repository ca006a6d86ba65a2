pub mod conversion;
pub mod definition;
pub mod graph;
pub mod pins;
pub mod validation;

pub use conversion::*;
pub use definition::*;
pub use graph::*;
pub use pins::*;
pub use validation::validate;
