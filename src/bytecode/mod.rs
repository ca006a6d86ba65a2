//! Binary build of a project for a native execution backend.
//!
//! Every component contributes a record with its pin tables, wire targets,
//! compiled expression properties and a kind-specific part. The layout of a
//! kind-specific record only ever grows; `FORMAT_VERSION` changes otherwise.

pub mod artifact;
pub mod assets;
pub mod buffer;
pub mod compiler;
pub mod opcode;
pub mod visualizer;

pub use artifact::{CompiledProject, FORMAT_VERSION};
pub use assets::{Assets, NativeAssets, NativeComponent, NativeFlow, NativeInput, NativeWire};
pub use buffer::{DataBuffer, DataReader};
pub use compiler::{build_project, decode_expression};
pub use opcode::OpCode;
pub use visualizer::Disassembly;
