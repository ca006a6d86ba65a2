//! # Nagare - Dataflow Runtime for Wired Component Graphs
//!
//! **Nagare** executes projects built from *flows*: graphs of typed components
//! wired together through named input and output pins. Sequence pins
//! (`@seqin`/`@seqout`) order execution; data pins carry values. The runtime
//! schedules ready components cooperatively, keeps per-component state across
//! invocations, calls flows as sub-flows with isolated local variables and
//! routes failures up the call chain until a Catch-error component absorbs them.
//!
//! ## Core Workflow
//!
//! 1.  **Describe the project**: build a [`flow::Project`] directly, deserialize it
//!     from JSON, or implement [`flow::IntoProject`] for your own document format.
//! 2.  **Build a runtime**: `Runtime::builder(project)` validates the wiring and
//!     evaluates global variable defaults. Host services, clock and configuration
//!     are pluggable.
//! 3.  **Run**: call `tick` from your own loop, `run_until_idle` for synchronous
//!     flows, or `run().await` to drive timers in real time.
//! 4.  **Ship**: `CompiledProject::build` packages the project together with its
//!     binary records for a native backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nagare::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let project = Project {
//!     flows: vec![FlowDefinition {
//!         name: "main".to_string(),
//!         components: vec![
//!             ComponentDefinition::new("start", ComponentKind::Start),
//!             ComponentDefinition::new(
//!                 "log",
//!                 ComponentKind::Log {
//!                     value: "\"hello\"".to_string(),
//!                 },
//!             ),
//!         ],
//!         wires: vec![WireDefinition::new("start", "@seqout", "log", "@seqin")],
//!         local_variables: vec![],
//!     }],
//!     ..Default::default()
//! };
//!
//! let mut runtime = Runtime::builder(project).build()?;
//! runtime.start()?;
//! runtime.run_until_idle();
//!
//! assert_eq!(runtime.status(), &RuntimeStatus::Finished);
//! assert_eq!(runtime.host().messages(), vec!["hello"]);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod bridge;
pub mod bytecode;
pub mod components;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod flow;
pub mod prelude;
pub mod runtime;
