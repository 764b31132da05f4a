//! A tree-walking interpreter for an Arduino-dialect C++ subset. Input is a
//! pre-parsed, pre-preprocessed AST delivered in the Compact binary format
//! ([ast::wire]); output is a deterministic, ordered stream of structured
//! [command::Command]s describing hardware I/O, serial/keyboard output,
//! variable assignments, control flow, errors, and program lifecycle events.
//!
//! [Engine] is the only type a host needs: it owns the interpreter and
//! drives it through declaration collection, `setup()`, and `loop()`,
//! emitting lifecycle commands around each phase and resuming cleanly after
//! an external-read suspension.
//!
//! ```
//! use avr_sim_core::{ast, Engine, EngineOptions};
//! use avr_sim_core::ast::{Node, NodeKind, Payload};
//!
//! let setup_body = Node::new(
//!     NodeKind::CompoundStatement,
//!     Payload::None,
//!     vec![],
//! );
//! let setup = Node::new(
//!     NodeKind::FunctionDefinition,
//!     Payload::None,
//!     vec![
//!         Node::leaf(NodeKind::Type, Payload::Str("void".into())),
//!         Node::leaf(NodeKind::Declarator, Payload::Str("setup".into())),
//!         setup_body,
//!     ],
//! );
//! let program = Node::new(NodeKind::Program, Payload::None, vec![setup]);
//! let bytes = ast::wire::encode(&program);
//!
//! let mut engine = Engine::create(&bytes, EngineOptions::default()).unwrap();
//! engine.start();
//! assert!(!engine.command_stream().is_empty());
//! ```

#![deny(unused_must_use)]

pub mod ast;
mod command;
mod config;
mod consts;
mod control;
mod engine;
pub mod error;
mod eval;
mod exec;
mod interp;
mod intrinsics;
mod invoke;
mod mock;
mod scope;
mod suspension;
mod util;
pub mod value;

pub use command::{Command, CommandPayload, EmissionStats, SafeMode};
pub use config::EngineOptions;
pub use control::ExecutionState;
pub use engine::Engine;
pub use error::{CreateError, EngineError, ErrorKind};
pub use value::Value;
