//! c2wasm-lib: the sandboxed build pipelines behind c2wasm
//!
//! This crate turns a build request into a build result:
//! - `request` / `validate`: the request model and its admission checks
//! - `options`: whitelist filtering of user-supplied compiler and linker flags
//! - `workspace`: the per-build scratch directory and its guaranteed removal
//! - `stage`: the external tool steps and how each one is judged
//! - `pipeline`: the state machine that runs stages and reports the outcome
//! - `artifact`: bytecode extraction, compression and transport encoding

pub mod artifact;
pub mod consts;
pub mod headers;
pub mod options;
pub mod pipeline;
pub mod request;
pub mod stage;
pub mod toolchain;
pub mod util;
pub mod validate;
pub mod workspace;

pub use pipeline::{BuildError, BuildResult, TaskRecord, run_build};
pub use request::{BuildRequest, HeaderFile, OutputKind, SourceFile};
pub use toolchain::Toolchain;
