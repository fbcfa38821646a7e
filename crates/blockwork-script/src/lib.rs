//! Kernel script: a small array language used as Blockwork's built-in
//! execution engine.
//!
//! Each worker owns one [`Interpreter`]. The host binds block buffers into
//! it as arrays that alias host memory, runs the user's kernel code, and
//! reads nothing back: kernels communicate by writing into `block.data`.
//!
//! # Language
//!
//! - Statements: `name = expr`, `target[subs] = expr`,
//!   `record Name(field, ...)`, `del a, b`, or a bare expression.
//!   Newlines or `;` separate statements; `#` starts a comment.
//! - Expressions: numbers, strings, `[lists]`, `+ - * / %` with
//!   broadcasting, attribute access, calls with keyword arguments, and
//!   subscripts (`i`, `a:b`, `...`, or crop slices covering every axis).
//! - Builtins: `sum mean min max` (with `axis=`), `abs sqrt exp floor`,
//!   `len shape zeros defined print`.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod ast;
mod builtins;
mod engine;
mod error;
mod interp;
mod lexer;
mod ops;
mod parser;
mod value;

pub use engine::ScriptEngine;
pub use error::{ErrorKind, ScriptError};
pub use interp::Interpreter;
