//! Signal script: the loop-free, table-oriented language generated code is
//! written in.
//!
//! Source is tokenized by [`lexer`], parsed into the [`ast`] by [`parser`],
//! and evaluated by [`interp`] over the [`value`] model.

pub mod args;
pub mod ast;
pub mod indexing;
pub mod interp;
pub mod kernels;
pub mod lexer;
pub mod methods;
pub mod modules;
pub mod ops;
pub mod parser;
pub mod value;
