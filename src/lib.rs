#![deny(nonstandard_style, rust_2018_idioms)]

//! Front end of the `have` language: everything between the parser and the
//! code generator.
//!
//! Parsed files come in as [`syntax::SourceFile`]s. [`package::Package`]
//! orders their top-level statements by dependency, then
//! [`semantic::Checker`] binds identifiers and infers types in place.

pub mod compiler;
pub mod package;
pub mod semantic;
pub mod syntax;
