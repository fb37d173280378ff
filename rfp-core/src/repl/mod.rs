//! Bench console shared by the emulator and any host front-end.
//!
//! Lines go through [`lexer`] into [`grammar`], whose output [`commands`]
//! executes against an add-on. Everything here stays `no_std`.

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod lexer;
pub mod status;
