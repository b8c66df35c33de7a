// Pedantic: suppress noise for internal crate code.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod color;
pub mod config;
pub mod engine;
pub mod git;
pub mod profile;
pub mod rules;
pub mod session;
pub mod settings;
pub mod themed;
pub mod vscode;
