//! Lua runtime for processing scripts.
//!
//! Every script runs in its own Lua VM. The VMs share nothing but the build's
//! Object Store, reached through the `dpk` global table.
//!
//! # Submodules
//!
//! - [`globals`] - The `dpk` table (`dpk.write()`, `dpk.read()`, path helpers)
//! - [`helpers`] - Lua helper modules exposed to scripts
//! - [`runtime`] - Low-level Lua VM management

pub mod globals;
pub mod helpers;
pub mod runtime;
