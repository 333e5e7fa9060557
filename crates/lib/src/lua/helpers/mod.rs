//! Lua helper modules exposed to processing scripts.

pub mod path;
