//! VoxLink Application
//!
//! Hosts for the session controller: a headless native peer and the
//! WebAssembly bridge to the browser viewer.

pub mod params;

#[cfg(all(feature = "native", not(target_arch = "wasm32")))]
pub mod auth;
#[cfg(not(target_arch = "wasm32"))]
pub mod peer;

pub use params::UrlParams;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{Collaborator, NiivueEngine};
