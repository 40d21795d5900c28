//! dimspect: dimensional inspection of small mechanical parts
//!
//! Nominal dimensions come from a 2D CAD drawing; measured dimensions come
//! from shape detection over camera frames. Each measurement is checked
//! against the nominal and logged as plain CSV.

pub mod cad;
pub mod cli;
pub mod core;
pub mod detect;
pub mod entities;
pub mod inspect;
pub mod store;
