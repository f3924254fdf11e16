#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Blocking file helpers shared by depsync crates.

pub mod fs;
