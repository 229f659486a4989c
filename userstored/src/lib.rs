#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::unnecessary_semicolon)]
#![deny(clippy::explicit_iter_loop)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::unwrap_or_default)]

pub mod params;
pub mod repo;
pub mod traits;
pub mod types;
