//! Domain types: bars and resolutions.

pub mod bar;
pub mod resolution;

pub use bar::Bar;
pub use resolution::Resolution;
