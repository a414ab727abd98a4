//! Multi-seasonal models (C9): MSTL, MFLES, and a reduced TBATS.

pub mod mfles;
pub mod mstl;
pub mod tbats;

pub use mfles::Mfles;
pub use mstl::Mstl;
pub use tbats::{AutoTbats, Tbats};
