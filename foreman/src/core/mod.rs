//! Pure decision logic: parsing, matching, and policy. No I/O lives here.

pub mod front_matter;
pub mod ident;
pub mod journal;
pub mod output;
pub mod scope;
pub mod types;
