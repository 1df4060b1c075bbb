//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod card_repo;
pub mod ref_card_repo;
pub mod tcg_set_repo;

pub use card_repo::CardRepo;
pub use ref_card_repo::RefCardRepo;
pub use tcg_set_repo::TcgSetRepo;
