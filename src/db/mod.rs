pub mod children;
mod mongodb;
pub mod numbering;
pub mod repository;

pub use self::mongodb::{collect, collect_with_session, collections, MongoDB};
