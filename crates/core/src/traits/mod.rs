pub mod auth;
pub mod executor;
pub mod message_queue;
pub mod repository;

pub use auth::*;
pub use executor::*;
pub use message_queue::*;
pub use repository::*;
