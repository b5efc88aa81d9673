pub mod auth;
pub mod database;
pub mod in_memory_queue;
pub mod message_queue;

pub use auth::OAuthClient;
pub use database::{DatabaseManager, SqliteJobRepository};
pub use in_memory_queue::InMemoryMessageQueue;
pub use message_queue::RabbitMQMessageQueue;
