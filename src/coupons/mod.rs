pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod validator;

pub use error::*;
pub use handlers::*;
pub use models::*;
pub use repository::*;
pub use service::*;
pub use validator::*;
