//---------------------------------------
pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod settings;
pub mod validate;
//---------------------------------------

//---------------------------------------
pub mod client;
//---------------------------------------

pub use api::{router, AppState};
pub use db::Db;
pub use error::AppError;
pub use models::{ApiResponse, Priority, Task, TaskStats};
