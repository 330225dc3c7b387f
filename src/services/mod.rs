pub mod check_in_service;
pub mod data_service;
pub mod draw_service;
pub mod queue_service;

pub use check_in_service::*;
pub use data_service::*;
pub use draw_service::*;
pub use queue_service::*;
