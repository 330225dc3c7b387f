pub mod admin;
pub mod check_in;
pub mod data;
pub mod draw;

pub use admin::admin_config;
pub use check_in::check_in_config;
pub use data::data_config;
pub use draw::draw_config;
