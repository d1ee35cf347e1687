pub mod analyze;
pub mod app_state;
pub mod meal_image;
pub mod pages;
pub mod plan;
pub mod session;
