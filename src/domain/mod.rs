pub mod frequency;
pub mod keywords;
pub mod level;
pub mod listing;
pub mod subscription;
pub mod user_settings;
