pub mod files;
pub mod inspect;
