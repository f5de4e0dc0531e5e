pub mod dummy;
pub mod gold;
pub mod score;
pub mod setup;
pub mod status;
pub mod validate;
