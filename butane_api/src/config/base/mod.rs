pub mod v0_5;
pub mod v0_6;
