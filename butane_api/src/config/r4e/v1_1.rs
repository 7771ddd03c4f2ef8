pub use crate::config::base::v0_5::Config;
