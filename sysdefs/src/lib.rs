pub mod arch;
pub mod filesystems;
pub mod partition_types;
