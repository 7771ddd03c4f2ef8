pub mod files_dir;
pub mod systemd;

#[cfg(any(test, feature = "test-utilities"))]
pub mod testutils;
