//! RHEL for Edge variant. Same source schema as the base, with a narrower set
//! of storage features supported downstream.

pub mod v1_1;
