//! Kind cluster integration tests
//!
//! Stories covered:
//! - CRD operations: declaring instances, organizations, buckets and
//!   authorizations, and replacing their status projection

mod crd_operations;
mod helpers;
