//! ClusterRegistration CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the cluster registration controller.

pub mod cluster_registration;
pub mod condition;

pub use cluster_registration::*;
pub use condition::*;
