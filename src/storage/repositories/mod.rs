//! Repository modules for data access
//!
//! This module provides repository implementations split into focused, manageable files.
//! Each repository handles CRUD operations for a specific resource type.

pub mod audit_log;
pub mod identity;

// Re-export all repository types
pub use audit_log::{AuditEvent, AuditLogEntry, AuditLogRepository};
pub use identity::{IdentityRepository, SqlxIdentityRepository};
