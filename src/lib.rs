//! Enrollment and registration engine for a university registrar, plus the
//! collaborator boundaries (transactional store, notification fan-out, admin
//! directory) the HTTP service is wired against.

pub mod config;
pub mod error;
pub mod registrar;
pub mod roster;
pub mod telemetry;
