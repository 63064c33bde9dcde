//! Enrollment and registration engine: eligibility evaluation, conflict
//! detection, capacity/waitlist bookkeeping, bulk orchestration, and grading,
//! all speaking to an atomic store through the `RegistryStore` boundary.

pub mod bulk;
pub mod conflicts;
pub mod directory;
pub mod domain;
pub mod eligibility;
pub mod grading;
pub mod notify;
pub mod policy;
pub mod router;
pub mod service;
pub mod store;
pub mod waitlist;

#[cfg(test)]
mod tests;

pub use bulk::{
    BulkEnrollmentOrchestrator, BulkEnrollmentReport, BulkEnrollmentRequest, BulkRequestError,
    CourseOutcome, StudentBatchStatus, StudentOutcome,
};
pub use conflicts::{detect_conflicts, Conflict};
pub use directory::{AdminDirectory, CachedAdminDirectory, DirectoryError, MemoryDirectory, TtlCache};
pub use domain::{
    Course, CourseId, CoursePrerequisite, CourseSchedule, DayOfWeek, Enrollment, EnrollmentId,
    EnrollmentMethod, EnrollmentStatus, GradeStatus, RegistrationPeriod, RegistrationType,
    StatusChange, Student, StudentId, Term, TermId, WaitlistEntry, GPA_SCALE_MAX,
};
pub use eligibility::{EligibilityEvaluator, EligibilityReport, MissingPrerequisite, RequirementCheck};
pub use grading::{
    weighted_final_mark, GradeBand, GradeComponent, GradeScale, GradedEnrollment, GradingError,
    GradingService,
};
pub use notify::{LogPublisher, Notice, NoticeError, NoticePublisher};
pub use policy::{EnrollmentPolicy, PromotionPolicy};
pub use router::{registrar_router, RegistrarState};
pub use service::{
    DropKind, DropOutcome, EnrollmentError, EnrollmentOutcome, EnrollmentRequest, EnrollmentService,
};
pub use store::{MemoryRegistry, RegistryStore, StoreError, WriteBatch, WriteOp};
pub use waitlist::{PromotionRecord, WaitlistManager, WaitlistOutcome};
