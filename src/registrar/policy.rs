use serde::{Deserialize, Serialize};

/// Tunable enrollment rules shared by the evaluator, conflict detector,
/// waitlist manager, and bulk orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentPolicy {
    /// Ceiling on active enrollments per student per term.
    pub max_term_load: u32,
    /// Minimum prerequisite grade applied when the prerequisite edge does not
    /// declare one.
    pub default_prerequisite_floor: f32,
    /// How long a waitlist entry stays valid after joining.
    pub waitlist_expiry_days: i64,
    /// Whether waitlist promotion re-checks eligibility. The legacy registrar
    /// promoted on seat availability alone; both behaviors are explicit here
    /// so the choice is a policy decision rather than an accident.
    pub promotion: PromotionPolicy,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            max_term_load: 6,
            default_prerequisite_floor: 60.0,
            waitlist_expiry_days: 30,
            promotion: PromotionPolicy::HonorQueue,
        }
    }
}

/// Behavior when a seat frees up and the waitlist head is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Promote strictly by queue position; seat availability is the only check.
    HonorQueue,
    /// Re-check GPA, passed hours, and prerequisites at promotion time.
    /// Entries that no longer qualify are passed over and keep their position.
    Revalidate,
}
