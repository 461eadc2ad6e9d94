use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{StudentDraft, StudentRecord};

/// Fixed role enumeration. The scope table below is the only place access
/// rules live; handlers never re-derive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ViceChancellor,
    DeputyViceChancellor,
    Dean,
    HeadOfDepartment,
    Advisor,
    CourseInstructor,
    Registrar,
    SystemOperator,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::ViceChancellor => "vice-chancellor",
            Role::DeputyViceChancellor => "deputy-vice-chancellor",
            Role::Dean => "dean",
            Role::HeadOfDepartment => "head-of-department",
            Role::Advisor => "advisor",
            Role::CourseInstructor => "course-instructor",
            Role::Registrar => "registrar",
            Role::SystemOperator => "system-operator",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vice-chancellor" | "vc" => Some(Role::ViceChancellor),
            "deputy-vice-chancellor" | "dvc" => Some(Role::DeputyViceChancellor),
            "dean" => Some(Role::Dean),
            "head-of-department" | "hod" => Some(Role::HeadOfDepartment),
            "advisor" => Some(Role::Advisor),
            "course-instructor" | "instructor" => Some(Role::CourseInstructor),
            "registrar" => Some(Role::Registrar),
            "system-operator" | "sysadmin" => Some(Role::SystemOperator),
            _ => None,
        }
    }
}

/// The caller issuing a request. Assignment fields are only meaningful for
/// the roles that declare them; absence means no access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisees: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub course_ids: Vec<String>,
}

impl Actor {
    pub fn for_role(role: Role) -> Self {
        Self {
            role,
            unit_id: None,
            advisees: Vec::new(),
            course_ids: Vec::new(),
        }
    }
}

/// External collaborator resolving course enrollments for the
/// course-instructor role.
pub trait EnrollmentDirectory: Send + Sync {
    fn students_in_course(&self, course_id: &str) -> Result<Vec<String>, EnrollmentError>;
}

#[derive(Debug, thiserror::Error)]
#[error("enrollment directory unavailable: {0}")]
pub struct EnrollmentError(pub String);

/// Declarative filter the store can evaluate without executing caller code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePredicate {
    /// Individual-record access is disallowed entirely.
    Denied,
    /// Sees all records; registry data-integrity duties.
    Unrestricted,
    /// Records whose organizational unit equals the given id.
    UnitEquals(String),
    /// Records whose student number is in the given set.
    KeyIn(BTreeSet<String>),
}

impl ScopePredicate {
    pub fn is_denied(&self) -> bool {
        matches!(self, ScopePredicate::Denied)
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, ScopePredicate::Unrestricted)
    }

    pub fn matches(&self, record: &StudentRecord) -> bool {
        match self {
            ScopePredicate::Denied => false,
            ScopePredicate::Unrestricted => true,
            ScopePredicate::UnitEquals(unit_id) => record.unit_id == *unit_id,
            ScopePredicate::KeyIn(keys) => keys.contains(record.student_number.as_str()),
        }
    }

    /// Whether a not-yet-stored record would fall inside this scope.
    pub fn admits(&self, draft: &StudentDraft) -> bool {
        match self {
            ScopePredicate::Denied => false,
            ScopePredicate::Unrestricted => true,
            ScopePredicate::UnitEquals(unit_id) => draft.unit_id == *unit_id,
            ScopePredicate::KeyIn(keys) => keys.contains(draft.student_number.as_str()),
        }
    }
}

/// The per-role scope table. Missing assignment data fails closed: the
/// resulting predicate matches nothing.
pub fn resolve_scope(actor: &Actor, enrollment: &dyn EnrollmentDirectory) -> ScopePredicate {
    match actor.role {
        Role::ViceChancellor | Role::DeputyViceChancellor | Role::SystemOperator => {
            ScopePredicate::Denied
        }
        Role::Registrar => ScopePredicate::Unrestricted,
        Role::Dean | Role::HeadOfDepartment => match &actor.unit_id {
            Some(unit_id) if !unit_id.trim().is_empty() => {
                ScopePredicate::UnitEquals(unit_id.clone())
            }
            _ => ScopePredicate::Denied,
        },
        Role::Advisor => ScopePredicate::KeyIn(actor.advisees.iter().cloned().collect()),
        Role::CourseInstructor => {
            if actor.course_ids.is_empty() {
                return ScopePredicate::Denied;
            }
            let mut keys = BTreeSet::new();
            for course_id in &actor.course_ids {
                match enrollment.students_in_course(course_id) {
                    Ok(students) => keys.extend(students),
                    Err(_) => return ScopePredicate::Denied,
                }
            }
            ScopePredicate::KeyIn(keys)
        }
    }
}
