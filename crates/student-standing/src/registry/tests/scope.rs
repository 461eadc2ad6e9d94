use super::common::*;
use crate::registry::scope::{resolve_scope, Actor, Role, ScopePredicate};

fn directory() -> StaticEnrollment {
    StaticEnrollment::default()
        .with_course("CSC101", &["S001", "S002"])
        .with_course("MTH202", &["S002", "S003"])
}

#[test]
fn denied_roles_match_nothing_regardless_of_assignments() {
    let directory = directory();
    for role in [
        Role::ViceChancellor,
        Role::DeputyViceChancellor,
        Role::SystemOperator,
    ] {
        // Even with every assignment field populated, access stays denied.
        let actor = Actor {
            role,
            unit_id: Some("CSC".to_string()),
            advisees: vec!["S001".to_string()],
            course_ids: vec!["CSC101".to_string()],
        };
        let predicate = resolve_scope(&actor, &directory);
        assert_eq!(predicate, ScopePredicate::Denied, "{}", role.label());
        assert!(!predicate.matches(&draft("S001").to_record(crate::registry::RecordId(1))));
    }
}

#[test]
fn registrar_sees_everything() {
    let predicate = resolve_scope(&registrar(), &directory());
    assert!(predicate.is_unrestricted());
    assert!(predicate.matches(&draft("S001").to_record(crate::registry::RecordId(1))));
}

#[test]
fn unit_heads_are_scoped_to_their_unit() {
    let predicate = resolve_scope(&dean_of("CSC"), &directory());
    let inside = draft_in_unit("S001", "CSC").to_record(crate::registry::RecordId(1));
    let outside = draft_in_unit("S002", "LAW").to_record(crate::registry::RecordId(2));
    assert!(predicate.matches(&inside));
    assert!(!predicate.matches(&outside));
}

#[test]
fn unit_head_without_a_unit_fails_closed() {
    let directory = directory();
    for role in [Role::Dean, Role::HeadOfDepartment] {
        let predicate = resolve_scope(&Actor::for_role(role), &directory);
        assert_eq!(predicate, ScopePredicate::Denied);
    }
    let blank_unit = Actor {
        unit_id: Some("   ".to_string()),
        ..Actor::for_role(Role::HeadOfDepartment)
    };
    assert_eq!(resolve_scope(&blank_unit, &directory), ScopePredicate::Denied);
}

#[test]
fn advisor_is_scoped_to_the_assigned_list() {
    let predicate = resolve_scope(&advisor_of(&["S001", "S005"]), &directory());
    let assigned = draft("S005").to_record(crate::registry::RecordId(1));
    let other = draft("S002").to_record(crate::registry::RecordId(2));
    assert!(predicate.matches(&assigned));
    assert!(!predicate.matches(&other));
}

#[test]
fn advisor_with_no_assignments_matches_nothing() {
    let predicate = resolve_scope(&advisor_of(&[]), &directory());
    assert!(!predicate.matches(&draft("S001").to_record(crate::registry::RecordId(1))));
}

#[test]
fn instructor_scope_is_the_union_of_course_enrollments() {
    let predicate = resolve_scope(&instructor_of(&["CSC101", "MTH202"]), &directory());
    for key in ["S001", "S002", "S003"] {
        assert!(predicate.matches(&draft(key).to_record(crate::registry::RecordId(1))), "{key}");
    }
    assert!(!predicate.matches(&draft("S009").to_record(crate::registry::RecordId(2))));
}

#[test]
fn instructor_without_courses_or_with_failing_directory_fails_closed() {
    assert_eq!(
        resolve_scope(&instructor_of(&[]), &directory()),
        ScopePredicate::Denied
    );
    assert_eq!(
        resolve_scope(&instructor_of(&["CSC101"]), &UnavailableEnrollment),
        ScopePredicate::Denied
    );
}
