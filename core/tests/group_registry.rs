//! Group registry tests.
//!
//! Tests cover: creation and naming rules, exclusive membership with
//! conflicts, idempotent add/remove, deletion and selection reset.

use ridership_core::{
    error::{ErrorKind, RidershipError},
    group_registry::{Group, GroupRegistry, MembershipAction, MembershipOutcome, DEFAULT_GROUP_COLOR},
};

fn registry_with_two() -> (GroupRegistry, i64, i64) {
    let mut reg = GroupRegistry::new();
    let g1 = reg.create_group("Norte").unwrap().id;
    let g2 = reg.create_group("Sul").unwrap().id;
    (reg, g1, g2)
}

#[test]
fn create_trims_and_rejects_blank_names() {
    let mut reg = GroupRegistry::new();
    let g = reg.create_group("  Centro  ").unwrap();
    assert_eq!(g.name, "Centro");
    assert_eq!(g.color, DEFAULT_GROUP_COLOR);
    assert_eq!(g.id, 1);

    let err = reg.create_group("   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(reg.len(), 1, "a rejected create must not add a group");
}

#[test]
fn names_are_unique_but_rename_to_self_is_allowed() {
    let (mut reg, g1, _) = registry_with_two();
    assert!(reg.create_group("Sul").is_err());
    assert!(reg.rename_group(g1, "Sul").is_err());
    assert_eq!(reg.rename_group(g1, " Norte ").unwrap().name, "Norte");
    assert_eq!(reg.rename_group(g1, "Leste").unwrap().name, "Leste");

    let names: Vec<&str> = reg.groups_by_name().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Leste", "Sul"]);
}

#[test]
fn adding_an_owned_line_conflicts_and_keeps_owner() {
    let (mut reg, g1, g2) = registry_with_two();
    assert_eq!(
        reg.set_membership(g1, "L1", MembershipAction::Add).unwrap(),
        MembershipOutcome::Added
    );

    let err = reg.set_membership(g2, "L1", MembershipAction::Add).unwrap_err();
    match err {
        RidershipError::Conflict { line_code, owner_id, owner_name } => {
            assert_eq!(line_code, "L1");
            assert_eq!(owner_id, g1);
            assert_eq!(owner_name, "Norte");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(reg.owner_of("L1").map(|g| g.id), Some(g1));
    assert!(!reg.get(g2).unwrap().lines.contains("L1"));
}

#[test]
fn add_and_remove_are_idempotent() {
    let (mut reg, g1, g2) = registry_with_two();
    reg.set_membership(g1, "L1", MembershipAction::Add).unwrap();
    assert_eq!(
        reg.set_membership(g1, "L1", MembershipAction::Add).unwrap(),
        MembershipOutcome::AlreadyMember
    );
    assert_eq!(
        reg.set_membership(g2, "L1", MembershipAction::Remove).unwrap(),
        MembershipOutcome::NotMember,
        "removing from a non-owner must not touch the owner"
    );
    assert_eq!(reg.owner_of("L1").map(|g| g.id), Some(g1));
    assert_eq!(
        reg.set_membership(g1, "L1", MembershipAction::Remove).unwrap(),
        MembershipOutcome::Removed
    );
    assert!(reg.owner_of("L1").is_none());

    // Released lines can move to another group.
    reg.set_membership(g2, "L1", MembershipAction::Add).unwrap();
    assert_eq!(reg.owner_of("L1").map(|g| g.id), Some(g2));
}

#[test]
fn membership_on_unknown_group_is_not_found() {
    let (mut reg, _, _) = registry_with_two();
    let err = reg.set_membership(99, "L1", MembershipAction::Add).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(reg.owner_of("L1").is_none());
}

#[test]
fn delete_releases_lines_and_flags_selection() {
    let (mut reg, g1, g2) = registry_with_two();
    reg.set_membership(g1, "L1", MembershipAction::Add).unwrap();
    reg.set_membership(g1, "L2", MembershipAction::Add).unwrap();

    let outcome = reg.delete_group(g1, Some(g1)).unwrap();
    assert!(outcome.reset_selection);
    assert_eq!(outcome.removed.lines.len(), 2);
    assert!(reg.owner_of("L1").is_none());

    reg.set_membership(g2, "L1", MembershipAction::Add).unwrap();
    let outcome = reg.delete_group(g2, Some(12345)).unwrap();
    assert!(!outcome.reset_selection);

    assert_eq!(reg.delete_group(g2, None).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn new_ids_follow_the_highest_live_id() {
    let (mut reg, _, g2) = registry_with_two();
    reg.delete_group(g2, None).unwrap();
    let g3 = reg.create_group("Oeste").unwrap();
    assert_eq!(g3.id, 2, "ids are max + 1 of the live groups");
}

#[test]
fn availability_lists_known_lines_with_owners() {
    let (mut reg, g1, _) = registry_with_two();
    reg.set_known_lines(vec!["L2".to_string(), "L1".to_string(), "L3".to_string()]);
    reg.set_membership(g1, "L2", MembershipAction::Add).unwrap();

    let listed: Vec<&str> = reg.list_available_lines().iter().map(String::as_str).collect();
    assert_eq!(listed, vec!["L1", "L2", "L3"]);

    let availability = reg.line_availability();
    assert_eq!(availability.len(), 3);
    assert_eq!(availability[1].owner_name.as_deref(), Some("Norte"));
    assert!(availability[0].owner_id.is_none());
}

#[test]
fn loading_overlapping_groups_is_rejected() {
    let g = |id: i64, lines: &[&str]| Group {
        id,
        name:  format!("G{id}"),
        color: DEFAULT_GROUP_COLOR.into(),
        lines: lines.iter().map(|s| s.to_string()).collect(),
    };
    let err = GroupRegistry::from_groups(vec![g(1, &["L1"]), g(2, &["L1", "L2"])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let ok = GroupRegistry::from_groups(vec![g(1, &["L1"]), g(2, &["L2"])]).unwrap();
    assert!(ok.duplicated_lines().is_empty());
}
