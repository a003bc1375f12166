use std::collections::BTreeSet;

use roster_core::{
    Config, CredentialName, Credentials, Defaults, MemberId, SearchScope, SourceDescriptor,
    SourceKind, TargetDefinition,
};
use roster_directory::{DirectoryObject, MemoryDirectory, MutationKind, Operation};
use roster_sync::{
    pipeline, FailurePolicy, SyncError, SyncOptions, SyncScope, TargetStatus, Warning,
};

const DC: &str = "dc01";

fn ids(values: &[&str]) -> Vec<MemberId> {
    values.iter().map(|v| MemberId::from(*v)).collect()
}

fn set(values: &[&str]) -> BTreeSet<MemberId> {
    ids(values).into_iter().collect()
}

fn credentials() -> Credentials {
    Credentials::new()
        .with("default", "svc-roster", "pw")
        .with("partner", "svc-partner", "pw2")
}

/// Users A, B, C; Engineering = {A, B, C}, Contractors = {C}, Staff = `staff`.
fn directory(staff: &[&str]) -> MemoryDirectory {
    MemoryDirectory::new()
        .with(DC, DirectoryObject::user("A", "CN=A,OU=People,DC=corp"))
        .with(DC, DirectoryObject::user("B", "CN=B,OU=People,DC=corp"))
        .with(DC, DirectoryObject::user("C", "CN=C,OU=People,DC=corp"))
        .with(
            DC,
            DirectoryObject::group("g-eng", "Engineering", "CN=Engineering,DC=corp", ids(&["A", "B", "C"])),
        )
        .with(
            DC,
            DirectoryObject::group("g-con", "Contractors", "CN=Contractors,DC=corp", ids(&["C"])),
        )
        .with(
            DC,
            DirectoryObject::group("g-staff", "Staff", "CN=Staff,DC=corp", ids(staff)),
        )
}

fn config(targets: Vec<TargetDefinition>) -> Config {
    Config {
        defaults: Defaults::new(DC),
        targets,
    }
}

fn engineering() -> SourceDescriptor {
    SourceDescriptor::group("Engineering", false)
}

fn staff_members(dir: &MemoryDirectory) -> BTreeSet<MemberId> {
    dir.members_of(DC, &MemberId::from("g-staff"))
        .expect("staff group exists")
}

fn apply() -> SyncOptions {
    SyncOptions::default()
}

fn dry_run() -> SyncOptions {
    SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn include_only_adds_missing_member() {
    let config = config(vec![TargetDefinition::new("Staff").include(engineering())]);
    let mut dir = directory(&["A", "B"]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(target.delta.to_add, set(&["C"]));
    assert!(target.delta.to_remove.is_empty());
    assert_eq!(target.delta.unchanged, set(&["A", "B"]));
    assert!(target.applied);
    assert_eq!(staff_members(&dir), set(&["A", "B", "C"]));
}

#[test]
fn exclusion_removes_member_present_in_include() {
    let config = config(vec![TargetDefinition::new("Staff")
        .include(engineering())
        .exclude(SourceDescriptor::group("Contractors", false))]);
    let mut dir = directory(&["A", "B", "C"]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(target.counts.computed, 2);
    assert_eq!(target.counts.excluded, 1);
    assert_eq!(target.delta.to_remove, set(&["C"]));
    assert!(target.delta.to_add.is_empty());
    assert_eq!(staff_members(&dir), set(&["A", "B"]));
}

#[test]
fn no_rules_empties_group_with_warning() {
    let config = config(vec![TargetDefinition::new("Staff")]);
    let mut dir = directory(&["A"]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(target.warnings, vec![Warning::NoSourceRules]);
    assert_eq!(target.delta.to_remove, set(&["A"]));
    assert!(staff_members(&dir).is_empty());
}

#[test]
fn overlapping_includes_count_each_member_once() {
    let mut dir = directory(&[]);
    dir.insert(
        DC,
        DirectoryObject::group("g-x", "X", "CN=X,DC=corp", ids(&["A"])),
    );
    dir.insert(
        DC,
        DirectoryObject::group("g-y", "Y", "CN=Y,DC=corp", ids(&["A"])),
    );
    let config = config(vec![TargetDefinition::new("Staff")
        .include(SourceDescriptor::group("X", false))
        .include(SourceDescriptor::group("Y", false))]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(target.counts.candidates, 1);
    assert_eq!(target.delta.to_add, set(&["A"]));
    let adds: Vec<_> = dir
        .mutations()
        .into_iter()
        .filter_map(|c| match &c.operation {
            Operation::AddMembers { members, .. } => Some(members.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(adds, vec![ids(&["A"])]);
}

#[test]
fn ou_subtree_include_minus_nested_group_exclude() {
    let mut dir = directory(&["A", "C"]);
    dir.insert(DC, DirectoryObject::organizational_unit("OU=People,DC=corp"));
    dir.insert(
        DC,
        DirectoryObject::organizational_unit("OU=Contract,OU=People,DC=corp"),
    );
    dir.insert(DC, DirectoryObject::user("D", "CN=D,OU=Contract,OU=People,DC=corp"));
    dir.insert(
        DC,
        DirectoryObject::group("g-out", "Outsiders", "CN=Outsiders,DC=corp", ids(&["g-con", "D"])),
    );
    let config = Config {
        defaults: Defaults {
            filter: Some("(objectClass=user)".into()),
            ..Defaults::new(DC)
        },
        targets: vec![TargetDefinition::new("Staff")
            .include(SourceDescriptor::organizational_unit(
                "OU=People,DC=corp",
                SearchScope::Subtree,
                None,
            ))
            .exclude(SourceDescriptor::group("Outsiders", true))],
    };

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(target.counts.candidates, 4);
    assert_eq!(target.counts.excluded, 2);
    assert_eq!(target.delta.to_add, set(&["B"]));
    assert_eq!(target.delta.to_remove, set(&["C"]));
    assert_eq!(target.delta.unchanged, set(&["A"]));
    assert_eq!(staff_members(&dir), set(&["A", "B"]));

    let queries: Vec<&Operation> = dir
        .calls()
        .iter()
        .map(|c| &c.operation)
        .filter(|op| {
            matches!(
                op,
                Operation::QueryObjects { .. } | Operation::QueryGroupMembers { .. }
            )
        })
        .collect();
    assert!(matches!(
        queries[0],
        Operation::QueryObjects { scope: SearchScope::Subtree, filter: Some(f), .. }
            if f == "(objectClass=user)"
    ));
    assert!(matches!(
        queries[1],
        Operation::QueryGroupMembers { identity, recursive: true } if identity == "Outsiders"
    ));
}

// ---------------------------------------------------------------------------
// Run behaviour
// ---------------------------------------------------------------------------

#[test]
fn second_run_is_a_no_op() {
    let config = config(vec![TargetDefinition::new("Staff")
        .include(engineering())
        .exclude(SourceDescriptor::group("Contractors", false))]);
    let mut dir = directory(&["C", "Z"]);
    dir.insert(DC, DirectoryObject::user("Z", "CN=Z,OU=People,DC=corp"));

    pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply()).expect("first");
    let mutations_after_first = dir.mutations().len();

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("second");
    let target = report.completed().next().expect("done");
    assert!(target.delta.is_empty());
    assert!(!target.applied);
    assert_eq!(dir.mutations().len(), mutations_after_first);
}

#[test]
fn removals_are_issued_before_additions() {
    let config = config(vec![TargetDefinition::new("Staff")
        .include(engineering())
        .exclude(SourceDescriptor::group("Contractors", false))]);
    let mut dir = directory(&["A", "C"]);

    pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply()).expect("run");

    let kinds: Vec<&Operation> = dir.mutations().into_iter().map(|c| &c.operation).collect();
    assert_eq!(kinds.len(), 2);
    assert!(matches!(kinds[0], Operation::RemoveMembers { members, .. } if *members == ids(&["C"])));
    assert!(matches!(kinds[1], Operation::AddMembers { members, .. } if *members == ids(&["B"])));
}

#[test]
fn dry_run_reports_delta_without_mutating() {
    let config = config(vec![TargetDefinition::new("Staff").include(engineering())]);
    let mut dir = directory(&["A"]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, dry_run())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert!(report.dry_run);
    assert_eq!(target.delta.to_add, set(&["B", "C"]));
    assert!(!target.applied);
    assert!(dir.mutations().is_empty());
    assert_eq!(staff_members(&dir), set(&["A"]));
}

#[test]
fn unsupported_descriptor_fails_target_without_mutation() {
    let dynamic = SourceDescriptor {
        kind: SourceKind::Unsupported {
            tag: "dynamic".into(),
        },
        ..SourceDescriptor::group("Query", false)
    };
    let config = config(vec![TargetDefinition::new("Staff")
        .include(engineering())
        .include(dynamic)]);
    let mut dir = directory(&[]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");

    let err = report.first_failure().expect("target failed");
    assert!(matches!(
        err.root(),
        SyncError::UnsupportedDescriptorKind { kind, .. } if kind == "dynamic"
    ));
    assert!(err.to_string().contains("include[1]"));
    assert!(dir.mutations().is_empty());
}

#[test]
fn abort_keeps_earlier_targets_and_skips_later_ones() {
    let config = config(vec![
        TargetDefinition::new("Staff").include(engineering()),
        TargetDefinition::new("Ghosts").include(engineering()),
        TargetDefinition::new("Contractors").include(engineering()),
    ]);
    let mut dir = directory(&[]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");

    assert!(matches!(report.outcomes[0].status, TargetStatus::Done(_)));
    assert!(matches!(report.outcomes[1].status, TargetStatus::Failed(_)));
    assert!(matches!(report.outcomes[2].status, TargetStatus::Skipped));
    assert_eq!(report.skipped(), 1);

    let err = report.first_failure().expect("failure");
    assert!(matches!(err.root(), SyncError::TargetNotFound { .. }));
    assert!(err.to_string().contains("'Ghosts'"));

    assert_eq!(staff_members(&dir), set(&["A", "B", "C"]));
    assert_eq!(
        dir.members_of(DC, &MemberId::from("g-con")),
        Some(set(&["C"]))
    );
}

#[test]
fn continue_policy_processes_later_targets() {
    let config = config(vec![
        TargetDefinition::new("Ghosts").include(engineering()),
        TargetDefinition::new("Staff").include(engineering()),
    ]);
    let mut dir = directory(&[]);
    let options = SyncOptions {
        failure_policy: FailurePolicy::Continue,
        ..SyncOptions::default()
    };

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, options)
        .expect("run");

    assert!(!report.is_success());
    assert_eq!(report.skipped(), 0);
    assert!(matches!(report.outcomes[1].status, TargetStatus::Done(_)));
    assert_eq!(staff_members(&dir), set(&["A", "B", "C"]));
}

#[test]
fn failed_add_leaves_applied_removal_in_place() {
    let config = config(vec![TargetDefinition::new("Staff")
        .include(engineering())
        .exclude(SourceDescriptor::group("Contractors", false))]);
    let mut dir = directory(&["A", "C"]);
    dir.reject_mutation(MutationKind::Add, "g-staff");

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");

    let err = report.first_failure().expect("failure");
    assert!(matches!(err.root(), SyncError::DirectoryMutation(_)));
    assert_eq!(staff_members(&dir), set(&["A"]));
}

#[test]
fn overrides_reach_the_directory_client() {
    let mut dir = directory(&[]);
    dir.insert(
        "dc02",
        DirectoryObject::user("P", "CN=P,OU=Partners,DC=partner"),
    );
    dir.insert(
        "dc02",
        DirectoryObject::group("g-p", "Partners", "CN=Partners,DC=partner", ids(&["P"])),
    );
    dir.restrict_accounts("dc02", &["svc-partner"]);
    let config = config(vec![TargetDefinition::new("Staff").include(
        SourceDescriptor::group("Partners", false)
            .with_server("dc02")
            .with_credential(CredentialName::from("partner")),
    )]);

    pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply()).expect("run");

    let partner_call = dir
        .calls()
        .iter()
        .find(|c| c.server == "dc02")
        .expect("call against dc02");
    assert_eq!(partner_call.username, "svc-partner");
    assert!(dir
        .calls()
        .iter()
        .filter(|c| c.server == DC)
        .all(|c| c.username == "svc-roster"));
    assert_eq!(staff_members(&dir), set(&["P"]));
}

#[test]
fn target_cannot_become_its_own_member() {
    let mut dir = directory(&[]);
    dir.insert(
        DC,
        DirectoryObject::group("g-all", "Everyone", "CN=Everyone,DC=corp", ids(&["A", "g-staff"])),
    );
    let config = config(vec![
        TargetDefinition::new("Staff").include(SourceDescriptor::group("Everyone", false))
    ]);

    let report = pipeline::run(&config, &credentials(), &mut dir, SyncScope::All, apply())
        .expect("run");
    let target = report.completed().next().expect("done");

    assert_eq!(
        target.warnings,
        vec![Warning::SelfMembershipFiltered {
            group: MemberId::from("g-staff")
        }]
    );
    assert_eq!(staff_members(&dir), set(&["A"]));
}

#[test]
fn single_target_scope_touches_only_that_target() {
    let config = config(vec![
        TargetDefinition::new("Contractors"),
        TargetDefinition::new("Staff").include(engineering()),
    ]);
    let mut dir = directory(&[]);

    let report = pipeline::run(
        &config,
        &credentials(),
        &mut dir,
        SyncScope::Target("staff".into()),
        apply(),
    )
    .expect("run");

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        dir.members_of(DC, &MemberId::from("g-con")),
        Some(set(&["C"]))
    );
}
