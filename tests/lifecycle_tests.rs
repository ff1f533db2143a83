//! VM lifecycle end to end against the stub provisioner.

mod common;

use common::TestHarness;
use vmbroker::Error;
use vmbroker::services::{BuildOutcome, VmRef};

async fn build_one(h: &TestHarness, owner: i64) -> (i64, String) {
    match h.state.vms.build(owner, None).await.unwrap() {
        BuildOutcome::Built { id, hostname, .. } => (id, hostname),
        other => panic!("expected a successful build, got {other:?}"),
    }
}

#[tokio::test]
async fn build_provisions_from_a_dedicated_directory() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Judy").await.unwrap();

    let outcome = h.state.vms.build(owner, None).await.unwrap();
    let BuildOutcome::Built {
        id,
        hostname,
        ip,
        output,
    } = outcome
    else {
        panic!("expected a successful build");
    };

    assert_eq!(hostname, format!("nyc-vm-d{id}"));
    assert_eq!(ip, format!("10.20.6.{}", 30 + id % 200));
    assert!(output.contains("stub: up"));

    // Exactly one external call, from this VM's own directory.
    let vm_dir = h.state.config.provisioner.work_dir.join(id.to_string());
    let calls = h.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], format!("{} up", vm_dir.display()));

    // The rendered config and the auxiliary file landed next to it.
    let rendered = std::fs::read_to_string(vm_dir.join("Vagrantfile")).unwrap();
    assert!(rendered.contains(&format!("hostname = \"{hostname}\"")));
    assert!(rendered.contains(&format!("ip = \"{ip}\"")));
    assert!(!rendered.contains("{{"));
    assert!(vm_dir.join("bootstrap.sh").is_file());

    // And the listing shows the finalized row with its owner's name.
    let listed = h.state.vms.list_vms().await.unwrap();
    let row = listed.iter().find(|vm| vm.id == id).unwrap();
    assert_eq!(row.hostname, hostname);
    assert_eq!(row.owner, "Judy");
    assert!(row.active);
}

#[tokio::test]
async fn build_refuses_owners_at_the_cap() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Karl").await.unwrap();

    for _ in 0..3 {
        build_one(&h, owner).await;
    }

    let outcome = h.state.vms.build(owner, None).await.unwrap();
    assert!(matches!(
        outcome,
        BuildOutcome::Refused { current: 3, cap: 3 }
    ));

    // Destroyed machines still count; the record has to be deleted to free
    // the slot.
    let count = h.state.vms.vm_count(owner).await.unwrap();
    h.state.vms.destroy(&VmRef::Id(1)).await.unwrap();
    assert_eq!(h.state.vms.vm_count(owner).await.unwrap(), count);

    let outcome = h.state.vms.build(owner, None).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Refused { .. }));

    h.state.vms.delete(&VmRef::Id(2)).await.unwrap();
    let outcome = h.state.vms.build(owner, None).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Built { .. }));
}

#[tokio::test]
async fn build_for_an_unknown_owner_is_not_found() {
    let h = TestHarness::new().await;

    let err = h.state.vms.build(9999, None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn failed_provisioning_leaves_the_placeholder_behind() {
    let h = TestHarness::with_failing_provisioner().await;
    let owner = h.state.identity.register_user("Liam").await.unwrap();

    let outcome = h.state.vms.build(owner, None).await.unwrap();
    let BuildOutcome::ProvisionerFailed { id, output } = outcome else {
        panic!("expected a provisioner failure");
    };
    assert!(output.contains("stub: up"));

    // The under-construction row survives as evidence.
    let all = h.state.vms.list_all_vms().await.unwrap();
    let row = all.iter().find(|vm| vm.id == id).unwrap();
    assert!(row.hostname.starts_with("under-construction-"));
}

#[tokio::test]
async fn hung_provisioner_invocations_are_bounded_by_the_timeout() {
    let h = TestHarness::with_hanging_provisioner().await;
    let owner = h.state.identity.register_user("Wanda").await.unwrap();

    // The stub sleeps far past the 1s bound; the operation must come back
    // as a recoverable failure instead of hanging.
    let outcome = h.state.vms.build(owner, None).await.unwrap();
    let BuildOutcome::ProvisionerFailed { output, .. } = outcome else {
        panic!("expected the timed-out build to fail recoverably");
    };
    assert!(output.contains("timed out after 1s"));

    // The killed stub never reached its log line.
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn resolving_a_duplicated_hostname_is_ambiguous() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Walt").await.unwrap();

    for _ in 0..2 {
        h.state
            .store
            .insert_vm_placeholder(owner, "ubuntu/trusty64", "clone-host", "now")
            .await
            .unwrap();
    }

    let err = h
        .state
        .vms
        .resolve(&VmRef::Hostname("clone-host".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ambiguous(_)));

    // Lookup is folded equality, not a pattern: a wildcard matches nothing.
    let err = h
        .state
        .vms
        .resolve(&VmRef::Hostname("%".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn destroy_hides_the_vm_but_keeps_the_record() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Mallory").await.unwrap();
    let (id, hostname) = build_one(&h, owner).await;

    // Hostname resolution works for teardown too.
    let output = h
        .state
        .vms
        .destroy(&VmRef::Hostname(hostname.clone()))
        .await
        .unwrap();
    assert!(output.contains("stub: destroy --force"));

    let active = h.state.vms.list_vms().await.unwrap();
    assert!(!active.iter().any(|vm| vm.id == id));

    let all = h.state.vms.list_all_vms().await.unwrap();
    let row = all.iter().find(|vm| vm.id == id).unwrap();
    assert!(!row.active);
}

#[tokio::test]
async fn delete_removes_the_record_entirely() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Niaj").await.unwrap();
    let (id, _) = build_one(&h, owner).await;

    h.state.vms.delete(&VmRef::Id(id)).await.unwrap();

    let all = h.state.vms.list_all_vms().await.unwrap();
    assert!(!all.iter().any(|vm| vm.id == id));

    let err = h.state.vms.resolve(&VmRef::Id(id)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_tolerates_a_missing_working_directory() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Olivia").await.unwrap();

    // A row whose build never created a directory, e.g. a crash between the
    // insert and the provisioning steps.
    let vm = h
        .state
        .store
        .insert_vm_placeholder(owner, "ubuntu/trusty64", "under-construction-0", "now")
        .await
        .unwrap();

    let output = h.state.vms.delete(&VmRef::Id(vm.id)).await.unwrap();
    assert!(output.is_empty());

    let all = h.state.vms.list_all_vms().await.unwrap();
    assert!(!all.iter().any(|row| row.id == vm.id));
}

#[tokio::test]
async fn rebuild_tears_down_and_reprovisions_in_place() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Peggy").await.unwrap();
    let (id, hostname) = build_one(&h, owner).await;
    h.state.vms.destroy(&VmRef::Id(id)).await.unwrap();

    let output = h
        .state
        .vms
        .rebuild(&VmRef::Hostname(hostname))
        .await
        .unwrap();
    assert!(output.contains("stub: destroy --force"));
    assert!(output.contains("stub: up"));

    let vm_dir = h.state.config.provisioner.work_dir.join(id.to_string());
    let calls = h.calls();
    // build, destroy, then the rebuild pair
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2], format!("{} destroy --force", vm_dir.display()));
    assert_eq!(calls[3], format!("{} up", vm_dir.display()));

    // The row is live again.
    let active = h.state.vms.list_vms().await.unwrap();
    assert!(active.iter().any(|vm| vm.id == id && vm.active));
}

#[tokio::test]
async fn provision_requires_a_known_vm() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Quinn").await.unwrap();
    let (id, _) = build_one(&h, owner).await;

    let output = h.state.vms.provision(&VmRef::Id(id)).await.unwrap();
    assert!(output.contains("stub: provision"));

    let err = h
        .state
        .vms
        .provision(&VmRef::Hostname("no-such-host".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn clean_reclaims_vms_of_departed_owners() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Rupert").await.unwrap();
    let keeper = h.state.identity.register_user("Sybil").await.unwrap();
    let (reclaimed_id, reclaimed_hostname) = build_one(&h, owner).await;
    let (kept_id, _) = build_one(&h, keeper).await;

    h.state
        .identity
        .deactivate_user(vmbroker::audit::SYSTEM_ACTOR, owner)
        .await
        .unwrap();

    let report = h.state.vms.clean().await.unwrap();
    assert_eq!(report.hostnames, vec![reclaimed_hostname]);

    // Teardown for the reclaimed VM plus one global prune from the work root.
    let calls = h.calls();
    let vm_dir = h
        .state
        .config
        .provisioner
        .work_dir
        .join(reclaimed_id.to_string());
    assert!(calls.contains(&format!("{} destroy --force", vm_dir.display())));
    assert_eq!(
        calls.last().unwrap(),
        &format!(
            "{} global-status --prune",
            h.state.config.provisioner.work_dir.display()
        )
    );

    // Clean never deletes records and never touches live owners' machines.
    let all = h.state.vms.list_all_vms().await.unwrap();
    assert!(all.iter().any(|vm| vm.id == reclaimed_id && !vm.active));
    assert!(all.iter().any(|vm| vm.id == kept_id && vm.active));
}

#[tokio::test]
async fn claim_reassigns_ownership() {
    let h = TestHarness::new().await;
    let tina = h.state.identity.register_user("Tina").await.unwrap();
    let umar = h.state.identity.register_user("Umar").await.unwrap();
    let (id, _) = build_one(&h, tina).await;

    h.state.vms.claim(&VmRef::Id(id), umar).await.unwrap();

    assert!(h.state.identity.owns_vm(umar, id).await.unwrap());
    assert!(!h.state.identity.owns_vm(tina, id).await.unwrap());

    let err = h
        .state
        .vms
        .claim(&VmRef::Id(id), 9999)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn passthrough_is_blocklist_gated() {
    let h = TestHarness::new().await;

    // Seeded defaults apply immediately.
    let err = h.state.vms.passthrough("rm -rf /tmp/junk").await.unwrap_err();
    assert!(matches!(err, Error::Blocked(_)));
    assert!(h.calls().is_empty());

    let output = h.state.vms.passthrough("echo hello there").await.unwrap();
    assert!(output.contains("hello there"));

    // New entries take effect without a restart.
    h.state.add_blocked_command("echo").await.unwrap();
    let err = h.state.vms.passthrough("echo hello").await.unwrap_err();
    assert!(matches!(err, Error::Blocked(_)));
}

#[tokio::test]
async fn passthrough_spawn_failures_are_external_process_errors() {
    let h = TestHarness::new().await;

    let err = h
        .state
        .vms
        .passthrough("no-such-binary-anywhere --version")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalProcess(_)));
}

#[tokio::test]
async fn mutating_operations_are_audited_on_entry() {
    let h = TestHarness::new().await;
    let owner = h.state.identity.register_user("Vera").await.unwrap();
    build_one(&h, owner).await;
    h.state.vms.destroy(&VmRef::Id(1)).await.unwrap();

    let entries = h.state.audit.logs_since("0").await.unwrap();
    let descriptions: Vec<&str> = entries
        .iter()
        .map(|entry| entry.description.as_str())
        .collect();

    assert!(descriptions.iter().any(|d| d.starts_with("register_user(")));
    assert!(
        descriptions
            .iter()
            .any(|d| *d == format!("build_vm(owner={owner} box=None)"))
    );
    assert!(descriptions.iter().any(|d| *d == "destroy_vm(target=1)"));

    for entry in &entries {
        assert_eq!(entry.actor_name, "System");
        assert!(entry.timestamp > 0);
    }

    // Garbage cutoffs are reported, not crashed on.
    let err = h.state.audit.logs_since("whenever").await.unwrap_err();
    assert!(matches!(err, Error::ParseFailure(_)));
}

#[tokio::test]
async fn failed_attempts_still_leave_an_audit_trail() {
    let h = TestHarness::new().await;

    let err = h.state.vms.destroy(&VmRef::Id(42)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let entries = h.state.audit.logs_since("0").await.unwrap();
    assert!(
        entries
            .iter()
            .any(|entry| entry.description == "destroy_vm(target=42)")
    );
}
