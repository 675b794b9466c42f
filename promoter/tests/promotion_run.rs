//! End-to-end promotion runs against throwaway bare remotes.
//!
//! Each test seeds a remote whose `master` carries the ledger, runs
//! `run_promotion` against it, and inspects what landed on the remote.

use promoter::core::ledger::Cell;
use promoter::error::PromotionError;
use promoter::io::config::PromoterConfig;
use promoter::promote::{PromotionRequest, run_promotion};
use promoter::test_support::{TestRemote, branch, ledger_with};

const RELEASE_FILES: &[(&str, &str)] = &[
    ("helm-charts/dev2-values/values.yaml", "replicas: 1\n"),
    ("helm-charts/dev2-values/api/secrets.yaml", "token: dev\n"),
    ("helm-charts/qa-values/values.yaml", "replicas: 2\n"),
    ("helm-charts/prod-values/values.yaml", "replicas: 3\n"),
    ("helm-charts/templates/deployment.yaml", "kind: Deployment\n"),
];

fn request(
    remote: &TestRemote,
    lower: &str,
    higher: &str,
    version: Option<&str>,
) -> PromotionRequest {
    PromotionRequest {
        lower_env: lower.to_string(),
        higher_env: higher.to_string(),
        repo_url: remote.url(),
        new_version: version.map(str::to_string),
    }
}

fn converged_remote() -> TestRemote {
    let ledger = ledger_with(
        &["dev2", "qa", "prod"],
        &[&["rel/1.0.0", "X", "X"], &["X", "rel/1.0.0", "X"]],
    );
    let remote = TestRemote::new(&ledger).expect("remote");
    remote.add_branch("rel/1.0.0", RELEASE_FILES).expect("release branch");
    remote
}

fn domain_error(err: &anyhow::Error) -> &PromotionError {
    err.downcast_ref::<PromotionError>()
        .unwrap_or_else(|| panic!("expected a promotion error, got: {err:#}"))
}

/// Bootstrap convergence: mints `rel/1.1.0`, pushes it with every overlay
/// cleared, and records it on the trunk ledger.
#[test]
fn bootstrap_convergence_provisions_scrubbed_branch() {
    let remote = converged_remote();

    let plan = run_promotion(
        &request(&remote, "dev2", "qa", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .expect("promotion");

    assert_eq!(plan.base_branch, branch("rel/1.0.0"));
    assert_eq!(plan.target_branch, branch("rel/1.1.0"));
    assert_eq!(plan.lower_env, "dev2");
    assert_eq!(plan.higher_env, "qa");
    assert!(plan.branch_was_created);
    assert!(!plan.reverse_promotion);

    assert!(remote.has_branch("rel/1.1.0").expect("branch list"));
    let files = remote.files("rel/1.1.0").expect("ls-tree");
    for overlay in ["dev2-values", "qa-values", "prod-values"] {
        assert!(
            files.contains(&format!("helm-charts/{overlay}/readme.md")),
            "missing marker in {overlay}: {files:?}"
        );
        assert!(!files.contains(&format!("helm-charts/{overlay}/values.yaml")));
    }
    assert!(files.contains(&"helm-charts/dev2-values/api/readme.md".to_string()));
    assert!(!files.contains(&"helm-charts/dev2-values/api/secrets.yaml".to_string()));
    assert!(files.contains(&"helm-charts/templates/deployment.yaml".to_string()));

    assert_eq!(
        remote.last_commit("rel/1.1.0", "%an <%ae>").expect("author"),
        "promotion-bot <promotion-bot@users.noreply.github.com>"
    );
    assert_eq!(
        remote.last_commit("rel/1.1.0", "%s").expect("subject"),
        "Initialize rel/1.1.0: clean environment folders"
    );

    let ledger = remote.trunk_ledger().expect("trunk ledger");
    assert_eq!(ledger.rows().len(), 3);
    assert_eq!(ledger.last_branch("dev2").expect("dev2").branch, branch("rel/1.1.0"));
    assert_eq!(ledger.cell(4, 2), Some(&Cell::NoBranch));
    assert_eq!(
        remote.last_commit("master", "%s").expect("subject"),
        "Add rel/1.1.0 to ledger"
    );

    // The original release branch is untouched.
    assert_eq!(
        remote
            .show("rel/1.0.0", "helm-charts/qa-values/values.yaml")
            .expect("show"),
        Some("replicas: 2\n".to_string())
    );
}

#[test]
fn bootstrap_convergence_without_version_fails_and_leaves_remote_alone() {
    let remote = converged_remote();
    let before = remote.trunk_ledger().expect("ledger");

    let err = run_promotion(&request(&remote, "dev2", "qa", None), &PromoterConfig::default())
        .unwrap_err();

    assert!(matches!(domain_error(&err), PromotionError::MissingVersion { .. }));
    assert_eq!(remote.trunk_ledger().expect("ledger"), before);
}

#[test]
fn divergence_reuses_existing_branch() {
    let ledger = ledger_with(&["dev2", "qa"], &[&["X", "rel/0.9.0"], &["rel/1.0.0", "X"]]);
    let remote = TestRemote::new(&ledger).expect("remote");

    let plan = run_promotion(
        &request(&remote, "dev2", "qa", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .expect("promotion");

    assert_eq!(plan.base_branch, branch("rel/0.9.0"));
    assert_eq!(plan.target_branch, branch("rel/1.0.0"));
    assert!(!plan.branch_was_created);
    assert_eq!(remote.trunk_ledger().expect("ledger"), ledger);
}

/// Lock-step above the bootstrap tier only re-seeds the run's transient
/// ledger copy: no branch is provisioned and the trunk is not rewritten.
#[test]
fn lock_step_reseeds_bootstrap_without_provisioning() {
    let ledger = ledger_with(
        &["dev2", "qa", "prod"],
        &[&["X", "rel/2.0.0", "X"], &["X", "X", "rel/2.0.0"]],
    );
    let remote = TestRemote::new(&ledger).expect("remote");

    let plan = run_promotion(
        &request(&remote, "qa", "prod", None),
        &PromoterConfig::default(),
    )
    .expect("promotion");

    assert_eq!(plan.base_branch, branch("rel/2.0.0"));
    assert_eq!(plan.target_branch, branch("rel/2.0.0_promotion_branch"));
    assert_eq!(plan.lower_env, "dev2");
    assert_eq!(plan.higher_env, "prod");
    assert!(!plan.branch_was_created);
    assert!(plan.reverse_promotion);
    assert!(!remote.has_branch("rel/2.0.0_promotion_branch").expect("branch list"));
    assert_eq!(remote.trunk_ledger().expect("ledger"), ledger);
}

#[test]
fn missing_base_branch_fails_before_any_push() {
    let ledger = ledger_with(&["dev2", "qa"], &[&["rel/1.0.0", "X"], &["X", "rel/1.0.0"]]);
    let remote = TestRemote::new(&ledger).expect("remote");

    let err = run_promotion(
        &request(&remote, "dev2", "qa", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        domain_error(&err),
        PromotionError::BaseBranchNotFound(name) if name == "rel/1.0.0"
    ));
    assert!(!remote.has_branch("rel/1.1.0").expect("branch list"));
    assert_eq!(remote.trunk_ledger().expect("ledger"), ledger);
}

#[test]
fn existing_target_branch_rejects_push() {
    let remote = converged_remote();
    remote
        .add_branch("rel/1.1.0", &[("NOTES.md", "someone else got here first\n")])
        .expect("conflicting branch");
    let before = remote.trunk_ledger().expect("ledger");

    let err = run_promotion(
        &request(&remote, "dev2", "qa", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        domain_error(&err),
        PromotionError::PushRejected { branch, .. } if branch == "rel/1.1.0"
    ));
    assert_eq!(remote.trunk_ledger().expect("ledger"), before);
}

#[cfg(unix)]
#[test]
fn rejected_trunk_push_is_ledger_push_rejected() {
    let remote = converged_remote();
    remote.reject_pushes_to("master").expect("hook");
    let before = remote.trunk_ledger().expect("ledger");

    let err = run_promotion(
        &request(&remote, "dev2", "qa", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        domain_error(&err),
        PromotionError::LedgerPushRejected { branch, .. } if branch == "master"
    ));
    assert!(remote.has_branch("rel/1.1.0").expect("branch list"));
    assert_eq!(remote.trunk_ledger().expect("ledger"), before);
}

#[test]
fn unknown_environment_fails_without_touching_remote() {
    let remote = converged_remote();
    let before = remote.trunk_ledger().expect("ledger");

    let err = run_promotion(
        &request(&remote, "dev2", "uat", Some("1.1.0")),
        &PromoterConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(
        domain_error(&err),
        PromotionError::UnknownEnvironment(env) if env == "uat"
    ));
    assert_eq!(remote.trunk_ledger().expect("ledger"), before);
}
