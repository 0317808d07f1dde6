use endorse::endorsement::{EndorsementBusiness, EndorsementType, EndorserCapability, VetoStatus};

use super::{ADMIN, ENDORSEE, accessor, fixture_state, policy, vote_ctx};

#[test]
fn given_admin_and_definitive_category_when_admin_approve_then_accepted_without_papers() {
    let accessor = accessor(fixture_state());
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    let verdict = business.admin_approve().expect("evaluation should succeed");

    let outcome = business.outcome();
    assert!(verdict);
    assert!(outcome.accepted);
    assert_eq!(outcome.endorser_capability, EndorserCapability::Credited);
    assert_eq!(outcome.reason, "Endorsement issued by an administrator.");
}

#[test]
fn given_suspect_endorsee_when_admin_approve_then_still_accepted() {
    let mut state = fixture_state();
    if let Some(endorsee) = state.users.get_mut(&ENDORSEE) {
        endorsee.flag_suspect = true;
        endorsee.veto_status = VetoStatus::NoEndorse;
    }
    let accessor = accessor(state);
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    assert!(business.admin_approve().expect("evaluation should succeed"));
}

#[test]
fn given_endorsee_blocked_from_upload_when_admin_approve_then_rejected() {
    let mut state = fixture_state();
    if let Some(endorsee) = state.users.get_mut(&ENDORSEE) {
        endorsee.veto_status = VetoStatus::NoUpload;
    }
    let accessor = accessor(state);
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    let verdict = business.admin_approve().expect("evaluation should succeed");

    assert!(!verdict);
    assert!(!business.outcome().accepted);
    assert!(!business.outcome().public_reason);
}

#[test]
fn given_non_definitive_category_when_admin_approve_then_rejected() {
    let accessor = accessor(fixture_state());
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "GL");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    let verdict = business.admin_approve().expect("evaluation should succeed");

    assert!(!verdict);
    assert!(!business.outcome().request_acceptable);
}

#[test]
fn given_admin_approval_when_submitted_then_stored_as_admin_type() {
    let accessor = accessor(fixture_state());
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    business.admin_approve().expect("evaluation should succeed");
    let endorsement = business
        .submit_endorsement()
        .expect("submission should succeed");

    assert_eq!(endorsement.endorsement_type, EndorsementType::Admin);
    assert_eq!(endorsement.endorser_id, Some(ADMIN));
    assert_eq!(endorsement.point_value, 10);
}

#[test]
fn given_endorse_all_domain_when_admin_approve_then_shortcut_accepts_blocked_endorsee() {
    let mut state = fixture_state();
    if let Some(cs) = state.domains.get_mut("cs") {
        cs.endorse_all = true;
    }
    if let Some(endorsee) = state.users.get_mut(&ENDORSEE) {
        endorsee.veto_status = VetoStatus::NoUpload;
    }
    let accessor = accessor(state);
    let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    let verdict = business.admin_approve().expect("evaluation should succeed");

    let outcome = business.outcome();
    assert!(verdict);
    assert!(outcome.accepted);
    assert!(outcome.reason.contains("automatic"), "{}", outcome.reason);
}

#[test]
fn given_endorsee_with_other_vetoes_when_admin_approve_then_accepted() {
    for veto in [VetoStatus::NoEndorse, VetoStatus::NoReplace] {
        let mut state = fixture_state();
        if let Some(endorsee) = state.users.get_mut(&ENDORSEE) {
            endorsee.veto_status = veto;
        }
        let accessor = accessor(state);
        let ctx = vote_ctx(&accessor, ADMIN, ENDORSEE, "cs", "AI");

        let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
        let verdict = business.admin_approve().expect("evaluation should succeed");

        assert!(verdict, "{veto:?} must not block an administrator");
        assert_eq!(
            business.outcome().reason,
            "Endorsement issued by an administrator."
        );
    }
}
