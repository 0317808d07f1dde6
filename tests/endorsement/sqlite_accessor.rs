use std::thread;

use endorse::{
    accessor::{AccessorError, SqliteAccessor},
    endorsement::{
        EndorsementAccessor, EndorsementBusiness, EndorsementContext, EndorsementType,
        EndorsementVote, PaperWindow, VetoStatus,
    },
};
use rusqlite::params;
use uuid::Uuid;

use super::{
    ENDORSEE, ENDORSER, MODERATOR, fixture_state, load, now, policy, request, seed_sqlite,
    vote_ctx, with_papers,
};

fn seeded() -> SqliteAccessor {
    seed_sqlite(&with_papers(fixture_state(), ENDORSER, "cs", 3, true, 2000))
}

fn insert_revoked_auto(accessor: &SqliteAccessor, point_value: i32) {
    accessor
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO endorsements \
                 (endorser_id, endorsee_id, archive, subject_class, flag_valid, type, point_value, issued_when) \
                 VALUES (NULL, ?1, 'cs', 'AI', 0, 'auto', ?2, ?3)",
                params![ENDORSEE, point_value, now().unix_timestamp()],
            )?;
            Ok::<_, AccessorError>(())
        })
        .expect("revoked endorsement should insert");
}

#[test]
fn given_seeded_database_when_can_submit_and_submit_then_row_is_persisted() {
    let accessor = seeded();
    let pending = accessor
        .insert_request(&request(0, ENDORSEE, "cs", "AI"))
        .expect("request should insert");
    let ctx = vote_ctx(&accessor, ENDORSER, ENDORSEE, "cs", "AI").with_request(pending.clone());

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx.clone());
    assert!(business.can_submit().expect("evaluation should succeed"));
    let stored = business
        .submit_endorsement()
        .expect("submission should succeed");

    assert_eq!(stored.endorsement_type, EndorsementType::User);
    assert_eq!(stored.request_id, Some(pending.id));
    let found = accessor
        .get_existing_endorsement(&ctx)
        .expect("lookup should succeed")
        .expect("endorsement should exist");
    assert_eq!(found, stored);

    let refreshed = accessor
        .get_request(pending.id)
        .expect("request lookup should succeed")
        .expect("request should exist");
    assert_eq!(refreshed.point_value, 10);

    let audit = accessor.audit_log(false).expect("audit should load");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].data, "1 cs.AI user 10");
    assert!(accessor.audit_log(true).expect("admin audit should load").is_empty());

    let mut again = EndorsementBusiness::new(&accessor, policy(), ctx);
    assert!(!again.can_submit().expect("evaluation should succeed"));
    assert!(again.outcome().submitted);
}

#[test]
fn given_negative_vote_when_submitted_then_endorsee_flag_is_persisted() {
    let accessor = seeded();
    let ctx = vote_ctx(&accessor, ENDORSER, ENDORSEE, "cs", "AI")
        .with_vote(EndorsementVote::negative("no"));

    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    assert!(business.can_submit().expect("evaluation should succeed"));
    business
        .submit_endorsement()
        .expect("submission should succeed");

    assert!(load(&accessor, ENDORSEE).flag_suspect);
    let admin_audit = accessor.audit_log(true).expect("admin audit should load");
    assert_eq!(admin_audit.len(), 1);
    assert_eq!(admin_audit[0].action, "got-negative-endorsement");
}

#[test]
fn given_concurrent_auto_submissions_when_racing_then_one_row_wins() {
    let accessor = seed_sqlite(&fixture_state());
    let endorsee = load(&accessor, ENDORSEE);

    let mut contenders = Vec::new();
    for _ in 0..6 {
        let ctx = EndorsementContext::new("cs", "AI", now()).with_endorsee(endorsee.clone());
        let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
        assert!(business.can_auto_endorse().expect("evaluation should succeed"));
        contenders.push(business);
    }

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = contenders
            .into_iter()
            .map(|mut business| scope.spawn(move || business.submit_endorsement()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("submitter thread should not panic"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|err| err.is_conflict())
    );
    let rows = accessor
        .get_endorsements(ENDORSEE, "cs", "AI")
        .expect("endorsements should load");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].endorser_id, None);
}

#[test]
fn given_revoked_auto_endorsement_in_questionable_category_when_can_submit_then_rejected() {
    let accessor = seeded();
    accessor
        .insert_questionable("cs", "AI")
        .expect("questionable category should insert");
    insert_revoked_auto(&accessor, 0);

    let questionable = accessor
        .get_questionable_categories("cs", "AI")
        .expect("questionable lookup should succeed");
    assert_eq!(questionable.len(), 1);

    let ctx = vote_ctx(&accessor, ENDORSER, ENDORSEE, "cs", "AI");
    let mut business = EndorsementBusiness::new(&accessor, policy(), ctx);
    assert!(!business.can_submit().expect("evaluation should succeed"));
    assert!(business.outcome().reason.contains("under review"));
}

#[test]
fn given_archive_wide_moderator_when_is_moderator_then_wildcard_matches() {
    let accessor = seeded();
    accessor
        .insert_moderator(ENDORSER, "math", "")
        .expect("moderator should insert");

    assert!(accessor.is_moderator(ENDORSER, "math", None).expect("lookup"));
    assert!(accessor.is_moderator(ENDORSER, "math", Some("*")).expect("lookup"));
    assert!(!accessor.is_moderator(ENDORSER, "math", Some("NA")).expect("lookup"));
    assert!(accessor.is_moderator(MODERATOR, "cs", Some("AI")).expect("lookup"));
    assert!(!accessor.is_moderator(MODERATOR, "cs", Some("LG")).expect("lookup"));
}

#[test]
fn given_email_patterns_when_classified_then_blacklist_wins() {
    let accessor = seeded();

    let (academic, reason) = accessor
        .is_academic_email("bob@cs.uni.edu")
        .expect("classification should succeed");
    assert!(academic, "{reason}");

    let (academic, reason) = accessor
        .is_academic_email("bob@spam.edu")
        .expect("classification should succeed");
    assert!(!academic);
    assert!(reason.contains("blacklist"));

    let (academic, _) = accessor
        .is_academic_email("bob@example.org")
        .expect("classification should succeed");
    assert!(!academic);
}

#[test]
fn given_papers_when_queried_with_window_then_only_matching_dates_return() {
    let accessor = seed_sqlite(&with_papers(fixture_state(), ENDORSER, "cs", 2, false, 10));

    let all_time = accessor
        .get_papers_by_user(ENDORSER, "cs", PaperWindow::Unrestricted, false)
        .expect("papers should load");
    assert_eq!(all_time.len(), 2);

    let windowed = accessor
        .get_papers_by_user(
            ENDORSER,
            "cs",
            policy().window.at(now()).expect("window should build"),
            false,
        )
        .expect("papers should load");
    assert!(windowed.is_empty());

    let authored = accessor
        .get_papers_by_user(ENDORSER, "cs", PaperWindow::Unrestricted, true)
        .expect("papers should load");
    assert!(authored.is_empty());
}

#[test]
fn given_user_row_when_loaded_then_veto_and_flags_survive() {
    let mut state = fixture_state();
    if let Some(endorser) = state.users.get_mut(&ENDORSER) {
        endorser.veto_status = VetoStatus::NoReplace;
        endorser.flag_proxy = true;
    }
    let accessor = seed_sqlite(&state);

    let user = load(&accessor, ENDORSER);
    assert_eq!(user.veto_status, VetoStatus::NoReplace);
    assert!(user.flag_proxy);
    assert!(accessor.get_user(999).expect("lookup should succeed").is_none());
}

#[test]
fn given_database_file_when_reopened_then_schema_and_rows_persist() {
    let dir = std::env::temp_dir().join(format!("endorse-sqlite-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).expect("temp dir should exist");
    let path = dir.join("endorse.db");

    {
        let accessor = SqliteAccessor::open(&path).expect("database should open");
        for user in fixture_state().users.values() {
            accessor.insert_user(user).expect("user should insert");
        }
    }

    let reopened = SqliteAccessor::open(&path).expect("database should reopen");
    assert_eq!(load(&reopened, ENDORSEE).username, "bob");
    drop(reopened);

    let _ = std::fs::remove_dir_all(&dir);
}
