mod admin_approve;
mod sqlite_accessor;

use endorse::{
    accessor::{EmailList, InMemoryAccessor, MemoryState, SqliteAccessor},
    endorsement::{
        Category, EndorsementAccessor, EndorsementContext, EndorsementDomain, EndorsementPolicy,
        EndorsementRequest, PaperProps, User, UserId,
    },
};
use time::{Duration, OffsetDateTime};

pub const ENDORSER: UserId = 1;
pub const ENDORSEE: UserId = 2;
pub const MODERATOR: UserId = 3;
pub const ADMIN: UserId = 4;

pub fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_760_000_000).expect("fixture timestamp is valid")
}

pub fn user(id: UserId, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.org"),
        veto_status: Default::default(),
        flag_proxy: false,
        flag_suspect: false,
        is_admin: false,
    }
}

pub fn domain(name: &str, papers_to_endorse: u32) -> EndorsementDomain {
    EndorsementDomain {
        name: name.to_string(),
        endorse_all: false,
        mods_endorse_all: false,
        endorse_email: false,
        papers_to_endorse,
    }
}

pub fn category(archive: &str, subject_class: &str, domain: &str) -> Category {
    Category {
        archive: archive.to_string(),
        subject_class: subject_class.to_string(),
        definitive: true,
        category_name: format!("{archive}.{subject_class}"),
        endorsement_domain: Some(domain.to_string()),
    }
}

pub fn paper(document_id: i64, title: &str, flag_author: bool, days_ago: i64) -> PaperProps {
    PaperProps {
        document_id,
        flag_author,
        title: title.to_string(),
        dated: now() - Duration::days(days_ago),
    }
}

pub fn request(id: i64, endorsee_id: UserId, archive: &str, subject_class: &str) -> EndorsementRequest {
    EndorsementRequest {
        id,
        endorsee_id,
        archive: archive.to_string(),
        subject_class: subject_class.to_string(),
        secret: format!("SECRET{id}"),
        point_value: 0,
        flag_valid: true,
        issued_when: now() - Duration::days(1),
    }
}

/// `count` papers owned by `user_id` in `domain`, dated `days_ago`.
pub fn with_papers(
    mut state: MemoryState,
    user_id: UserId,
    domain: &str,
    count: usize,
    authored: bool,
    days_ago: i64,
) -> MemoryState {
    let offset = state.papers.len() as i64;
    for n in 0..count as i64 {
        let document_id = user_id * 1000 + offset + n;
        let title = format!("Paper {document_id}");
        state = state.with_paper(user_id, domain, paper(document_id, &title, authored, days_ago));
    }
    state
}

/// cs.AI lives in the `cs` domain (3 papers), math.NA in `math` (2 papers),
/// cs.GL exists but is not definitive. The endorsee already has enough
/// recent papers to clear the endorsee-side paper check.
pub fn fixture_state() -> MemoryState {
    let mut admin = user(ADMIN, "dana");
    admin.is_admin = true;

    let mut non_definitive = category("cs", "GL", "cs");
    non_definitive.definitive = false;

    let state = MemoryState::default()
        .with_user(user(ENDORSER, "alice"))
        .with_user(user(ENDORSEE, "bob"))
        .with_user(user(MODERATOR, "carol"))
        .with_user(admin)
        .with_domain(domain("cs", 3))
        .with_domain(domain("math", 2))
        .with_category(category("cs", "AI", "cs"))
        .with_category(category("math", "NA", "math"))
        .with_category(non_definitive)
        .with_moderator(MODERATOR, "cs", "AI")
        .with_email_pattern(EmailList::White, "%.edu")
        .with_email_pattern(EmailList::Black, "%@spam.edu");

    with_papers(state, ENDORSEE, "cs", 3, true, 200)
}

pub fn accessor(state: MemoryState) -> InMemoryAccessor {
    InMemoryAccessor::new(state)
}

pub fn load(accessor: &dyn EndorsementAccessor, id: UserId) -> User {
    accessor
        .get_user(id)
        .expect("user lookup should succeed")
        .expect("fixture user should exist")
}

pub fn vote_ctx(
    accessor: &dyn EndorsementAccessor,
    endorser_id: UserId,
    endorsee_id: UserId,
    archive: &str,
    subject_class: &str,
) -> EndorsementContext {
    EndorsementContext::new(archive, subject_class, now())
        .with_endorser(load(accessor, endorser_id))
        .with_endorsee(load(accessor, endorsee_id))
}

pub fn policy() -> EndorsementPolicy {
    EndorsementPolicy::default()
}

/// Copies every fixture table into a fresh in-memory SQLite database.
pub fn seed_sqlite(state: &MemoryState) -> SqliteAccessor {
    let accessor = SqliteAccessor::open_in_memory().expect("sqlite should open");
    for user in state.users.values() {
        accessor.insert_user(user).expect("user should insert");
    }
    for domain in state.domains.values() {
        accessor.insert_domain(domain).expect("domain should insert");
    }
    for category in &state.categories {
        accessor.insert_category(category).expect("category should insert");
    }
    for (user_id, category) in &state.moderators {
        accessor
            .insert_moderator(*user_id, &category.archive, &category.subject_class)
            .expect("moderator should insert");
    }
    for category in &state.questionable {
        accessor
            .insert_questionable(&category.archive, &category.subject_class)
            .expect("questionable category should insert");
    }
    for owned in &state.papers {
        accessor
            .insert_paper(owned.user_id, &owned.domain, &owned.paper)
            .expect("paper should insert");
    }
    for pattern in &state.email_patterns {
        accessor
            .insert_email_pattern(pattern)
            .expect("email pattern should insert");
    }
    accessor
}
