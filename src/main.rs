use anyhow::{Context, Result, anyhow};
use endorse::{
    accessor::SqliteAccessor,
    cli::{Command, parse_args},
    config::Config,
    endorsement::{
        EndorsementAccessor, EndorsementBusiness, EndorsementContext, EndorsementVote, User,
        UserId,
    },
    logging::init_tracing,
};
use time::OffsetDateTime;

fn load_user(accessor: &SqliteAccessor, id: UserId) -> Result<User> {
    accessor
        .get_user(id)?
        .ok_or_else(|| anyhow!("user {id} does not exist"))
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    let _logging = init_tracing(&config.logging)?;

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let accessor = SqliteAccessor::open(&config.database.path)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;

    let vote = EndorsementVote {
        preflight: !args.submit,
        positive: args.positive,
        comment: args.comment.clone(),
        ..EndorsementVote::default()
    };
    let mut ctx = EndorsementContext::new(&args.archive, &args.subject_class, OffsetDateTime::now_utc())
        .with_vote(vote);
    ctx = match args.command {
        Command::Vote {
            endorser_id,
            endorsee_id,
        } => ctx
            .with_endorser(load_user(&accessor, endorser_id)?)
            .with_endorsee(load_user(&accessor, endorsee_id)?),
        Command::Admin {
            admin_id,
            endorsee_id,
        } => {
            let admin = load_user(&accessor, admin_id)?;
            if !admin.is_admin {
                return Err(anyhow!("user {admin_id} is not an administrator"));
            }
            ctx.with_endorser(admin)
                .with_endorsee(load_user(&accessor, endorsee_id)?)
        }
        Command::Auto { endorsee_id } => ctx.with_endorsee(load_user(&accessor, endorsee_id)?),
        Command::Eligible { endorser_id } => ctx.with_endorser(load_user(&accessor, endorser_id)?),
    };

    let mut business = EndorsementBusiness::new(&accessor, config.policy, ctx);
    match args.command {
        Command::Vote { .. } => business.can_submit()?,
        Command::Admin { .. } => business.admin_approve()?,
        Command::Auto { .. } => business.can_auto_endorse()?,
        Command::Eligible { .. } => business.can_endorser_endorse()?,
    };

    let storable = !matches!(args.command, Command::Eligible { .. });
    if args.submit && storable && business.outcome().accepted && !business.outcome().submitted {
        business.submit_endorsement()?;
    }

    let outcome = business.into_outcome().redacted();
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
    );
    Ok(())
}
