pub mod business;
pub mod error;
pub mod gates;
pub mod outcome;
pub mod policy;
pub mod ports;
pub mod types;

pub use business::EndorsementBusiness;
pub use error::{EndorsementError, EndorsementErrorKind};
pub use outcome::{EndorsementOutcome, EndorserCapability};
pub use policy::{EligibilityWindow, EndorsementPolicy};
pub use ports::EndorsementAccessor;
pub use types::{
    AdminAuditAction, AuditRecord, Category, Endorsement, EndorsementContext, EndorsementDomain,
    EndorsementRequest, EndorsementType, EndorsementVote, PaperProps, PaperWindow, TrackingInfo,
    User, UserId, VetoStatus,
};
