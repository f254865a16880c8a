pub mod advisory;
pub mod attachments;
pub mod domain;
pub mod expense;
pub mod export;
pub mod fleet;
pub mod identity;
pub mod logbook;
pub mod ports;
pub mod sync;
pub mod trip;
pub mod workflow;

pub use domain::{
    AppMedia, AppNotification, Expense, SessionContext, Trip, TripDetails, User,
    UserCredentials, UserRole,
};
pub use logbook::{LogBookEntry, LogBookForm, LogBookRecord, LogBookStatus};
pub use ports::{
    AdvisoryService, ChangeEvent, ChangeFeed, CredentialHasher, DatabaseService, PortError,
    PortResult,
};
