pub mod errors;
pub mod factory;
pub mod session;

pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};
pub use session::{HistoryEntry, Session, Suggestion};
