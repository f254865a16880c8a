pub mod advisory_llm;
pub mod db;
pub mod password;

pub use advisory_llm::{DisabledAdvisory, OpenAiAdvisoryAdapter};
pub use db::DbAdapter;
pub use password::Argon2Hasher;
