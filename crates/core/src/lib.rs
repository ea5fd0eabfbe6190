pub mod caller;
pub mod credential;
pub mod envelope;
pub mod token;

pub use caller::{AuthMethod, Caller};
pub use credential::InternalCredential;
pub use envelope::ProcedureEnvelope;
pub use token::{TokenError, UnverifiedClaims, mask_token, peek_claims};
