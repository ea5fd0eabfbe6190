pub mod builder;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod login;
pub mod metrics;
pub mod translator;
pub mod validator;

pub use builder::GatewayBuilder;
pub use credential::{CredentialPolicy, CredentialStatus, InternalCredentialManager};
pub use error::GatewayError;
pub use gateway::{
    AnonymousPassthrough, ForwardRequest, Gateway, GatewayConfig, LegacyResponse, Operation,
};
pub use login::{HttpLegacyAuthenticator, LegacyAuthenticator, LoginError};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use translator::{DETAIL_PROCEDURE, LIST_PROCEDURE, LegacyTranslator, ListQuery};
pub use validator::{CredentialValidator, InvalidCredential};
