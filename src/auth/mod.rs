//! Authentication and authorization module entry point.
//!
//! This module exposes the AssayGate auth stack: identity and role models,
//! the permission matrix, token issuance and validation, the local and
//! managed backends behind [`AuthFacade`], the request authenticator
//! middleware, and the admin identity service.

pub mod backend;
pub mod facade;
pub mod hashing;
pub mod identity;
pub mod identity_service;
pub mod middleware;
pub mod permissions;
pub mod roles;
pub mod tokens;
pub mod validation;

pub use backend::{
    AuthBackend, AuthChallenge, ChallengeKind, LocalBackend, LoginOutcome, ManagedBackend,
    MfaSetup, RegistrationOutcome, SessionTokens,
};
pub use facade::{AuthFacade, AuthenticatedIdentity, LoginResponse, SessionResponse};
pub use identity::{Identity, IdentityResponse, NewIdentity, RegisterRequest, UpdateIdentity};
pub use identity_service::IdentityService;
pub use middleware::{
    authenticate_request, RequestAuthenticator, RequestAuthenticatorState, RequestPrincipal,
};
pub use permissions::{Action, Capability, PermissionMatrix, Resource};
pub use roles::Role;
pub use tokens::{Claims, TokenCodec, TokenKind, TokenPair};
