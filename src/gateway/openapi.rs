//! OpenAPI documentation
//!
//! Export with `cargo run --bin export_openapi`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::types::{AuthenticationResponse, ChallengesResponse, ErrorBody};
use crate::register::{CredentialsResource, RetrievedUser, UserResource, UserStatus};

/// Challenge-signature authentication security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_challenge",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Basic)
                        .description(Some(
                            r#"Basic base64({address}:{signature}) plus header
Authorization-Challenge: {challenge}

- address: hex Ed25519 public key
- signature: base64 Ed25519 signature over the challenge string bytes
- challenge: obtained from GET /challenges, single use"#,
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Settle Mint API",
        version = "0.1.0",
        description = "Challenge-authenticated mint and register endpoints.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:2406", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::get_challenges,
        crate::gateway::handlers::get_authentication,
        crate::gateway::handlers::retrieve_user,
    ),
    components(
        schemas(
            ErrorBody,
            ChallengesResponse,
            AuthenticationResponse,
            RetrievedUser,
            UserResource,
            CredentialsResource,
            UserStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Challenge issuance and caller status"),
        (name = "Users", description = "Register users and mint provisioning")
    )
)]
pub struct ApiDoc;
