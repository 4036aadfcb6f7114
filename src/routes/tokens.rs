use crate::{AppState, handlers::tokens};
use axum::{Router, routing::get};

/// Token Router
///
/// Admins issue bearer tokens. Holders may inspect or revoke their own, which
/// is how a client logs out.
pub fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", get(tokens::list_tokens).post(tokens::create_token))
        .route(
            "/tokens/{id}",
            get(tokens::read_token)
                .head(tokens::token_exists)
                .delete(tokens::delete_token),
        )
}
