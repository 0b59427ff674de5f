use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Identity asserted by the authentication layer in front of this service.
#[derive(Clone, Debug)]
pub struct Actor(pub String);

pub const HEADER_NAME: &str = "x-actor-id";
pub const ANONYMOUS: &str = "anonymous";

pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Response {
    let actor = request
        .headers()
        .get(HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string();
    request.extensions_mut().insert(Actor(actor));
    next.run(request).await
}
