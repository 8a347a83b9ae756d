use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::auth::{client_identity, CsrfStore};

#[derive(Serialize)]
struct CsrfResponse {
    csrf_token: String,
}

/// GET /csrf-token
///
/// Issues the anti-forgery token for this client. Reissuing invalidates
/// any previously issued token for the same client identity.
pub async fn issue_csrf_token(
    req: HttpRequest,
    store: web::Data<CsrfStore>,
) -> HttpResponse {
    let identity = client_identity(&req);
    let csrf_token = store.issue(&identity);

    tracing::debug!(identity = %identity, "CSRF token issued");
    HttpResponse::Ok().json(CsrfResponse { csrf_token })
}
