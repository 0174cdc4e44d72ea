//! Request routing and status mapping.

use serde_json::{json, Value};

use super::http::{Request, Response};
use crate::application::{PredictionService, ServeError};
use crate::domain::{ValidationError, SCHEMA_VERSION};

/// 422 body in the `{"detail":[{"loc","msg","type"}]}` shape clients expect.
fn validation_body(err: &ValidationError) -> Value {
    let loc = if err.field == "body" {
        json!(["body"])
    } else {
        json!(["body", err.field])
    };
    json!({
        "detail": [{
            "loc": loc,
            "msg": err.reason.to_string(),
            "type": err.reason.kind(),
        }]
    })
}

fn predict(service: &PredictionService, body: &[u8]) -> Response {
    let raw: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected non-JSON body");
            return Response::detail(400, "Request body is not valid JSON");
        }
    };

    match service.predict(&raw) {
        Ok(response) => Response::json(200, &response),
        Err(ServeError::Validation(e)) => Response::json(422, &validation_body(&e)),
        // already logged by the service
        Err(ServeError::Internal(_)) => Response::internal_error(),
    }
}

/// Dispatch one request.
pub fn route(service: &PredictionService, request: &Request) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/predict") => predict(service, &request.body),
        ("GET", "/metrics") => Response::json(200, &service.metrics()),
        ("GET", "/health") => Response::json(
            200,
            &json!({ "status": "ok", "schema_version": SCHEMA_VERSION }),
        ),
        (_, "/predict") => Response::detail(405, "Method Not Allowed").with_allow("POST"),
        (_, "/metrics" | "/health") => Response::detail(405, "Method Not Allowed").with_allow("GET"),
        _ => Response::detail(404, "Not Found"),
    }
}
