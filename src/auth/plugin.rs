//! Auth plugins: extra endpoints mounted next to the core wire endpoints.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde_json::{Value, json};
use std::sync::Arc;

use super::AuthInstance;

pub trait AuthPlugin: Send + Sync {
    /// Stable identifier, also part of the provider's memoization key.
    fn id(&self) -> &'static str;

    /// Add the plugin's routes. Paths are relative to the auth mount path.
    fn extend(&self, router: Router<Arc<AuthInstance>>) -> Router<Arc<AuthInstance>>;
}

/// Serves an OpenAPI document describing the auth endpoints at
/// `GET /open-api/generate-schema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApiPlugin;

impl AuthPlugin for OpenApiPlugin {
    fn id(&self) -> &'static str {
        "open-api"
    }

    fn extend(&self, router: Router<Arc<AuthInstance>>) -> Router<Arc<AuthInstance>> {
        router.route("/open-api/generate-schema", get(generate_schema))
    }
}

async fn generate_schema(State(auth): State<Arc<AuthInstance>>) -> Json<Value> {
    Json(schema(&auth.base_url()))
}

fn schema(server: &str) -> Value {
    let error = json!({ "$ref": "#/components/schemas/Error" });
    let auth_response = json!({
        "description": "Signed in. The session cookie is set.",
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/AuthResponse" } } }
    });

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "TStack Auth",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "servers": [{ "url": server }],
        "paths": {
            "/sign-up/email": {
                "post": {
                    "summary": "Create an account with email and password",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": {
                            "type": "object",
                            "required": ["name", "email", "password"],
                            "properties": {
                                "name": { "type": "string" },
                                "email": { "type": "string", "format": "email" },
                                "password": { "type": "string", "minLength": 8, "maxLength": 128 }
                            }
                        } } }
                    },
                    "responses": {
                        "200": auth_response.clone(),
                        "400": { "description": "Invalid input", "content": { "application/json": { "schema": error.clone() } } },
                        "422": { "description": "User already exists", "content": { "application/json": { "schema": error.clone() } } }
                    }
                }
            },
            "/sign-in/email": {
                "post": {
                    "summary": "Sign in with email and password",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": {
                            "type": "object",
                            "required": ["email", "password"],
                            "properties": {
                                "email": { "type": "string", "format": "email" },
                                "password": { "type": "string" }
                            }
                        } } }
                    },
                    "responses": {
                        "200": auth_response,
                        "401": { "description": "Invalid email or password", "content": { "application/json": { "schema": error.clone() } } }
                    }
                }
            },
            "/sign-out": {
                "post": {
                    "summary": "End the current session",
                    "responses": { "200": { "description": "Signed out. The session cookie is cleared." } }
                }
            },
            "/get-session": {
                "get": {
                    "summary": "Current session and user, or null",
                    "responses": { "200": {
                        "description": "Session or null",
                        "content": { "application/json": { "schema": {
                            "oneOf": [
                                { "$ref": "#/components/schemas/SessionWithUser" },
                                { "type": "null" }
                            ]
                        } } }
                    } }
                }
            },
            "/ok": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": { "200": { "description": "`{\"ok\": true}`" } }
                }
            }
        },
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": { "code": { "type": "string" }, "message": { "type": "string" } }
                },
                "User": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "email": { "type": "string" },
                        "name": { "type": ["string", "null"] },
                        "emailVerified": { "type": "boolean" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    }
                },
                "Session": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "userId": { "type": "string" },
                        "expiresAt": { "type": "string", "format": "date-time" },
                        "ipAddress": { "type": ["string", "null"] },
                        "userAgent": { "type": ["string", "null"] }
                    }
                },
                "SessionWithUser": {
                    "type": "object",
                    "properties": {
                        "session": { "$ref": "#/components/schemas/Session" },
                        "user": { "$ref": "#/components/schemas/User" }
                    }
                },
                "AuthResponse": {
                    "type": "object",
                    "properties": {
                        "token": { "type": "string" },
                        "user": { "$ref": "#/components/schemas/User" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_core_endpoints() {
        let doc = schema("http://localhost:3001/api/auth");
        assert_eq!(doc["servers"][0]["url"], "http://localhost:3001/api/auth");
        for path in ["/sign-up/email", "/sign-in/email", "/sign-out", "/get-session", "/ok"] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
    }

    #[test]
    fn test_plugin_id() {
        assert_eq!(OpenApiPlugin.id(), "open-api");
    }
}
