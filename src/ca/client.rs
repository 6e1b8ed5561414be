// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the certificate authority's REST API.

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CaError, CertificateAuthority, Enrollment, EnrollmentRequest, RegistrationRequest};
use crate::identity::{Identity, IdentitySigner};
use crate::profile::CaEndpoint;

// Relative, so a CA served under a path prefix keeps it.
const ENROLL_PATH: &str = "api/v1/enroll";
const REGISTER_PATH: &str = "api/v1/register";

/// Unlimited enrollments for registered users.
const UNLIMITED_ENROLLMENTS: i64 = -1;

#[derive(Serialize)]
struct EnrollBody<'a> {
    certificate_request: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<&'a str>,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    identity_type: &'a str,
    affiliation: &'a str,
    max_enrollments: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<&'a str>,
}

/// Envelope wrapping every CA response.
#[derive(Deserialize)]
struct CaResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CaMessage>,
}

#[derive(Deserialize)]
struct CaMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct EnrollResult {
    #[serde(rename = "Cert")]
    cert: String,
}

#[derive(Deserialize)]
struct RegisterResult {
    secret: String,
}

/// Certificate authority reached over HTTP(S).
pub struct FabricCaClient {
    base_url: Url,
    ca_name: Option<String>,
    client: reqwest::Client,
}

impl FabricCaClient {
    /// Build a client trusting the endpoint's TLS roots.
    pub fn new(endpoint: &CaEndpoint) -> Result<Self, CaError> {
        let mut builder = reqwest::Client::builder();
        for pem in &endpoint.tls_roots {
            let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| CaError::Configuration(format!("invalid TLS root: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        if !endpoint.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| CaError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url: directory_url(&endpoint.url),
            ca_name: endpoint.ca_name.clone(),
            client,
        })
    }

    /// `path` resolved under the CA's base URL.
    fn endpoint(&self, path: &str) -> Result<Url, CaError> {
        self.base_url
            .join(path)
            .map_err(|e| CaError::Configuration(format!("invalid CA path {path}: {e}")))
    }

    /// Read a CA response envelope, turning failures into `Rejected`.
    async fn read_envelope<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, CaError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CaError::Unreachable(e.to_string()))?;

        let envelope: CaResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(CaError::InvalidResponse(e.to_string()));
            }
            Err(_) => {
                return Err(CaError::Rejected(format!(
                    "HTTP {status}: {}",
                    String::from_utf8_lossy(&body).trim()
                )));
            }
        };

        match envelope.result {
            Some(result) if envelope.success && status.is_success() => Ok(result),
            _ => {
                let messages: Vec<String> = envelope
                    .errors
                    .iter()
                    .map(|m| format!("code {}: {}", m.code, m.message))
                    .collect();
                let detail = if messages.is_empty() {
                    format!("HTTP {status}")
                } else {
                    messages.join("; ")
                };
                Err(CaError::Rejected(detail))
            }
        }
    }
}

/// `url` with a trailing slash, so relative joins append to its path.
fn directory_url(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl CertificateAuthority for FabricCaClient {
    async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, CaError> {
        let body = EnrollBody {
            certificate_request: &request.csr_pem,
            caname: self.ca_name.as_deref(),
        };

        tracing::debug!(enrollment_id = %request.enrollment_id, url = %self.base_url, "Enrolling with certificate authority");

        let response = self
            .client
            .post(self.endpoint(ENROLL_PATH)?)
            .basic_auth(&request.enrollment_id, Some(&request.secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| CaError::Unreachable(e.to_string()))?;

        let result: EnrollResult = Self::read_envelope(response).await?;
        let certificate = Base64::decode_vec(result.cert.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| CaError::InvalidResponse("certificate is not base64 PEM".to_string()))?;

        Ok(Enrollment { certificate })
    }

    async fn register(
        &self,
        request: RegistrationRequest,
        registrar: &Identity,
    ) -> Result<String, CaError> {
        let body = serde_json::to_vec(&RegisterBody {
            id: &request.enrollment_id,
            identity_type: &request.identity_type,
            affiliation: &request.affiliation,
            max_enrollments: UNLIMITED_ENROLLMENTS,
            caname: self.ca_name.as_deref(),
        })
        .map_err(|e| CaError::Signing(e.to_string()))?;

        let url = self.endpoint(REGISTER_PATH)?;
        let signer = IdentitySigner::from_identity(registrar)
            .map_err(|e| CaError::Signing(e.to_string()))?;
        let token = signer
            .authorization_token("POST", url.path(), &body)
            .map_err(|e| CaError::Signing(e.to_string()))?;

        tracing::debug!(
            enrollment_id = %request.enrollment_id,
            registrar = %registrar.label,
            "Registering identity with certificate authority"
        );

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CaError::Unreachable(e.to_string()))?;

        let result: RegisterResult = Self::read_envelope(response).await?;
        Ok(result.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{generate_enrollment_key, Credentials, Role};
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    const CERT_PEM: &str = "-----BEGIN CERTIFICATE-----\nissued\n-----END CERTIFICATE-----\n";

    fn route(path: &str) -> String {
        format!("/{path}")
    }

    async fn spawn_ca(router: Router) -> CaEndpoint {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        CaEndpoint {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            ca_name: Some("ca-org1".into()),
            tls_roots: Vec::new(),
            verify_tls: true,
        }
    }

    fn registrar() -> Identity {
        let key = generate_enrollment_key("admin").unwrap();
        Identity {
            label: "admin".into(),
            role: Role::Admin,
            credentials: Credentials {
                certificate: CERT_PEM.into(),
                private_key: key.private_key_pem,
            },
            affiliation: None,
            msp_id: "Org1MSP".into(),
        }
    }

    fn enroll_request() -> EnrollmentRequest {
        EnrollmentRequest {
            enrollment_id: "admin".into(),
            secret: "adminpw".into(),
            csr_pem: "-----BEGIN CERTIFICATE REQUEST-----\ncsr\n-----END CERTIFICATE REQUEST-----\n"
                .into(),
        }
    }

    #[tokio::test]
    async fn enroll_decodes_issued_certificate() {
        let router = Router::new().route(
            &route(ENROLL_PATH),
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert!(headers[AUTHORIZATION.as_str()]
                    .to_str()
                    .unwrap()
                    .starts_with("Basic "));
                assert_eq!(body["caname"], "ca-org1");
                assert!(body["certificate_request"]
                    .as_str()
                    .unwrap()
                    .contains("CERTIFICATE REQUEST"));
                Json(json!({
                    "success": true,
                    "result": { "Cert": Base64::encode_string(CERT_PEM.as_bytes()) },
                    "errors": [],
                    "messages": []
                }))
            }),
        );
        let client = FabricCaClient::new(&spawn_ca(router).await).unwrap();

        let enrollment = client.enroll(enroll_request()).await.expect("enroll");
        assert_eq!(enrollment.certificate, CERT_PEM);
    }

    #[tokio::test]
    async fn enroll_rejection_keeps_ca_messages() {
        let router = Router::new().route(
            &route(ENROLL_PATH),
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "success": false,
                        "result": null,
                        "errors": [{ "code": 20, "message": "Authentication failure" }],
                        "messages": []
                    })),
                )
            }),
        );
        let client = FabricCaClient::new(&spawn_ca(router).await).unwrap();

        let err = client.enroll(enroll_request()).await.unwrap_err();
        match err {
            CaError::Rejected(detail) => assert!(detail.contains("Authentication failure")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_sends_signed_token_and_returns_secret() {
        let router = Router::new().route(
            &route(REGISTER_PATH),
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let token = headers[AUTHORIZATION.as_str()].to_str().unwrap().to_string();
                let (cert, signature) = token.split_once('.').unwrap();
                assert_eq!(Base64::decode_vec(cert).unwrap(), CERT_PEM.as_bytes());
                assert!(!signature.is_empty());
                assert_eq!(body["id"], "appUser");
                assert_eq!(body["type"], "client");
                assert_eq!(body["affiliation"], "org1.department1");
                assert_eq!(body["max_enrollments"], -1);
                Json(json!({ "success": true, "result": { "secret": "s3cret" }, "errors": [] }))
            }),
        );
        let client = FabricCaClient::new(&spawn_ca(router).await).unwrap();

        let secret = client
            .register(
                RegistrationRequest::client("appUser", "org1.department1"),
                &registrar(),
            )
            .await
            .expect("register");
        assert_eq!(secret, "s3cret");
    }

    #[tokio::test]
    async fn unreachable_ca_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = CaEndpoint::from_url(&format!("http://{addr}")).unwrap();
        let client = FabricCaClient::new(&endpoint).unwrap();

        assert!(matches!(
            client.enroll(enroll_request()).await,
            Err(CaError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn non_json_error_body_is_rejected_with_status() {
        let router = Router::new().route(
            &route(ENROLL_PATH),
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database locked") }),
        );
        let client = FabricCaClient::new(&spawn_ca(router).await).unwrap();

        match client.enroll(enroll_request()).await.unwrap_err() {
            CaError::Rejected(detail) => {
                assert!(detail.contains("500"));
                assert!(detail.contains("database locked"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn path_prefix_is_kept_and_signed() {
        use axum::{body::Bytes, extract::OriginalUri};
        use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};

        let admin = registrar();
        let public_key = rcgen::KeyPair::from_pem(&admin.credentials.private_key)
            .unwrap()
            .public_key_raw()
            .to_vec();

        let ca = Router::new()
            .route(
                &route(ENROLL_PATH),
                post(|| async {
                    Json(json!({
                        "success": true,
                        "result": { "Cert": Base64::encode_string(CERT_PEM.as_bytes()) }
                    }))
                }),
            )
            .route(
                &route(REGISTER_PATH),
                post(
                    move |OriginalUri(uri): OriginalUri, headers: HeaderMap, body: Bytes| {
                        let public_key = public_key.clone();
                        async move {
                            assert_eq!(uri.path(), "/fabric-ca/api/v1/register");

                            let token = headers[AUTHORIZATION.as_str()].to_str().unwrap();
                            let (cert, signature) = token.split_once('.').unwrap();
                            let signed = format!(
                                "POST.{}.{}.{cert}",
                                Base64::encode_string(uri.path().as_bytes()),
                                Base64::encode_string(&body),
                            );
                            UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, &public_key)
                                .verify(signed.as_bytes(), &Base64::decode_vec(signature).unwrap())
                                .expect("token signs the requested path");

                            Json(json!({ "success": true, "result": { "secret": "s3cret" } }))
                        }
                    },
                ),
            );
        let mut endpoint = spawn_ca(Router::new().nest("/fabric-ca", ca)).await;
        endpoint.url.set_path("/fabric-ca");
        let client = FabricCaClient::new(&endpoint).unwrap();

        assert_eq!(
            client.endpoint(ENROLL_PATH).unwrap().path(),
            "/fabric-ca/api/v1/enroll"
        );
        client.enroll(enroll_request()).await.expect("enroll");
        let secret = client
            .register(RegistrationRequest::client("appUser", "org1.department1"), &admin)
            .await
            .expect("register");
        assert_eq!(secret, "s3cret");
    }
}
