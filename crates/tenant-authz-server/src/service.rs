//! Envoy ext_authz v3 service
//!
//! Translates `CheckRequest`s into [`RequestView`]s and decisions back into
//! `CheckResponse`s. All policy lives in [`DecisionPoint`].

use envoy_types::pb::envoy::config::core::v3::{HeaderValue, HeaderValueOption};
use envoy_types::pb::envoy::r#type::v3::HttpStatus;
use envoy_types::pb::envoy::service::auth::v3::authorization_server::{
    Authorization, AuthorizationServer,
};
use envoy_types::pb::envoy::service::auth::v3::check_response::HttpResponse;
use envoy_types::pb::envoy::service::auth::v3::{CheckRequest, CheckResponse, DeniedHttpResponse};
use envoy_types::pb::google::rpc::Status as RpcStatus;
use std::sync::Arc;
use tenant_authz::{AuthorizationDecision, DecisionPoint, Denial, RequestView};
use tonic::{Code, Request, Response, Status};
use tracing::debug;

/// Pseudo-header Envoy uses for the request authority
const AUTHORITY_HEADER: &str = ":authority";

/// ext_authz gRPC service
#[derive(Clone)]
pub struct ExtAuthzService {
    point: Arc<DecisionPoint>,
}

impl ExtAuthzService {
    /// Create service over a decision point
    pub fn new(point: Arc<DecisionPoint>) -> Self {
        Self { point }
    }

    /// Wrap into a tonic server
    pub fn into_server(self) -> AuthorizationServer<Self> {
        AuthorizationServer::new(self)
    }

    /// Decide a raw check request
    ///
    /// Envoy lowercases header names and joins repeated headers with `,`
    /// before they reach this service. Headers are offered to the decision
    /// sorted by name so lookups never depend on map iteration order.
    pub fn evaluate(&self, request: &CheckRequest) -> AuthorizationDecision {
        let Some(http) = request
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.request.as_ref())
            .and_then(|request| request.http.as_ref())
        else {
            return self.point.deny_invalid_request();
        };

        let host = Some(http.host.as_str())
            .filter(|host| !host.is_empty())
            .or_else(|| http.headers.get(AUTHORITY_HEADER).map(String::as_str));

        let mut headers: Vec<(&str, &str)> = http
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        headers.sort_unstable_by(|a, b| a.0.cmp(b.0));

        debug!("ext_authz check: id={} host={:?}", http.id, host);
        self.point.decide(&RequestView::new(host).with_headers(headers))
    }
}

#[tonic::async_trait]
impl Authorization for ExtAuthzService {
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> Result<Response<CheckResponse>, Status> {
        let decision = self.evaluate(request.get_ref());
        Ok(Response::new(to_check_response(&decision)))
    }
}

/// Render a decision in ext_authz wire form
///
/// Allow is `OK` with no HTTP response; deny is `PERMISSION_DENIED` with the
/// denial's HTTP status and headers.
pub fn to_check_response(decision: &AuthorizationDecision) -> CheckResponse {
    match decision {
        AuthorizationDecision::Allow => CheckResponse {
            status: Some(RpcStatus {
                code: Code::Ok as i32,
                ..Default::default()
            }),
            ..Default::default()
        },
        AuthorizationDecision::Deny(denial) => CheckResponse {
            status: Some(RpcStatus {
                code: Code::PermissionDenied as i32,
                message: denial.reason.to_string(),
                ..Default::default()
            }),
            http_response: Some(HttpResponse::DeniedResponse(denied_response(denial))),
            ..Default::default()
        },
    }
}

fn denied_response(denial: &Denial) -> DeniedHttpResponse {
    DeniedHttpResponse {
        status: Some(HttpStatus {
            code: i32::from(denial.http_status),
        }),
        headers: denial
            .headers
            .iter()
            .map(|(key, value)| HeaderValueOption {
                header: Some(HeaderValue {
                    key: key.clone(),
                    value: value.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_types::pb::envoy::r#type::v3::StatusCode;
    use envoy_types::pb::envoy::service::auth::v3::attribute_context::{HttpRequest, Request as AttrRequest};
    use envoy_types::pb::envoy::service::auth::v3::AttributeContext;
    use std::collections::HashMap;
    use tenant_authz::{
        CredentialStore, DecisionConfig, DenyReason, MemorySource, StoreConfig, StoreHandle,
    };

    fn service() -> ExtAuthzService {
        let store = CredentialStore::load(
            &MemorySource::new().with_entry("acme", "secretA"),
            &StoreConfig::default(),
        )
        .unwrap();
        let point = DecisionPoint::new(Arc::new(StoreHandle::new(store)), DecisionConfig::default())
            .unwrap();
        ExtAuthzService::new(Arc::new(point))
    }

    fn check_request(host: &str, headers: &[(&str, &str)]) -> CheckRequest {
        let headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CheckRequest {
            attributes: Some(AttributeContext {
                request: Some(AttrRequest {
                    http: Some(HttpRequest {
                        host: host.to_string(),
                        headers,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn call(service: &ExtAuthzService, request: CheckRequest) -> CheckResponse {
        service
            .check(Request::new(request))
            .await
            .unwrap()
            .into_inner()
    }

    fn assert_unauthorized(response: &CheckResponse, message: &str) {
        let status = response.status.as_ref().unwrap();
        assert_eq!(status.code, Code::PermissionDenied as i32);
        assert_eq!(status.message, message);

        match response.http_response.as_ref() {
            Some(HttpResponse::DeniedResponse(denied)) => {
                assert_eq!(
                    denied.status.as_ref().unwrap().code,
                    StatusCode::Unauthorized as i32
                );
                assert_eq!(denied.headers.len(), 1);
                let header = denied.headers[0].header.as_ref().unwrap();
                assert_eq!(header.key, "WWW-Authenticate");
                assert_eq!(header.value, "Basic realm=\"User Visible Realm\"");
            }
            other => panic!("expected denied response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_allow() {
        let service = service();
        let response = call(
            &service,
            check_request("acme.example.com", &[("authorization", "secretA")]),
        )
        .await;

        assert_eq!(response.status.unwrap().code, Code::Ok as i32);
        assert!(response.http_response.is_none());
    }

    #[tokio::test]
    async fn test_missing_host() {
        let service = service();
        let response = call(&service, check_request("", &[("authorization", "secretA")])).await;
        assert_unauthorized(&response, "missing host");
    }

    #[tokio::test]
    async fn test_authority_fallback() {
        let service = service();
        let response = call(
            &service,
            check_request("", &[(":authority", "acme.example.com"), ("authorization", "secretA")]),
        )
        .await;
        assert_eq!(response.status.unwrap().code, Code::Ok as i32);
    }

    #[tokio::test]
    async fn test_missing_authorization() {
        let service = service();
        let response = call(&service, check_request("acme.example.com", &[])).await;
        assert_unauthorized(&response, "missing authorization");
    }

    #[tokio::test]
    async fn test_unknown_tenant_same_shape_as_mismatch() {
        let service = service();
        let unknown = call(
            &service,
            check_request("unknown.example.com", &[("authorization", "secretA")]),
        )
        .await;
        let mismatch = call(
            &service,
            check_request("acme.example.com", &[("authorization", "wrong")]),
        )
        .await;

        assert_unauthorized(&unknown, "invalid authorization");
        assert_eq!(unknown, mismatch);
    }

    #[tokio::test]
    async fn test_joined_repeated_header_denies() {
        let service = service();
        let response = call(
            &service,
            check_request("acme.example.com", &[("authorization", "secretA,secretA")]),
        )
        .await;
        assert_unauthorized(&response, "invalid authorization");
    }

    #[tokio::test]
    async fn test_header_order_is_deterministic() {
        let service = service();
        let request = check_request(
            "acme.example.com",
            &[("Authorization", "forged"), ("authorization", "secretA")],
        );
        // Sorted by name: "Authorization" comes first and wins
        for _ in 0..8 {
            let decision = service.evaluate(&request);
            assert_eq!(decision.deny_reason(), Some(DenyReason::InvalidAuthorization));
        }
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let service = service();
        let response = call(&service, CheckRequest::default()).await;
        assert_unauthorized(&response, "invalid request");

        let no_http = CheckRequest {
            attributes: Some(AttributeContext::default()),
            ..Default::default()
        };
        let response = call(&service, no_http).await;
        assert_unauthorized(&response, "invalid request");
    }

    #[test]
    fn test_stats_follow_requests() {
        let service = service();
        tokio_test::block_on(async {
            call(&service, check_request("acme.example.com", &[("authorization", "secretA")])).await;
            call(&service, CheckRequest::default()).await;
        });
        let stats = service.point.stats();
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.denied_invalid_request, 1);
    }
}
