use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::traits::InvoiceStore;
use crate::core::AppError;

/// Authenticated account that owns invoices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl FromRequest for Owner {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Owner>()
                .cloned()
                .ok_or_else(|| Error::from(AppError::unauthorized("Missing X-API-Key header"))),
        )
    }
}

/// API Key authentication middleware
///
/// Resolves `X-API-Key` to an [`Owner`] through its SHA-256 hash and stores
/// the owner in the request extensions.
pub struct ApiKeyAuth {
    store: Arc<dyn InvoiceStore>,
}

impl ApiKeyAuth {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service: Rc::new(service),
            store: Arc::clone(&self.store),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: Rc<S>,
    store: Arc<dyn InvoiceStore>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            let api_key = req
                .headers()
                .get("X-API-Key")
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| Error::from(AppError::unauthorized("Missing X-API-Key header")))?;

            let owner = store
                .find_owner_by_key_hash(&hash_api_key(&api_key))
                .await
                .map_err(Error::from)?
                .ok_or_else(|| Error::from(AppError::unauthorized("Invalid API key")))?;

            tracing::debug!(owner_id = %owner.id, "API key accepted");
            req.extensions_mut().insert(owner);

            svc.call(req).await
        })
    }
}

/// Hex SHA-256 of an API key, the form keys are stored in
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}
