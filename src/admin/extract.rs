//! Extractor wrappers that surface the admin envelope's `INVALID_REQUEST`
//! error on malformed input instead of axum's default plain-text rejection
//! (spec §6, §7), the way `server::server::routes` translates every other
//! handler failure through [`super::envelope::ApiError`].

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::admin::envelope::ApiError;
use crate::error::AggregatorError;

pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidatedQuery(value)),
            Err(rejection) => Err(ApiError(AggregatorError::InvalidRequest(rejection.to_string()))),
        }
    }
}

pub struct ValidatedPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ValidatedPath(value)),
            Err(rejection) => Err(ApiError(AggregatorError::InvalidRequest(rejection.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Filter {
        #[allow(dead_code)]
        limit: Option<u32>,
    }

    #[tokio::test]
    async fn bad_path_uuid_maps_to_invalid_request_envelope() {
        let request = Request::builder().uri("/admin/jobs/not-a-uuid").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        parts.uri = "/admin/jobs/not-a-uuid".parse().unwrap();

        let result = ValidatedPath::<uuid::Uuid>::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
