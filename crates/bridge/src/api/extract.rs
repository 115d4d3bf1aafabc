//! Request extractors

use axum::{
    async_trait,
    extract::{Form, FromRequest, Multipart, Request},
    http::header,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

/// Form fields of a Click'n'Load POST. Pages send either
/// `application/x-www-form-urlencoded` or `multipart/form-data`.
#[derive(Debug, Clone, Default)]
pub struct CnlForm(pub HashMap<String, String>);

#[async_trait]
impl<S> FromRequest<S> for CnlForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(CnlForm(fields));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field.text().await.map_err(IntoResponse::into_response)?;
            fields.insert(name, value);
        }

        Ok(CnlForm(fields))
    }
}
