use axum::{
    extract::{Form, FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use std::collections::HashMap;

use crate::error::AppError;

/// Text fields of a submitted form.
///
/// Browsers post `FormData` as `multipart/form-data` while plain HTML forms
/// and most clients use `application/x-www-form-urlencoded`; both are
/// accepted. File parts are ignored.
#[derive(Default)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    /// Returns a field's value, treating an empty value as missing.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?;
            return Ok(Self(fields));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?;

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?
        {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?;
            fields.insert(name, value);
        }

        Ok(Self(fields))
    }
}
