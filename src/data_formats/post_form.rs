use axum::body::Bytes;
use axum::extract::Multipart;
use image::ImageFormat;

use crate::errors::RequestError;
use crate::models::{Group, Post};

pub const REQUIRED_FIELD: &str = "Обязательное поле.";
pub const INVALID_CHOICE: &str =
    "Выберите корректный вариант. Вашего варианта нет среди допустимых значений.";
pub const INVALID_IMAGE: &str = "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением.";

/// Raw values of the post create/edit form, kept as submitted so the form can
/// be shown again with its errors.
#[derive(Debug, Default, Clone)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<Bytes>,
    pub clear_image: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
    pub image: Option<&'static str>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Debug)]
pub struct ValidImage {
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl ValidImage {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

#[derive(Debug)]
pub struct CleanPostForm {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ValidImage>,
    pub clear_image: bool,
}

impl PostForm {
    pub fn from_post(post: &Post) -> Self {
        PostForm {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()),
            ..Default::default()
        }
    }

    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, RequestError> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => form.text = field.text().await?,
                "group" => {
                    let value = field.text().await?;
                    form.group = Some(value).filter(|v| !v.trim().is_empty());
                }
                "image" => {
                    let bytes = field.bytes().await?;
                    // An untouched file input still submits an empty part.
                    form.image = Some(bytes).filter(|b| !b.is_empty());
                }
                "image-clear" => {
                    form.clear_image = !field.text().await?.is_empty();
                }
                _ => {
                    tracing::debug!("Ignoring unexpected form field {}", name);
                }
            }
        }
        Ok(form)
    }

    /// Checks the submitted values against the known `groups`.
    pub async fn clean(&self, groups: &[Group]) -> Result<CleanPostForm, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.text = Some(REQUIRED_FIELD);
        }

        let group_id = match self.group.as_deref() {
            None => None,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.group = Some(INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match &self.image {
            None => None,
            Some(bytes) => match check_image(bytes.clone()).await {
                Ok(format) => Some(ValidImage {
                    format,
                    bytes: bytes.clone(),
                }),
                Err(message) => {
                    errors.image = Some(message);
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(CleanPostForm {
            text,
            group_id,
            image,
            clear_image: self.clear_image,
        })
    }
}

/// Runs [`validate_image`] off the async workers; decoding is CPU bound.
pub async fn check_image(bytes: Bytes) -> Result<ImageFormat, &'static str> {
    tokio::task::spawn_blocking(move || validate_image(&bytes))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Image validation task failed: {}", e);
            Err(INVALID_IMAGE)
        })
}

/// Sniffs the format from the bytes themselves and makes sure they decode.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, &'static str> {
    let format = image::guess_format(bytes).map_err(|_| INVALID_IMAGE)?;
    image::load_from_memory_with_format(bytes, format).map_err(|_| INVALID_IMAGE)?;
    Ok(format)
}
