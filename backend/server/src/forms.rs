//! Form input and its validation.
//!
//! `clean` methods are pure; uniqueness against the store is checked by
//! the handlers, which add to the same [`FieldErrors`].
use std::{collections::BTreeMap, path::Path};

use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartError},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LENGTH: usize = 128;
pub const MAX_TITLE_LENGTH: usize = 128;
pub const MAX_URL_LENGTH: usize = 200;
pub const MAX_USERNAME_LENGTH: usize = 150;

const PICTURE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Default, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn check_length(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters."),
        );
    }
}

/// Prepends `http://` to scheme-less input and insists on an absolute
/// http(s) URL with a host. The parsed form is returned, so whitespace and
/// control characters never reach the store.
pub fn clean_url(raw: &str) -> Result<String, &'static str> {
    let raw = raw.trim();

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(url.to_string())
        }
        _ => Err("Enter a valid URL."),
    }
}

fn check_url(errors: &mut FieldErrors, field: &'static str, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.add(field, REQUIRED);
        return String::new();
    }

    match clean_url(raw) {
        Ok(url) if url.chars().count() > MAX_URL_LENGTH => {
            errors.add(
                field,
                format!("Ensure this value has at most {MAX_URL_LENGTH} characters."),
            );
            url
        }
        Ok(url) => url,
        Err(message) => {
            errors.add(field, message);
            raw.to_string()
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
}

impl CategoryForm {
    pub fn clean(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = self.name.trim();

        check_length(&mut errors, "name", name, MAX_NAME_LENGTH);

        errors.into_result(name.to_string())
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct PageForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CleanPage {
    pub title: String,
    pub url: String,
}

impl PageForm {
    pub fn clean(&self) -> Result<CleanPage, FieldErrors> {
        let mut errors = FieldErrors::default();
        let title = self.title.trim();

        check_length(&mut errors, "title", title, MAX_TITLE_LENGTH);
        let url = check_url(&mut errors, "url", &self.url);

        errors.into_result(CleanPage {
            title: title.to_string(),
            url,
        })
    }
}

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Lower-cased extension, if it names a supported image type.
    pub fn image_extension(&self) -> Option<String> {
        let extension = Path::new(&self.file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        PICTURE_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }
}

/// User and profile fields, submitted together as `multipart/form-data`.
#[derive(Debug, Default, Serialize)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub website: String,
    #[serde(skip)]
    pub picture: Option<Upload>,
}

#[derive(Debug)]
pub struct CleanRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub website: Option<String>,
    /// Extension and content of the uploaded picture.
    pub picture: Option<(String, Bytes)>,
}

impl RegistrationForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "username" => form.username = field.text().await?,
                "email" => form.email = field.text().await?,
                "password" => form.password = field.text().await?,
                "website" => form.website = field.text().await?,
                "picture" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;

                    // browsers send an empty part when no file was chosen
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.picture = Some(Upload {
                            file_name,
                            content_type,
                            bytes,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    pub fn clean(&self) -> Result<CleanRegistration, FieldErrors> {
        let mut errors = FieldErrors::default();

        let username = self.username.trim();
        check_length(&mut errors, "username", username, MAX_USERNAME_LENGTH);
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let email = self.email.trim();
        if !email.is_empty() {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                errors.add("email", "Enter a valid email address.");
            }
        }

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        let website = if self.website.trim().is_empty() {
            None
        } else {
            Some(check_url(&mut errors, "website", &self.website))
        };

        let picture = match &self.picture {
            None => None,
            Some(upload) => {
                let is_image = upload
                    .content_type
                    .as_deref()
                    .is_none_or(|content_type| content_type.starts_with("image/"));

                match upload.image_extension() {
                    Some(extension) if is_image => Some((extension, upload.bytes.clone())),
                    _ => {
                        errors.add("picture", "Upload a valid image.");
                        None
                    }
                }
            }
        };

        errors.into_result(CleanRegistration {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
            website,
            picture,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
}
