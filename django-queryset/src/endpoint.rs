//! URL layout of model and object endpoints.
//!
//! Every endpoint is a `/`-separated list of parts below the owning
//! type's base path, always rendered with a trailing slash: `thing/`,
//! `thing/7/get/`, `thing/thing-method/7/`. Parts other than the base
//! path are percent-encoded, so a primary key holding `/`, `?` or `#`
//! stays one path segment.

use std::fmt::Display;

use heck::ToKebabCase;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    parts: Vec<String>,
}

impl Endpoint {
    pub fn new(base: &str) -> Self {
        Self {
            parts: vec![base.trim_matches('/').to_string()],
        }
    }

    pub fn part<P: Display>(mut self, part: P) -> Self {
        let part = part.to_string();
        self.parts
            .push(utf8_percent_encode(&part, PATH_SEGMENT).to_string());
        self
    }

    /// Append a method or property name, in the dash-separated form
    /// the backend registers it under.
    pub fn action(self, name: &str) -> Self {
        let name = name.to_kebab_case();
        self.part(name)
    }

    pub fn url(&self) -> String {
        let mut url = self
            .parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/");
        url.push('/');
        url
    }
}

pub fn list(base: &str) -> String {
    Endpoint::new(base).url()
}

pub fn create(base: &str) -> String {
    Endpoint::new(base).part("create").url()
}

pub fn get_or_create(base: &str) -> String {
    Endpoint::new(base).part("get-or-create").url()
}

pub fn get<P: Display>(base: &str, pk: P) -> String {
    Endpoint::new(base).part(pk).part("get").url()
}

pub fn update<P: Display>(base: &str, pk: P) -> String {
    Endpoint::new(base).part(pk).part("update").url()
}

pub fn delete<P: Display>(base: &str, pk: P) -> String {
    Endpoint::new(base).part(pk).part("delete").url()
}

pub fn property<P: Display>(base: &str, pk: P, name: &str) -> String {
    Endpoint::new(base).part(pk).action(name).url()
}

pub fn method<P: Display>(base: &str, name: &str, pk: P) -> String {
    Endpoint::new(base).action(name).part(pk).url()
}

pub fn static_method(base: &str, name: &str) -> String {
    Endpoint::new(base).action(name).url()
}
