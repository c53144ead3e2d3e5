use crate::error::RouteError;
use crate::handler::Registration;
use crate::http::{Method, Params};

use std::collections::HashMap;

use matchit::Node;

pub(crate) struct Router {
    routes: HashMap<Method, Node<usize>>,
    registrations: Vec<Registration>,
}

pub(crate) enum Lookup<'a> {
    Found(&'a Registration, Params),
    Redirect(String),
    MethodNotAllowed(String),
    NotFound,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            routes: HashMap::with_capacity(6),
            registrations: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, registration: Registration) -> Result<(), RouteError> {
        let method = registration.method().clone();
        let path = registration.path().to_owned();

        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path.clone(), self.registrations.len())
            .map_err(|source| RouteError::Conflict {
                method: method.clone(),
                path: path.clone(),
                source,
            })?;

        tracing::info!(%method, %path, "inserted route");
        self.registrations.push(registration);
        Ok(())
    }

    pub(crate) fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub(crate) fn at(&self, method: &Method, path: &str) -> Lookup<'_> {
        if let Some(node) = self.routes.get(method) {
            match node.at(path) {
                Ok(matched) => {
                    let params = matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect();

                    return Lookup::Found(&self.registrations[*matched.value], params);
                }
                Err(e) if e.tsr() && *method != Method::CONNECT && path != "/" => {
                    let path = match path.strip_suffix('/') {
                        Some(path) => path.to_owned(),
                        None => format!("{}/", path),
                    };

                    return Lookup::Redirect(path);
                }
                Err(_) => {}
            }
        }

        let allowed = self.allowed(path);
        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed(allowed)
        }
    }

    fn allowed(&self, path: &str) -> String {
        let mut allowed = self
            .routes
            .iter()
            .filter(|(_, node)| node.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect::<Vec<_>>();

        allowed.sort_unstable();
        allowed.join(", ")
    }
}
