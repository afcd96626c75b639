//! Calling backend functions.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::codec::Document;
use crate::error::{Error, InvalidInputError};
use crate::net::{AuthRequest, AuthRequestClient, Body, Method, Request, decode_json};
use crate::routes::ServiceRoutes;

const NAME: &str = "name";
const SERVICE: &str = "service";
const ARGUMENTS: &str = "arguments";

/// Calls functions, either app-wide or scoped to a named service.
#[derive(Clone)]
pub struct ServiceClient {
    requests: Arc<dyn AuthRequestClient>,
    routes: ServiceRoutes,
    service: Option<String>,
}

impl ServiceClient {
    /// Create a client. With a `service` name, calls are dispatched to that
    /// service instead of the app's own functions.
    pub fn new(
        requests: Arc<dyn AuthRequestClient>,
        routes: ServiceRoutes,
        service: Option<String>,
    ) -> Self {
        Self {
            requests,
            routes,
            service,
        }
    }

    /// Returns the service these calls are scoped to.
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Build the request for a function call.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty.
    pub fn function_call_request(&self, name: &str, args: Vec<Value>) -> Result<AuthRequest, Error> {
        if name.is_empty() {
            return Err(InvalidInputError::Request {
                reason: "function name must not be empty".to_string(),
            }
            .into());
        }

        let mut doc = Document::new();
        doc.insert(NAME.into(), Value::from(name));
        if let Some(ref service) = self.service {
            doc.insert(SERVICE.into(), Value::from(service.as_str()));
        }
        doc.insert(ARGUMENTS.into(), Value::Array(args));

        let request = Request::new(
            Method::Post,
            self.routes.function_call_route(),
            Body::Document(doc),
        )?;
        Ok(AuthRequest::new(request))
    }

    /// Call a function and decode its result.
    ///
    /// Arguments are sent as canonical extended JSON; the result is read as
    /// relaxed extended JSON and deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns auth errors when logged out or the session cannot be
    /// recovered, transport errors for backend failures (such as
    /// `FunctionNotFound`), and a decode error if the result does not fit `T`.
    #[instrument(skip(self, args), fields(service = self.service.as_deref()))]
    pub async fn call_function<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        let request = self.function_call_request(name, args)?;
        let response = self.requests.do_authenticated_request(&request).await?;
        debug!("Function returned");
        Ok(decode_json(&response)?)
    }
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("routes", &self.routes)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
