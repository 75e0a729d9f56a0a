//! Plain object types: values the backend does not persist, but
//! reconstructs on each call to run one of their methods.

use serde::Serialize;

use crate::client::{ServerClient, ServerResponse};
use crate::endpoint;

/// The body of an object method call: the object's own fields, from
/// which the backend rebuilds it, and the method arguments.
#[derive(Debug, Serialize)]
pub struct MethodCall<'a, O: ?Sized, A: ?Sized> {
    #[serde(rename = "__init__")]
    pub init: &'a O,
    #[serde(rename = "__args__")]
    pub args: &'a A,
}

/// A serializable type whose methods run on the backend.
///
/// Usually implemented with `#[derive(ObjectType)]`.
#[allow(async_fn_in_trait)]
pub trait ObjectType: Serialize {
    /// Base path of the type's endpoints, e.g. `point-pair`.
    const ENDPOINT: &'static str;

    /// Invoke `name` on this object.
    async fn call_method<A: Serialize + ?Sized>(
        &self,
        client: &ServerClient,
        name: &str,
        args: &A,
    ) -> ServerResponse {
        let body = MethodCall { init: self, args };
        client
            .post(&endpoint::static_method(Self::ENDPOINT, name), &body, None)
            .await
    }

    async fn call_static<A: Serialize + ?Sized>(
        client: &ServerClient,
        name: &str,
        args: &A,
    ) -> ServerResponse
    where
        Self: Sized,
    {
        client
            .post(&endpoint::static_method(Self::ENDPOINT, name), args, None)
            .await
    }
}
