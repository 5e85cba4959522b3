// Authenticated session with the platform.
//
// A `Session` is created only by a successful login and never changes
// afterwards. It owns the transport and attaches its token to every call.

use crate::api::{Method, Reply, Transport};
use crate::error::{EngineError, Result};
use serde::Deserialize;
use serde_json::{json, Value};

const LOGIN_PATH: &str = "/authorization/user/manage/login";

/// Identity returned by the login endpoint.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    id: String,
    real_name: String,
    school_name: String,
    access_token: String,
}

/// The authenticated context every other component works through.
pub struct Session<T: Transport> {
    user_id: String,
    display_name: String,
    school_name: String,
    token: String,
    transport: T,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("school_name", &self.school_name)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Authenticate and establish a session.
    ///
    /// Bad credentials surface as `Authentication`; network failures keep
    /// their transport classification so the caller can tell them apart.
    pub fn login(transport: T, username: &str, password: &str) -> Result<Self> {
        let payload = json!({
            "entrance": "1",
            "userName": username,
            "password": password,
        });

        let reply = transport
            .request(Method::Post, LOGIN_PATH, None, Some(&payload))
            .map_err(|err| match err {
                EngineError::Rejected(msg) => EngineError::Authentication(msg),
                other => other,
            })?;
        let data: LoginData = reply.parse("login")?;
        if data.access_token.is_empty() {
            return Err(EngineError::Authentication(
                "Platform returned no access token".to_string(),
            ));
        }

        tracing::info!(user_id = %data.id, school = %data.school_name, "Logged in");
        Ok(Self {
            user_id: data.id,
            display_name: data.real_name,
            school_name: data.school_name,
            token: data.access_token,
            transport,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn school_name(&self) -> &str {
        &self.school_name
    }

    /// Send a request carrying this session's token.
    ///
    /// A 401 from the platform comes back as `SessionExpired`; there is no
    /// automatic refresh.
    pub fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Reply> {
        self.transport
            .request(method, path, Some(&self.token), payload)
    }
}
