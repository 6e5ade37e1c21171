//! Login identity shared by every device in a run

use std::fmt;

use secrecy::{ExposeSecret, Secret};

/// Username and secret used to log in to (and elevate on) every device.
///
/// The secret doubles as the enable secret. It is only exposed to the SSH
/// layer at authentication/elevation time and never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::new(secret.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Borrow the secret; callers must not log the returned value
    pub fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
