use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthKind {
    #[default]
    Bot,
    Bearer,
}

impl AuthKind {
    pub fn prefix(self) -> &'static str {
        match self {
            AuthKind::Bot => "Bot",
            AuthKind::Bearer => "Bearer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "bot" => Some(AuthKind::Bot),
            "bearer" => Some(AuthKind::Bearer),
            _ => None,
        }
    }
}

/// Token plus the kind of Authorization header it goes in.
#[derive(Clone)]
pub struct Credentials {
    kind: AuthKind,
    token: String,
}

impl Credentials {
    pub fn new(kind: AuthKind, token: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
        }
    }

    pub fn bot(token: impl Into<String>) -> Self {
        Self::new(AuthKind::Bot, token)
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(AuthKind::Bearer, token)
    }

    pub fn kind(&self) -> AuthKind {
        self.kind
    }

    /// Raw token, as sent in gateway IDENTIFY and RESUME.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header (e.g. `"Bot xxx"`).
    pub fn header_value(&self) -> String {
        format!("{} {}", self.kind.prefix(), self.token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("token", &"<redacted>")
            .finish()
    }
}
