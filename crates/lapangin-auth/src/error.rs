use jsonwebtoken::errors::Error as JwtError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
    #[error("Token secret too short, need at least {0} bytes")]
    ShortSecret(usize),
}

impl Error {
    pub fn is_expired(&self) -> bool {
        matches!(self, Error::JwtError(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature))
    }
}
