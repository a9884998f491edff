use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Coarse failure classes; the HTTP layer maps each to one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Conflict,
    Storage,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content must not be empty")]
    EmptyContent,

    #[error("{0}")]
    Invalid(&'static str),

    #[error("nickname is already taken")]
    NicknameTaken,

    #[error("story not found")]
    StoryNotFound,

    #[error("relay not found")]
    RelayNotFound,

    /// Raised both by append and by turn acquisition on a finished story.
    #[error("story is already finished")]
    StoryFinished,

    #[error("another user is writing the next relay")]
    LockHeldByOther,

    #[error("the writing turn for this story is not yours")]
    NotLockHolder,

    #[error("only the author may do this")]
    NotAuthor,

    #[error("only the last relay of a story can be changed")]
    NotLastRelay,

    #[error("stories can only be liked")]
    UnsupportedReaction,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyContent | Self::Invalid(_) | Self::NicknameTaken | Self::UnsupportedReaction => {
                ErrorKind::Validation
            }
            Self::StoryNotFound | Self::RelayNotFound => ErrorKind::NotFound,
            Self::StoryFinished | Self::NotLockHolder | Self::NotAuthor | Self::NotLastRelay => {
                ErrorKind::Authorization
            }
            Self::LockHeldByOther => ErrorKind::Conflict,
            Self::Sqlite(_) | Self::Poisoned => ErrorKind::Storage,
        }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
