use multibuf::{ErrorCode, Status};
use std::{
    borrow::Cow,
    fmt::{Debug, Display},
};

pub enum Error {
    InvalidField(&'static str),
    Io(std::io::Error),
    /// A job came back in an error state.
    JobFailed { slot: usize, status: Status },
    /// Fewer jobs came back than went in.
    Lost { submitted: usize, completed: usize },
    Scheduler(ErrorCode),
    Toml(toml::de::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidField(field) => write!(f, "invalid value for config field `{field}`"),
            Self::Io(e) => Display::fmt(e, f),
            Self::JobFailed { slot, status } => {
                write!(f, "job in slot {slot} finished with status {status:?}")
            }
            Self::Lost {
                submitted,
                completed,
            } => write!(
                f,
                "{submitted} jobs submitted, but only {completed} came back"
            ),
            Self::Scheduler(e) => write!(f, "{e} (error {})", e.code()),
            Self::Toml(e) => write!(f, "could not parse TOML config: {e}"),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

impl From<ErrorCode> for Error {
    fn from(value: ErrorCode) -> Self {
        Self::Scheduler(value)
    }
}

impl From<multibuf::Rejected<'_>> for Error {
    fn from(value: multibuf::Rejected<'_>) -> Self {
        Self::Scheduler(value.error)
    }
}

impl From<multibuf::BurstRejected<'_>> for Error {
    fn from(value: multibuf::BurstRejected<'_>) -> Self {
        Self::Scheduler(value.error)
    }
}

pub struct Context {
    error: Error,
    context: Option<Cow<'static, str>>,
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.error)
        } else {
            Display::fmt(&self.error, f)
        }
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self, f)
    }
}

impl From<Error> for Context {
    fn from(error: Error) -> Self {
        Self {
            error,
            context: None,
        }
    }
}

pub trait ResultExt<T> {
    fn context<C: Into<Cow<'static, str>>>(self, context: C) -> Result<T, Context>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn context<C: Into<Cow<'static, str>>>(self, context: C) -> Result<T, Context> {
        self.map_err(|e| Context {
            error: e.into(),
            context: Some(context.into()),
        })
    }
}
