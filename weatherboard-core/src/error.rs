use std::fmt;

use thiserror::Error;

/// Failures a single provider call (or a user-triggered action) can end in.
///
/// No variant is fatal: the worst outcome for the dashboard is that a location's
/// data goes stale until the next successful refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    /// Empty query, forecast day count out of range, or an unknown pinned id.
    #[error("{0}")]
    Input(String),

    /// The provider has no location matching the query.
    #[error("No location found for '{query}'. Please check the name and try again.")]
    NotFound { query: String },

    /// Missing or rejected API key.
    #[error("Weather API rejected the request (status {status}). Check the configured API key.")]
    Unauthorized { status: u16 },

    #[error("Weather API rate limit exceeded. Try again later.")]
    RateLimited,

    #[error("Weather API error: {status}")]
    Server { status: u16 },

    #[error("Failed to fetch weather data: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// The response body did not have the expected shape.
    #[error("Invalid response format: {0}")]
    Malformed(String),
}

/// Copyable discriminant of [`WeatherError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    NotFound,
    Unauthorized,
    RateLimited,
    Server,
    Network,
    Timeout,
    Malformed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WeatherError {
    pub fn input(message: impl Into<String>) -> Self {
        WeatherError::Input(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::Input(_) => ErrorKind::Input,
            WeatherError::NotFound { .. } => ErrorKind::NotFound,
            WeatherError::Unauthorized { .. } => ErrorKind::Unauthorized,
            WeatherError::RateLimited => ErrorKind::RateLimited,
            WeatherError::Server { .. } => ErrorKind::Server,
            WeatherError::Network(_) => ErrorKind::Network,
            WeatherError::Timeout => ErrorKind::Timeout,
            WeatherError::Malformed(_) => ErrorKind::Malformed,
        }
    }

    /// Whether a later manual refresh has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::Server | ErrorKind::Network | ErrorKind::Timeout
        )
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WeatherError::Timeout
        } else if err.is_decode() {
            WeatherError::Malformed(err.to_string())
        } else {
            WeatherError::Network(err.to_string())
        }
    }
}
