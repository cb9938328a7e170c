use std::{fmt, str::FromStr};

use super::{connection_type::ConnectionType, error::ConnectionError};

const SEPARATOR: char = '#';
const DEFAULT_FILENAME: &str = "default";

/// The parameters needed to establish a Connection.
///
/// A description has a short textual form, `hostname[:port][:TYPE]` (or
/// `filename:PIPE` for named pipes), and a full form listing every field,
/// `TYPE#bandwidth#hostname#interface#port#filename#`, which is what
/// [`Display`](fmt::Display) produces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionDescription {
    pub connection_type: ConnectionType,
    /// Bandwidth in kilobytes per second, 0 if unknown
    pub bandwidth: u32,
    pub hostname: String,
    pub interface: String,
    pub port: u16,
    pub filename: String,
}

impl ConnectionDescription {
    pub fn tcp<S: Into<String>>(hostname: S, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ..Self::default()
        }
    }

    pub fn named_pipe<S: Into<String>>(filename: S) -> Self {
        Self {
            connection_type: ConnectionType::NamedPipe,
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn pipe() -> Self {
        Self {
            connection_type: ConnectionType::Pipe,
            ..Self::default()
        }
    }

    /// Parses either the short or the full textual form
    pub fn parse(text: &str) -> Result<Self, ConnectionError> {
        if !text.contains(SEPARATOR) {
            return Self::parse_short(text);
        }

        let mut fields = text.split(SEPARATOR);
        let description = Self::parse_fields(text, &mut fields)?;
        match (fields.next(), fields.next()) {
            (Some(""), None) | (None, None) => Ok(description),
            _ => Err(invalid(text, "trailing data after description")),
        }
    }

    /// Parses a list written by [`ConnectionDescription::serialize_list`]
    pub fn parse_list(text: &str) -> Result<Vec<Self>, ConnectionError> {
        let mut fields = text.split(SEPARATOR);
        let count: usize = fields
            .next()
            .filter(|count| !count.is_empty())
            .ok_or_else(|| invalid(text, "missing description count"))?
            .parse()
            .map_err(|_| invalid(text, "description count is not a number"))?;

        let mut descriptions = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            descriptions.push(Self::parse_fields(text, &mut fields)?);
        }

        match (fields.next(), fields.next()) {
            (Some(""), None) | (None, None) => Ok(descriptions),
            _ => Err(invalid(text, "trailing data after description list")),
        }
    }

    pub fn serialize_list(descriptions: &[ConnectionDescription]) -> String {
        let mut output = format!("{}{}", descriptions.len(), SEPARATOR);
        for description in descriptions {
            output.push_str(&description.to_string());
        }
        output
    }

    /// The `host:port` string used to connect to this description
    pub fn connect_address(&self) -> String {
        let hostname = if self.hostname.is_empty() {
            "127.0.0.1"
        } else {
            self.hostname.as_str()
        };
        format!("{}:{}", hostname, self.port)
    }

    /// The `host:port` string used to bind a listener for this description
    pub fn listen_address(&self) -> String {
        let hostname = if self.hostname.is_empty() {
            "0.0.0.0"
        } else {
            self.hostname.as_str()
        };
        format!("{}:{}", hostname, self.port)
    }

    fn parse_short(text: &str) -> Result<Self, ConnectionError> {
        let mut description = Self::default();
        let mut tokens = text.split(':');
        description.hostname = tokens.next().unwrap_or_default().to_string();

        for token in tokens {
            if token.starts_with(|c: char| c.is_ascii_digit()) {
                description.port = token
                    .parse()
                    .map_err(|_| invalid(text, "port is not a 16 bit number"))?;
                continue;
            }

            description.connection_type = token.parse().map_err(|_| invalid(text, "unknown connection type"))?;
            if description.connection_type == ConnectionType::NamedPipe {
                description.filename = std::mem::take(&mut description.hostname);
            }
        }

        Ok(description)
    }

    fn parse_fields<'a, I: Iterator<Item = &'a str>>(
        text: &str,
        fields: &mut I,
    ) -> Result<Self, ConnectionError> {
        let mut next = |name: &'static str| fields.next().ok_or_else(|| invalid(text, name));

        let connection_type = next("missing connection type")?
            .parse()
            .map_err(|_| invalid(text, "unknown connection type"))?;
        let bandwidth = next("missing bandwidth")?
            .parse()
            .map_err(|_| invalid(text, "bandwidth is not a number"))?;
        let hostname = next("missing hostname")?.to_string();
        let interface = next("missing interface")?.to_string();
        let port = next("missing port")?
            .parse()
            .map_err(|_| invalid(text, "port is not a 16 bit number"))?;
        let filename = next("missing filename")?.to_string();

        Ok(Self {
            connection_type,
            bandwidth,
            hostname,
            interface,
            port,
            filename,
        })
    }
}

fn invalid(text: &str, reason: &'static str) -> ConnectionError {
    ConnectionError::InvalidDescription {
        description: text.to_string(),
        reason,
    }
}

impl Default for ConnectionDescription {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::TcpIp,
            bandwidth: 0,
            hostname: String::new(),
            interface: String::new(),
            port: 0,
            filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

impl FromStr for ConnectionDescription {
    type Err = ConnectionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for ConnectionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}",
            self.connection_type,
            self.bandwidth,
            self.hostname,
            self.interface,
            self.port,
            self.filename,
            sep = SEPARATOR
        )
    }
}
