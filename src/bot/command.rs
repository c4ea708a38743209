/// Scheme a download request (or a per-URL status query) must start with
const URL_SCHEME: &str = "https://";

const STATUS_KEYWORD: &str = "status";
const STATUS_QUERY_PREFIX: &str = "status ";

/// Parsed form of one inbound chat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    StatusOf(String),
    Enqueue { url: String, format: Option<String> },
    Unrecognized,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if text == STATUS_KEYWORD {
            return Command::Status;
        }

        if let Some(url) = text
            .strip_prefix(STATUS_QUERY_PREFIX)
            .map(str::trim_start)
            .filter(|url| url.starts_with(URL_SCHEME))
        {
            return Command::StatusOf(url.to_string());
        }

        if text.starts_with(URL_SCHEME) {
            let mut parts = text.splitn(2, char::is_whitespace);
            let url = parts.next().unwrap_or_default().to_string();
            let format = parts
                .next()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string);
            return Command::Enqueue { url, format };
        }

        Command::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("  status\n"), Command::Status);
    }

    #[test]
    fn test_status_of_url() {
        assert_eq!(
            Command::parse("status https://example.com/watch?v=1"),
            Command::StatusOf("https://example.com/watch?v=1".to_string())
        );
        assert_eq!(Command::parse("statushttps://x"), Command::Unrecognized);
        assert_eq!(Command::parse("status http://x"), Command::Unrecognized);
    }

    #[test]
    fn test_enqueue() {
        assert_eq!(
            Command::parse("https://example.com/v"),
            Command::Enqueue {
                url: "https://example.com/v".to_string(),
                format: None
            }
        );
        assert_eq!(
            Command::parse("https://example.com/v 720"),
            Command::Enqueue {
                url: "https://example.com/v".to_string(),
                format: Some("720".to_string())
            }
        );
        assert_eq!(
            Command::parse("https://example.com/v   bestvideo+bestaudio "),
            Command::Enqueue {
                url: "https://example.com/v".to_string(),
                format: Some("bestvideo+bestaudio".to_string())
            }
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(Command::parse("hello"), Command::Unrecognized);
        assert_eq!(Command::parse("http://insecure.example"), Command::Unrecognized);
        assert_eq!(Command::parse("Status"), Command::Unrecognized);
        assert_eq!(Command::parse(""), Command::Unrecognized);
    }
}
