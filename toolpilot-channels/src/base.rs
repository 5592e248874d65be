//! Shared channel types

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Connection error: {0}")]
    ConnectionError(#[from] reqwest::Error),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Sender allow-list (empty = allow all)
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.trim().trim_start_matches('@').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Check a sender id, which may be compound (`12345|username`)
    pub fn is_allowed(&self, sender_id: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }

        if self.entries.iter().any(|e| e == sender_id) {
            return true;
        }

        sender_id
            .split('|')
            .filter(|part| !part.is_empty())
            .any(|part| self.entries.iter().any(|e| e == part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_allows_everyone() {
        let list = AllowList::new(vec![]);
        assert!(list.is_allowed("user1"));
        assert!(list.is_allowed("12345"));
    }

    #[test]
    fn test_list_matches_plain_and_compound_ids() {
        let list = AllowList::new(vec!["@alice".to_string(), "12345".to_string()]);

        assert!(list.is_allowed("12345"));
        assert!(list.is_allowed("12345|bob"));
        assert!(list.is_allowed("99999|alice"));
        assert!(!list.is_allowed("99999|unknown"));
        assert!(!list.is_allowed("99999"));
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::NotConfigured("telegram".to_string());
        assert_eq!(err.to_string(), "Channel not configured: telegram");
    }
}
