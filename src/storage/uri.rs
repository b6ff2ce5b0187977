use super::StorageError;

/// A parsed storage locator: `file://…`, `sftp://user@host:port/path`,
/// `webdav://…`, `s3://bucket/key`, `device://…`. The core only ever sees
/// the parsed form; scheme-specific interpretation belongs to whichever
/// [`super::Storage`] implementation claims it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub scheme: String,
    pub authority: Option<String>,
    pub path: String,
    pub options: Vec<(String, String)>,
}

impl StorageUri {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let url = url::Url::parse(raw)
            .map_err(|e| StorageError::Conflict(format!("invalid storage uri {:?}: {}", raw, e)))?;

        let authority = if url.host_str().is_some() || !url.username().is_empty() {
            let user = if url.username().is_empty() {
                String::new()
            } else {
                format!("{}@", url.username())
            };
            let host = url.host_str().unwrap_or_default();
            let port = url
                .port()
                .map(|p| format!(":{}", p))
                .unwrap_or_default();
            Some(format!("{}{}{}", user, host, port))
        } else {
            None
        };

        let options = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            path: url.path().to_string(),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_local_file_uri() {
        let uri = StorageUri::parse("file:///var/lib/barqiv/vault").unwrap();
        assert_eq!(uri.scheme, "file");
        assert_eq!(uri.path, "/var/lib/barqiv/vault");
        assert!(uri.authority.is_none());
    }

    #[test]
    fn parses_a_remote_uri_with_user_host_and_options() {
        let uri = StorageUri::parse("sftp://backup@vault.example.com:2222/archives?timeout=30")
            .unwrap();
        assert_eq!(uri.scheme, "sftp");
        assert_eq!(uri.authority.as_deref(), Some("backup@vault.example.com:2222"));
        assert_eq!(uri.path, "/archives");
        assert_eq!(uri.options, vec![("timeout".to_string(), "30".to_string())]);
    }
}
