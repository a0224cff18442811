use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use super::StorageError;

pub const DEFAULT_PROTOCOL: &str = "workspace";
pub const DEFAULT_STORE: &str = "SpacesStore";

/// Reference to a stored content item, written `protocol://store/id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentRef {
    protocol: String,
    store: String,
    id: String,
}

impl ContentRef {
    pub fn new(
        protocol: impl Into<String>,
        store: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let reference = Self {
            protocol: protocol.into(),
            store: store.into(),
            id: id.into(),
        };

        for (part, value) in [
            ("protocol", &reference.protocol),
            ("store", &reference.store),
            ("id", &reference.id),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidReference(format!("empty {part}")));
            }
            if value.contains('/') || value == "." || value == ".." {
                return Err(StorageError::InvalidReference(format!(
                    "invalid {part} '{value}'"
                )));
            }
        }

        Ok(reference)
    }

    /// Mint a reference with a random id in the default store.
    ///
    /// The extension is kept on the id so hosts without a content-type
    /// attribute can still guess the MIME type from it.
    pub fn generate(extension: Option<&str>) -> Self {
        let id = match extension.map(|ext| ext.trim_start_matches('.')) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
            _ => Uuid::new_v4().to_string(),
        };

        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            store: DEFAULT_STORE.to_string(),
            id,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key of the backing object in the content store
    pub fn object_key(&self) -> String {
        format!("{}/{}/{}", self.protocol, self.store, self.id)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.protocol, self.store, self.id)
    }
}

impl FromStr for ContentRef {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, rest) = s
            .split_once("://")
            .ok_or_else(|| StorageError::InvalidReference(s.to_string()))?;
        let (store, id) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidReference(s.to_string()))?;

        Self::new(protocol, store, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let reference: ContentRef = "workspace://SpacesStore/abc-123".parse().unwrap();
        assert_eq!(reference.protocol(), "workspace");
        assert_eq!(reference.store(), "SpacesStore");
        assert_eq!(reference.id(), "abc-123");
        assert_eq!(reference.to_string(), "workspace://SpacesStore/abc-123");
        assert_eq!(reference.object_key(), "workspace/SpacesStore/abc-123");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("SpacesStore/abc".parse::<ContentRef>().is_err());
        assert!("workspace://SpacesStore".parse::<ContentRef>().is_err());
        assert!("workspace://SpacesStore/".parse::<ContentRef>().is_err());
        assert!("workspace://SpacesStore/a/b".parse::<ContentRef>().is_err());
        assert!("workspace://SpacesStore/..".parse::<ContentRef>().is_err());
    }

    #[test]
    fn test_generate_keeps_extension() {
        let reference = ContentRef::generate(Some(".xls"));
        assert_eq!(reference.store(), DEFAULT_STORE);
        assert!(reference.id().ends_with(".xls"));

        let bare = ContentRef::generate(None);
        assert!(Uuid::parse_str(bare.id()).is_ok());
    }
}
