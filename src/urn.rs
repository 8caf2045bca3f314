use std::fmt;

/// Stable, colon-delimited identifier for a crawled entity.
///
/// URNs are plain values: two URNs naming the same entity compare equal as
/// strings, and nothing in the crawler ever parses one back apart. Handlers
/// compose them from the entity type and id (or sha), optionally under a
/// qualifier prefix supplied by the request context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Root URN for a top-level entity: `urn:<type>:<id>`.
    pub fn entity(kind: &str, id: impl fmt::Display) -> Urn {
        Urn(format!("urn:{}:{}", kind, id))
    }

    /// URN of a top-level listing: `urn:<name>` (`urn:orgs`, `urn:users`).
    pub fn root_collection(name: &str) -> Urn {
        Urn(format!("urn:{}", name))
    }

    /// Subordinate entity under this URN: `<self>:<type>:<id>`.
    pub fn child(&self, kind: &str, id: impl fmt::Display) -> Urn {
        Urn(format!("{}:{}:{}", self.0, kind, id))
    }

    /// Child collection under this URN: `<self>:<name>`.
    ///
    /// Pluralization is the caller's choice; handlers pass the form they want.
    pub fn collection(&self, name: &str) -> Urn {
        Urn(format!("{}:{}", self.0, name))
    }

    /// Many-to-many collection under this URN: `<self>:<name>:pages:*`.
    pub fn relation(&self, name: &str) -> Urn {
        Urn(format!("{}:{}:pages:*", self.0, name))
    }

    /// Append lowercased, colon-joined segments to this URN.
    ///
    /// Segment syntax is not validated; callers are trusted.
    pub fn qualified<S: AsRef<str>>(&self, parts: &[S]) -> Urn {
        let mut out = self.0.clone();
        for part in parts {
            out.push(':');
            out.push_str(&part.as_ref().to_lowercase());
        }
        Urn(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Urn {
    fn from(raw: String) -> Urn {
        Urn(raw)
    }
}

impl From<&str> for Urn {
    fn from(raw: &str) -> Urn {
        Urn(raw.to_owned())
    }
}
