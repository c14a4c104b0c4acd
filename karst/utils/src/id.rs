//! Globally interned identifiers.
use std::cmp::Ordering;
use std::fmt;

/// A globally interned symbol.
pub type GSym = symbol_table::GlobalSymbol;

/// Represents an identifier in a karst model: the name of a variable, port,
/// configurable, bank, action or solver symbol.
///
/// Identifiers are cheap to copy and compare. Two identifiers constructed
/// from the same string are always equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    pub id: GSym,
}

impl Id {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self {
            id: GSym::new(id.as_ref()),
        }
    }

    /// The string backing this identifier.
    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }
}

/// Identifiers order by their text so that sorted collections of names are
/// stable across runs.
impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/* =================== Impls for Id to make them easier to use ============== */

impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> Id;
}
