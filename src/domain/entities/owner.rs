//! Identity of the caller that owns short URLs.

/// Owner resolved from an API token.
///
/// Inserted into request extensions by the auth middleware and used to scope
/// listing, updates and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner(pub i64);

impl Owner {
    pub fn id(self) -> i64 {
        self.0
    }
}
