//! Submission identifier generation.

use uuid::Uuid;

use crate::application::ports::IdGenerator;

/// Random identifier source backed by UUID v4.
///
/// Identifiers are 32 lowercase hex characters: URL-safe, collision
/// resistant, and free of ordering, timing or counter information.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomId;

impl RandomId {
    /// Create a new generator.
    pub fn new() -> Self {
        Self
    }
}

impl IdGenerator for RandomId {
    fn next(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_url_safe_hex() {
        let id = RandomId::new().next();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_ids_do_not_repeat() {
        let generator = RandomId::new();
        let ids: HashSet<String> = (0..1000).map(|_| generator.next()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
