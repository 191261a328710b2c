// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Token rows are generated app-side with UUIDv7 so they sort by creation
// time. User IDs stay random v4 (PG's gen_random_uuid()) since their order
// carries no meaning and should not leak signup time.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        assert!(b >= a);
    }
}
