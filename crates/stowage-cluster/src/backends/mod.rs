//! Storage cluster backends

mod filesystem;
mod memory;

pub use filesystem::FilesystemCluster;
pub use memory::MemoryCluster;

use crate::FileId;

/// Allocate a fresh object id in `group`: `<group>/M00/<xx>/<yy>/<name>[.<ext>]`
pub(crate) fn allocate_file_id(group: &str, ext: &str) -> FileId {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut id = format!(
        "{}/M00/{:02X}/{:02X}/{}",
        group,
        bytes[0],
        bytes[1],
        uuid.simple()
    );
    if !ext.is_empty() {
        id.push('.');
        id.push_str(ext);
    }
    FileId::new(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_ids_are_unique_and_grouped() {
        let a = allocate_file_id("group1", "jpg");
        let b = allocate_file_id("group1", "jpg");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("group1/M00/"));
        assert!(a.as_str().ends_with(".jpg"));
        assert!(!allocate_file_id("group1", "").as_str().contains('.'));
    }
}
