/// Size caps for uploaded content. Request bodies are buffered in memory
/// before hitting the filesystem, so both caps bound per-request memory.
#[derive(Clone, Copy)]
pub struct UploadLimits {
    pub max_blob_size: usize,
    pub max_manifest_size: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_blob_size: 1 << 30,     // 1GB
            max_manifest_size: 4 << 20, // 4MB
        }
    }
}
