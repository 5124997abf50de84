//! Filesystem-backed storage for blobs, upload sessions, manifests, and
//! tags.
//!
//! Layout, per repository, under one storage root:
//!
//! ```text
//! <root>/<name>/_blobs/<uuid>         # in-flight upload session
//! <root>/<name>/_blobs/sha256:<hex>   # finalized blob
//! <root>/<name>/<reference>/manifest.json
//! ```
//!
//! There is no in-memory state: upload-session liveness is the existence
//! of the session file, and finalize is a single rename, so a blob is
//! never observable under its digest name with partial content.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

use crate::model::digest::{Digest, verify_file};
use crate::registry::{RegistryError, RegistryResult};

/// Reserved directory holding blobs and upload sessions within a repository.
pub const BLOBS_DIR: &str = "_blobs";

/// Filename of a stored manifest within its tag directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Filesystem storage rooted at a single directory.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn repo_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn blobs_dir(&self, name: &str) -> PathBuf {
        self.repo_path(name).join(BLOBS_DIR)
    }

    fn blob_path(&self, name: &str, digest: &Digest) -> PathBuf {
        self.blobs_dir(name).join(digest.to_string())
    }

    fn session_path(&self, name: &str, session_id: &str) -> PathBuf {
        self.blobs_dir(name).join(session_id)
    }

    fn manifest_path(&self, name: &str, reference: &str) -> PathBuf {
        self.repo_path(name).join(reference).join(MANIFEST_FILE)
    }

    // Blob operations

    pub async fn blob_exists(&self, name: &str, digest: &Digest) -> RegistryResult<bool> {
        Ok(fs::metadata(self.blob_path(name, digest)).await.is_ok())
    }

    /// Size of a stored blob in bytes.
    pub async fn blob_len(&self, name: &str, digest: &Digest) -> RegistryResult<u64> {
        match fs::metadata(self.blob_path(name, digest)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::BlobUnknown(digest.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_blob(&self, name: &str, digest: &Digest) -> RegistryResult<Vec<u8>> {
        match fs::read(self.blob_path(name, digest)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::BlobUnknown(digest.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a fully-buffered blob under its digest in one step, as used
    /// by the single-POST upload flow. The bytes are verified against the
    /// digest first, then written to a scratch file and renamed into place.
    pub async fn put_blob(&self, name: &str, digest: &Digest, data: &[u8]) -> RegistryResult<()> {
        if !digest.verify(data) {
            return Err(RegistryError::DigestInvalid(digest.to_string()));
        }

        let blobs = self.blobs_dir(name);
        fs::create_dir_all(&blobs).await?;

        let scratch = blobs.join(Uuid::new_v4().to_string());
        fs::write(&scratch, data).await?;
        fs::rename(&scratch, self.blob_path(name, digest)).await?;

        Ok(())
    }

    pub async fn delete_blob(&self, name: &str, digest: &Digest) -> RegistryResult<()> {
        match fs::remove_file(self.blob_path(name, digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::BlobUnknown(digest.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Hard-links a blob from one repository into another. Returns `false`
    /// when the source blob does not exist, in which case the caller falls
    /// back to a regular upload. Source and destination share content from
    /// then on; deleting one side does not affect the other.
    pub async fn mount_blob(&self, from: &str, to: &str, digest: &Digest) -> RegistryResult<bool> {
        let src = self.blob_path(from, digest);
        if fs::metadata(&src).await.is_err() {
            return Ok(false);
        }

        let dst = self.blob_path(to, digest);
        if fs::metadata(&dst).await.is_ok() {
            // already present, mounting is idempotent
            return Ok(true);
        }

        fs::create_dir_all(self.blobs_dir(to)).await?;
        fs::hard_link(&src, &dst).await?;

        Ok(true)
    }

    // Upload sessions

    /// Starts an upload session: ensures the repository's blob directory
    /// exists and hands out a fresh session id. The session file itself is
    /// created by the first write.
    pub async fn create_upload(&self, name: &str) -> RegistryResult<String> {
        fs::create_dir_all(self.blobs_dir(name)).await?;
        Ok(Uuid::new_v4().to_string())
    }

    /// Current size of a session file, or `None` when no bytes have been
    /// written yet (or the session never existed; the two are
    /// indistinguishable by design).
    pub async fn upload_size(&self, name: &str, session_id: &str) -> RegistryResult<Option<u64>> {
        match fs::metadata(self.session_path(name, session_id)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Truncating write at offset 0: the first chunk of a session, sent
    /// without a Content-Range. Returns the new session size.
    pub async fn reset_upload(&self, name: &str, session_id: &str, data: &[u8]) -> RegistryResult<u64> {
        fs::create_dir_all(self.blobs_dir(name)).await?;
        fs::write(self.session_path(name, session_id), data).await?;
        Ok(data.len() as u64)
    }

    /// Positional chunk write. The offset must continue the session
    /// contiguously: a gap past the current size and a rewrite of an
    /// already-present range both answer 416. Returns the new session size.
    pub async fn append_chunk(
        &self,
        name: &str,
        session_id: &str,
        offset: u64,
        data: &[u8],
    ) -> RegistryResult<u64> {
        let path = self.session_path(name, session_id);

        let current = match fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if offset > current {
            return Err(RegistryError::RangeNotSatisfiable);
        }

        if offset + data.len() as u64 <= current {
            // entire range already present: duplicate submission
            return Err(RegistryError::RangeNotSatisfiable);
        }

        fs::create_dir_all(self.blobs_dir(name)).await?;

        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(offset + data.len() as u64)
    }

    /// Appends bytes at the end of the session file, creating it when
    /// missing. Used for the closing PUT, whose body is an optional final
    /// chunk (or, in the monolithic flow, the whole blob).
    pub async fn append_final_chunk(&self, name: &str, session_id: &str, data: &[u8]) -> RegistryResult<()> {
        fs::create_dir_all(self.blobs_dir(name)).await?;

        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.session_path(name, session_id))
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(())
    }

    /// Verifies the session content against the expected digest and, on a
    /// match, renames the session file to its digest name. The rename is
    /// atomic on a single filesystem, so concurrent readers either see the
    /// complete blob or none. On a mismatch the session file is left in
    /// place and the upload may be resumed or retried.
    pub async fn finalize_upload(&self, name: &str, session_id: &str, expected: &Digest) -> RegistryResult<()> {
        let session = self.session_path(name, session_id);

        if fs::metadata(&session).await.is_err() {
            // nothing written: finalizes as the empty blob
            fs::create_dir_all(self.blobs_dir(name)).await?;
            fs::write(&session, b"").await?;
        }

        if !verify_file(&session, expected).await? {
            return Err(RegistryError::DigestInvalid(expected.to_string()));
        }

        fs::rename(&session, self.blob_path(name, expected)).await?;
        log::debug!("finalized upload {session_id} as {expected} in {name}");

        Ok(())
    }

    // Manifest operations

    /// Stores manifest bytes verbatim under `<name>/<reference>/` and
    /// returns their digest.
    pub async fn write_manifest(&self, name: &str, reference: &str, data: &[u8]) -> RegistryResult<Digest> {
        let path = self.manifest_path(name, reference);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        Ok(Digest::of_bytes(data))
    }

    pub async fn read_manifest(&self, name: &str, reference: &str) -> RegistryResult<Vec<u8>> {
        match fs::read(self.manifest_path(name, reference)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RegistryError::ManifestUnknown(reference.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves a manifest digest by scanning the repository's tag
    /// directories and recomputing each manifest's digest. O(tags) per
    /// lookup; returns the first match.
    pub async fn find_manifest_by_digest(&self, name: &str, digest: &Digest) -> RegistryResult<Option<Vec<u8>>> {
        for (_, dir) in self.tag_dirs(name).await? {
            let data = match fs::read(dir.join(MANIFEST_FILE)).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if Digest::of_bytes(&data) == *digest {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    /// Removes a tag directory together with its manifest.
    pub async fn delete_manifest_by_ref(&self, name: &str, reference: &str) -> RegistryResult<()> {
        let dir = self.repo_path(name).join(reference);
        if fs::metadata(dir.join(MANIFEST_FILE)).await.is_err() {
            return Err(RegistryError::ManifestUnknown(reference.to_owned()));
        }
        fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    /// Removes the first tag directory whose manifest matches the digest.
    pub async fn delete_manifest_by_digest(&self, name: &str, digest: &Digest) -> RegistryResult<()> {
        for (_, dir) in self.tag_dirs(name).await? {
            let data = match fs::read(dir.join(MANIFEST_FILE)).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if Digest::of_bytes(&data) == *digest {
                fs::remove_dir_all(&dir).await?;
                return Ok(());
            }
        }
        Err(RegistryError::ManifestUnknown(digest.to_string()))
    }

    /// Lists the repository's tags, lexicographically sorted. A repository
    /// that has never been written to answers `NAME_UNKNOWN`.
    pub async fn list_tags(&self, name: &str) -> RegistryResult<Vec<String>> {
        let mut entries = match fs::read_dir(self.repo_path(name)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RegistryError::NameUnknown(name.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut tags = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if file_name == BLOBS_DIR {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tags.push(file_name.to_string_lossy().into_owned());
            }
        }

        tags.sort();
        Ok(tags)
    }

    /// Walks the storage root and lists every repository, sorted. A
    /// directory counts as a repository when it holds a `_blobs` directory
    /// or at least one tag directory with a manifest.
    pub async fn list_repositories(&self) -> RegistryResult<Vec<String>> {
        let mut repos = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let mut is_repo = false;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                if entry.file_name() == BLOBS_DIR {
                    is_repo = true;
                    continue;
                }

                let child = entry.path();
                if fs::metadata(child.join(MANIFEST_FILE)).await.is_ok() {
                    // tag directory
                    is_repo = true;
                    continue;
                }
                stack.push(child);
            }

            if is_repo && dir != self.root {
                if let Ok(rel) = dir.strip_prefix(&self.root) {
                    let name: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
                    repos.push(name.join("/"));
                }
            }
        }

        repos.sort();
        Ok(repos)
    }

    /// Tag directories of a repository in sorted order, making the "first
    /// match" of digest scans deterministic. A missing repository yields an
    /// empty list; callers decide whether that is an error.
    async fn tag_dirs(&self, name: &str) -> RegistryResult<Vec<(String, PathBuf)>> {
        let mut entries = match fs::read_dir(self.repo_path(name)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if file_name == BLOBS_DIR {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                dirs.push((file_name.to_string_lossy().into_owned(), entry.path()));
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::digest::parse_digest;

    const EMPTY_SHA256: &str = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn scratch() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        (dir, storage)
    }

    #[actix_web::test]
    async fn blob_lifecycle() {
        let (_dir, storage) = scratch();
        let data = b"test data";
        let digest = Digest::of_bytes(data);

        assert!(!storage.blob_exists("lib/app", &digest).await.unwrap());
        assert!(storage.read_blob("lib/app", &digest).await.is_err());

        storage.put_blob("lib/app", &digest, data).await.unwrap();

        assert!(storage.blob_exists("lib/app", &digest).await.unwrap());
        assert_eq!(storage.read_blob("lib/app", &digest).await.unwrap(), data);
        assert_eq!(storage.blob_len("lib/app", &digest).await.unwrap(), data.len() as u64);

        storage.delete_blob("lib/app", &digest).await.unwrap();
        assert!(!storage.blob_exists("lib/app", &digest).await.unwrap());
    }

    #[actix_web::test]
    async fn put_blob_rejects_digest_mismatch() {
        let (_dir, storage) = scratch();
        let wrong = parse_digest(EMPTY_SHA256).unwrap();

        let result = storage.put_blob("lib/app", &wrong, b"not empty").await;
        assert!(matches!(result, Err(RegistryError::DigestInvalid(_))));
        assert!(!storage.blob_exists("lib/app", &wrong).await.unwrap());
    }

    #[actix_web::test]
    async fn finalized_blob_filename_matches_content() {
        let (dir, storage) = scratch();
        let data = b"content addressed";
        let digest = Digest::of_bytes(data);

        let id = storage.create_upload("lib/app").await.unwrap();
        storage.reset_upload("lib/app", &id, data).await.unwrap();
        storage.finalize_upload("lib/app", &id, &digest).await.unwrap();

        let path = dir.path().join("lib/app").join(BLOBS_DIR).join(digest.to_string());
        let on_disk = std::fs::read(&path).expect("blob file");
        assert_eq!(Digest::of_bytes(&on_disk), digest);

        // session file is gone after the rename
        assert_eq!(storage.upload_size("lib/app", &id).await.unwrap(), None);
    }

    #[actix_web::test]
    async fn finalize_mismatch_keeps_session_file() {
        let (_dir, storage) = scratch();
        let wrong = parse_digest(EMPTY_SHA256).unwrap();

        let id = storage.create_upload("lib/app").await.unwrap();
        storage.reset_upload("lib/app", &id, b"some bytes").await.unwrap();

        let result = storage.finalize_upload("lib/app", &id, &wrong).await;
        assert!(matches!(result, Err(RegistryError::DigestInvalid(_))));
        assert_eq!(storage.upload_size("lib/app", &id).await.unwrap(), Some(10));
    }

    #[actix_web::test]
    async fn chunked_write_is_contiguous() {
        let (_dir, storage) = scratch();
        let id = storage.create_upload("lib/app").await.unwrap();

        assert_eq!(storage.reset_upload("lib/app", &id, b"abc").await.unwrap(), 3);
        assert_eq!(storage.append_chunk("lib/app", &id, 3, b"def").await.unwrap(), 6);

        // gap past the current size
        let gap = storage.append_chunk("lib/app", &id, 10, b"xyz").await;
        assert!(matches!(gap, Err(RegistryError::RangeNotSatisfiable)));
        assert_eq!(storage.upload_size("lib/app", &id).await.unwrap(), Some(6));

        // range already present
        let dup = storage.append_chunk("lib/app", &id, 0, b"abc").await;
        assert!(matches!(dup, Err(RegistryError::RangeNotSatisfiable)));

        let digest = Digest::of_bytes(b"abcdef");
        storage.finalize_upload("lib/app", &id, &digest).await.unwrap();
        assert_eq!(storage.read_blob("lib/app", &digest).await.unwrap(), b"abcdef");
    }

    #[actix_web::test]
    async fn empty_upload_finalizes_as_empty_blob() {
        let (_dir, storage) = scratch();
        let empty = parse_digest(EMPTY_SHA256).unwrap();

        let id = storage.create_upload("lib/app").await.unwrap();
        storage.finalize_upload("lib/app", &id, &empty).await.unwrap();
        assert_eq!(storage.read_blob("lib/app", &empty).await.unwrap(), b"");
    }

    #[actix_web::test]
    async fn mount_links_blob_across_repositories() {
        let (_dir, storage) = scratch();
        let data = b"mount me";
        let digest = Digest::of_bytes(data);

        assert!(!storage.mount_blob("src/lib", "dst/lib", &digest).await.unwrap());

        storage.put_blob("src/lib", &digest, data).await.unwrap();
        assert!(storage.mount_blob("src/lib", "dst/lib", &digest).await.unwrap());
        assert_eq!(storage.read_blob("dst/lib", &digest).await.unwrap(), data);

        // deleting one side leaves the other readable
        storage.delete_blob("src/lib", &digest).await.unwrap();
        assert_eq!(storage.read_blob("dst/lib", &digest).await.unwrap(), data);

        // mounting again is a no-op success
        storage.put_blob("src/lib", &digest, data).await.unwrap();
        assert!(storage.mount_blob("src/lib", "dst/lib", &digest).await.unwrap());
    }

    #[actix_web::test]
    async fn manifest_roundtrip_by_tag_and_digest() {
        let (_dir, storage) = scratch();
        let manifest = br#"{"schemaVersion":2}"#;

        let digest = storage.write_manifest("lib/app", "v1", manifest).await.unwrap();
        assert_eq!(digest, Digest::of_bytes(manifest));

        assert_eq!(storage.read_manifest("lib/app", "v1").await.unwrap(), manifest);
        assert_eq!(
            storage.find_manifest_by_digest("lib/app", &digest).await.unwrap(),
            Some(manifest.to_vec())
        );

        let missing = parse_digest(EMPTY_SHA256).unwrap();
        assert_eq!(storage.find_manifest_by_digest("lib/app", &missing).await.unwrap(), None);
    }

    #[actix_web::test]
    async fn manifest_delete_by_ref_and_digest() {
        let (_dir, storage) = scratch();
        let manifest = br#"{"schemaVersion":2}"#;

        storage.write_manifest("lib/app", "v1", manifest).await.unwrap();
        let digest = storage.write_manifest("lib/app", "v2", manifest).await.unwrap();

        storage.delete_manifest_by_ref("lib/app", "v1").await.unwrap();
        assert!(storage.read_manifest("lib/app", "v1").await.is_err());

        storage.delete_manifest_by_digest("lib/app", &digest).await.unwrap();
        assert!(storage.read_manifest("lib/app", "v2").await.is_err());

        let gone = storage.delete_manifest_by_digest("lib/app", &digest).await;
        assert!(matches!(gone, Err(RegistryError::ManifestUnknown(_))));
    }

    #[actix_web::test]
    async fn tags_are_sorted_and_exclude_blobs_dir() {
        let (_dir, storage) = scratch();
        let manifest = br#"{"schemaVersion":2}"#;

        for tag in ["charlie", "alpha", "bravo"] {
            storage.write_manifest("lib/app", tag, manifest).await.unwrap();
        }
        let digest = Digest::of_bytes(b"blob");
        storage.put_blob("lib/app", &digest, b"blob").await.unwrap();

        let tags = storage.list_tags("lib/app").await.unwrap();
        assert_eq!(tags, ["alpha", "bravo", "charlie"]);
    }

    #[actix_web::test]
    async fn list_tags_unknown_repository() {
        let (_dir, storage) = scratch();
        let result = storage.list_tags("no/such").await;
        assert!(matches!(result, Err(RegistryError::NameUnknown(_))));
    }

    #[actix_web::test]
    async fn repositories_listing() {
        let (_dir, storage) = scratch();
        let manifest = br#"{"schemaVersion":2}"#;

        storage.write_manifest("lib/app", "v1", manifest).await.unwrap();
        let digest = Digest::of_bytes(b"blob");
        storage.put_blob("other/thing", &digest, b"blob").await.unwrap();

        let repos = storage.list_repositories().await.unwrap();
        assert_eq!(repos, ["lib/app", "other/thing"]);
    }
}
