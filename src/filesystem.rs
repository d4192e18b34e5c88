use std::io::{Cursor, Read};

use tracing::{error, info, span, Level};

use crate::{
    fs,
    model::fs::{
        Config, EntryKind, FSError, FileInfo, ListingEntry, Visibility, CONFIG_CONTENT_TYPE,
    },
    util,
};

/// Hierarchical filesystem operations over flat storage.
///
/// Lookups that hit a missing object return `Ok(None)` or `Ok(false)`
/// instead of an error. `create_dir`, `set_visibility` and the delete step of
/// `delete_dir` report any storage failure as `None` or `false`; everything
/// else propagates.
pub trait Filesystem {
    fn has(&self, path: &str) -> Result<bool, FSError>;

    fn read(&self, path: &str) -> Result<Option<FileInfo>, FSError>;

    fn read_stream(&self, path: &str) -> Result<Option<Cursor<Vec<u8>>>, FSError> {
        Ok(self
            .read(path)?
            .map(|file| Cursor::new(file.contents.unwrap_or_default())))
    }

    fn list_contents(&self, directory: &str, recursive: bool)
        -> Result<Vec<ListingEntry>, FSError>;

    fn get_metadata(&self, path: &str) -> Result<Option<FileInfo>, FSError>;

    fn get_size(&self, path: &str) -> Result<Option<FileInfo>, FSError> {
        self.get_metadata(path)
    }

    fn get_mimetype(&self, path: &str) -> Result<Option<FileInfo>, FSError> {
        self.get_metadata(path)
    }

    fn get_timestamp(&self, path: &str) -> Result<Option<FileInfo>, FSError> {
        self.get_metadata(path)
    }

    fn write(&self, path: &str, contents: &[u8], config: &Config) -> Result<FileInfo, FSError>;

    fn write_stream(
        &self,
        path: &str,
        resource: &mut dyn Read,
        config: &Config,
    ) -> Result<FileInfo, FSError> {
        let mut contents = Vec::new();
        resource.read_to_end(&mut contents)?;

        self.write(path, &contents, config)
    }

    /// Unconditional overwrite, same as `write`.
    fn update(&self, path: &str, contents: &[u8], config: &Config) -> Result<FileInfo, FSError> {
        self.write(path, contents, config)
    }

    fn update_stream(
        &self,
        path: &str,
        resource: &mut dyn Read,
        config: &Config,
    ) -> Result<FileInfo, FSError> {
        self.write_stream(path, resource, config)
    }

    /// Copy followed by delete. Not atomic: when the delete fails both paths
    /// exist and the delete error is returned.
    fn rename(&self, path: &str, newpath: &str) -> Result<bool, FSError>;

    fn copy(&self, path: &str, newpath: &str) -> Result<bool, FSError>;

    fn delete(&self, path: &str) -> Result<bool, FSError>;

    fn delete_dir(&self, dirname: &str) -> Result<bool, FSError>;

    fn create_dir(&self, dirname: &str, config: &Config) -> Option<FileInfo>;

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Option<Visibility>;

    fn get_visibility(&self, path: &str) -> Result<Option<Visibility>, FSError>;
}

impl Filesystem for fs::ObjectFS {
    fn has(&self, path: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "has", context = "has");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.apply_prefix(path);
        let found = self
            .handle_request(|| self.client().head_object(self.bucket(), &key, self.options()))
            .inspect_err(|err| error!(error_message=%err, error_group="head_object"))?;

        Ok(found.is_some())
    }

    fn read(&self, path: &str) -> Result<Option<FileInfo>, FSError> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.apply_prefix(path);
        let body = self
            .handle_request(|| self.client().get_object(self.bucket(), &key, self.options()))
            .inspect_err(|err| error!(error_message=%err, error_group="get_object"))?;

        Ok(body.map(|body| self.transform_file(body.head, path, Some(body.bytes))))
    }

    fn list_contents(
        &self,
        directory: &str,
        recursive: bool,
    ) -> Result<Vec<ListingEntry>, FSError> {
        let span = span!(Level::INFO, "list_contents", context = "list_contents");
        let _e = span.enter();
        info!(directory = directory, recursive = recursive, "called");

        let query = self.list_contents_query(directory, recursive);
        let mut contents = Vec::new();

        self.list_pages(query, |page| {
            contents.extend(self.transform_contents(page.objects));
            contents.extend(self.transform_directories(page.common_prefixes));
        })
        .inspect_err(|err| error!(error_message=%err, error_group="list_objects"))?;

        Ok(contents)
    }

    fn get_metadata(&self, path: &str) -> Result<Option<FileInfo>, FSError> {
        let span = span!(Level::INFO, "get_metadata", context = "get_metadata");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.apply_prefix(path);
        let head = self
            .handle_request(|| {
                self.client()
                    .get_object_meta(self.bucket(), &key, self.options())
            })
            .inspect_err(|err| error!(error_message=%err, error_group="get_object_meta"))?;

        Ok(head.map(|head| self.transform_file(head, path, None)))
    }

    fn write(&self, path: &str, contents: &[u8], config: &Config) -> Result<FileInfo, FSError> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();
        info!(path = path, size = contents.len(), "called");

        let key = self.apply_prefix(path).trim_end_matches('/').to_string();
        let options = self.write_options(config);

        self.client()
            .put_object(self.bucket(), &key, contents.to_vec(), &options)
            .inspect_err(|err| error!(error_message=%err, error_group="put_object"))?;

        Ok(FileInfo {
            kind: EntryKind::File,
            path: path.to_string(),
            contents: None,
            timestamp: None,
            size: Some(contents.len() as u64),
            mimetype: config.get(CONFIG_CONTENT_TYPE).map(str::to_string),
        })
    }

    fn rename(&self, path: &str, newpath: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "rename", context = "rename");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        self.copy(path, newpath)?;
        self.delete(path)?;

        Ok(true)
    }

    fn copy(&self, path: &str, newpath: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        let from = self.apply_prefix(path);
        let to = self.apply_prefix(newpath);

        self.client()
            .copy_object(self.bucket(), &from, &to, self.options())
            .inspect_err(|err| error!(error_message=%err, error_group="copy_object"))?;

        Ok(true)
    }

    fn delete(&self, path: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.apply_prefix(path);

        self.client()
            .delete_object(self.bucket(), &key, self.options())
            .inspect_err(|err| error!(error_message=%err, error_group="delete_object"))?;

        Ok(true)
    }

    fn delete_dir(&self, dirname: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "delete_dir", context = "delete_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let dirname = util::path::normalize_dir(dirname);
        let mut keys = Vec::new();

        self.list_pages(self.list_contents_query(&dirname, true), |page| {
            keys.extend(page.objects.into_iter().map(|object| object.key));
        })
        .inspect_err(|err| error!(error_message=%err, error_group="list_objects"))?;

        if keys.is_empty() {
            return Ok(true);
        }

        match self
            .client()
            .delete_multiple_objects(self.bucket(), &keys, self.options())
        {
            Err(err) => {
                error!(error_message=%err, error_group="delete_multiple_objects", count=keys.len());
                Ok(false)
            }
            Ok(()) => Ok(true),
        }
    }

    fn create_dir(&self, dirname: &str, _config: &Config) -> Option<FileInfo> {
        let span = span!(Level::INFO, "create_dir", context = "create_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let key = format!("{}/", self.apply_prefix(dirname).trim_end_matches('/'));

        if let Err(err) = self
            .client()
            .put_object(self.bucket(), &key, Vec::new(), self.options())
        {
            error!(error_message=%err, error_group="put_object", key=%key);
            return None;
        }

        Some(FileInfo {
            kind: EntryKind::Dir,
            path: self.remove_prefix(&key),
            contents: None,
            timestamp: None,
            size: None,
            mimetype: None,
        })
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Option<Visibility> {
        let span = span!(Level::INFO, "set_visibility", context = "set_visibility");
        let _e = span.enter();
        info!(path = path, visibility = %visibility, "called");

        let key = self.apply_prefix(path);

        match self
            .client()
            .put_object_acl(self.bucket(), &key, visibility.to_acl(), self.options())
        {
            Err(err) => {
                error!(error_message=%err, error_group="put_object_acl", key=%key);
                None
            }
            Ok(_) => Some(visibility),
        }
    }

    fn get_visibility(&self, path: &str) -> Result<Option<Visibility>, FSError> {
        let span = span!(Level::INFO, "get_visibility", context = "get_visibility");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.apply_prefix(path);
        let acl = self
            .handle_request(|| self.client().get_object_acl(self.bucket(), &key, self.options()))
            .inspect_err(|err| error!(error_message=%err, error_group="get_object_acl"))?;

        match acl {
            None => Ok(None),
            Some(acl) => Visibility::from_acl(&acl)
                .map(Some)
                .inspect_err(|err| error!(error_message=%err, error_group="acl_mapping")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashSet, VecDeque},
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        adapters::{
            mock::{MemoryClient, Operation},
            ObjectTransport,
        },
        model::oss::{
            ListPage, ListQuery, ObjectBody, ObjectHead, ObjectSummary, Options, TransportError,
        },
    };

    const BUCKET: &str = "dummy-bucket";

    fn new_fs(prefix: &str) -> (Arc<MemoryClient>, fs::ObjectFS) {
        new_fs_paged(prefix, 1000)
    }

    fn new_fs_paged(prefix: &str, page_size: usize) -> (Arc<MemoryClient>, fs::ObjectFS) {
        let client = Arc::new(MemoryClient::with_page_size(page_size));
        let fs = fs::ObjectFS::new(client.clone(), BUCKET, prefix, Options::new());
        (client, fs)
    }

    fn seed(fs: &fs::ObjectFS, paths: &[&str]) {
        for path in paths {
            if path.ends_with('/') {
                assert!(fs.create_dir(path, &Config::new()).is_some());
            } else {
                fs.write(path, path.as_bytes(), &Config::new()).unwrap();
            }
        }
    }

    fn paths(entries: &[ListingEntry]) -> Vec<(EntryKind, String)> {
        let mut paths: Vec<(EntryKind, String)> = entries
            .iter()
            .map(|e| (e.kind, e.path.clone()))
            .collect();
        paths.sort_by(|a, b| a.1.cmp(&b.1));
        paths
    }

    /// Serves list pages from a script and records the marker of every request.
    struct ScriptedClient {
        pages: Mutex<VecDeque<ListPage>>,
        markers: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedClient {
        fn new(pages: Vec<ListPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                markers: Mutex::new(Vec::new()),
            }
        }
    }

    fn unsupported() -> TransportError {
        TransportError::new(Some(501), "unsupported")
    }

    impl ObjectTransport for ScriptedClient {
        fn head_object(&self, _: &str, _: &str, _: &Options) -> Result<ObjectHead, TransportError> {
            Err(unsupported())
        }

        fn get_object(&self, _: &str, _: &str, _: &Options) -> Result<ObjectBody, TransportError> {
            Err(unsupported())
        }

        fn get_object_meta(
            &self,
            _: &str,
            _: &str,
            _: &Options,
        ) -> Result<ObjectHead, TransportError> {
            Err(unsupported())
        }

        fn put_object(
            &self,
            _: &str,
            _: &str,
            _: Vec<u8>,
            _: &Options,
        ) -> Result<(), TransportError> {
            Err(unsupported())
        }

        fn copy_object(&self, _: &str, _: &str, _: &str, _: &Options) -> Result<(), TransportError> {
            Err(unsupported())
        }

        fn delete_object(&self, _: &str, _: &str, _: &Options) -> Result<(), TransportError> {
            Err(unsupported())
        }

        fn delete_multiple_objects(
            &self,
            _: &str,
            _: &[String],
            _: &Options,
        ) -> Result<(), TransportError> {
            Err(unsupported())
        }

        fn list_objects(
            &self,
            _: &str,
            query: &ListQuery,
            _: &Options,
        ) -> Result<ListPage, TransportError> {
            self.markers.lock().unwrap().push(query.marker.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::new(Some(500), "script exhausted"))
        }

        fn get_object_acl(&self, _: &str, _: &str, _: &Options) -> Result<String, TransportError> {
            Err(unsupported())
        }

        fn put_object_acl(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &Options,
        ) -> Result<(), TransportError> {
            Err(unsupported())
        }
    }

    fn summary(key: &str) -> ObjectSummary {
        ObjectSummary {
            key: key.to_string(),
            size: Some(1),
            last_modified: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_has() {
        let (client, fs) = new_fs("");
        seed(&fs, &["a.txt"]);

        assert!(fs.has("a.txt").unwrap());
        assert!(!fs.has("missing.txt").unwrap());

        client.fail_on(Operation::Head, Some("a.txt"), 403);
        let err = fs.has("a.txt").unwrap_err();
        assert!(matches!(
            err,
            FSError::Transport(TransportError {
                status: Some(403),
                ..
            })
        ));

        client.clear_faults();
        client.fail_on(Operation::Head, None, 500);
        assert!(fs.has("missing.txt").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let (_client, fs) = new_fs("uploads");

        let cases: Vec<(&str, &[u8])> = vec![
            ("a.txt", b"hello"),
            ("dir/b.bin", &[0, 1, 2, 255]),
            ("empty", b""),
        ];

        for (path, contents) in cases {
            let info = fs.write(path, contents, &Config::new()).unwrap();
            assert_eq!(info.path, path, "failed for case: {}", path);
            assert_eq!(info.size, Some(contents.len() as u64), "failed for case: {}", path);

            let file = fs.read(path).unwrap().unwrap();
            assert_eq!(file.kind, EntryKind::File, "failed for case: {}", path);
            assert_eq!(file.path, path, "failed for case: {}", path);
            assert_eq!(file.contents.as_deref(), Some(contents), "failed for case: {}", path);
            assert_eq!(file.size, Some(contents.len() as u64), "failed for case: {}", path);
            assert!(file.timestamp.is_some(), "failed for case: {}", path);
        }
    }

    #[test]
    fn test_read_missing_is_none() {
        let (client, fs) = new_fs("");

        assert_eq!(fs.read("missing").unwrap(), None);

        client.fail_on(Operation::Get, None, 403);
        assert!(fs.read("missing").is_err());
    }

    #[test]
    fn test_write_uses_prefixed_key() {
        let (client, fs) = new_fs("uploads");

        fs.write("/dir/a.txt/", b"x", &Config::new()).unwrap();

        assert_eq!(client.keys(BUCKET), vec!["uploads/dir/a.txt"]);
    }

    #[test]
    fn test_write_content_type() {
        let (_client, fs) = new_fs("");
        let config = Config::new().with(CONFIG_CONTENT_TYPE, "text/plain");

        let info = fs.write("a.txt", b"hello", &config).unwrap();
        assert_eq!(info.mimetype.as_deref(), Some("text/plain"));

        let meta = fs.get_metadata("a.txt").unwrap().unwrap();
        assert_eq!(meta.mimetype.as_deref(), Some("text/plain"));

        fs.write("b.txt", b"hello", &Config::new()).unwrap();
        let meta = fs.get_metadata("b.txt").unwrap().unwrap();
        assert_eq!(meta.mimetype, None);
        assert!(fs.options().is_empty());
    }

    #[test]
    fn test_update_overwrites() {
        let (_client, fs) = new_fs("");

        fs.write("a.txt", b"first", &Config::new()).unwrap();
        fs.update("a.txt", b"second", &Config::new()).unwrap();

        let file = fs.read("a.txt").unwrap().unwrap();
        assert_eq!(file.contents.as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn test_streams() {
        let (_client, fs) = new_fs("");

        let mut source = Cursor::new(b"streamed".to_vec());
        fs.write_stream("s.txt", &mut source, &Config::new()).unwrap();

        let mut reader = fs.read_stream("s.txt").unwrap().unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "streamed");

        let mut source = Cursor::new(b"again".to_vec());
        fs.update_stream("s.txt", &mut source, &Config::new()).unwrap();
        let file = fs.read("s.txt").unwrap().unwrap();
        assert_eq!(file.contents.as_deref(), Some(&b"again"[..]));

        assert!(fs.read_stream("missing").unwrap().is_none());
    }

    #[test]
    fn test_metadata_aliases_agree() {
        let (_client, fs) = new_fs("");
        let config = Config::new().with(CONFIG_CONTENT_TYPE, "application/json");
        fs.write("a.json", b"{}", &config).unwrap();

        let meta = fs.get_metadata("a.json").unwrap().unwrap();
        assert_eq!(meta.contents, None);
        assert_eq!(meta.size, Some(2));

        assert_eq!(fs.get_size("a.json").unwrap().unwrap(), meta);
        assert_eq!(fs.get_mimetype("a.json").unwrap().unwrap(), meta);
        assert_eq!(fs.get_timestamp("a.json").unwrap().unwrap(), meta);

        assert_eq!(fs.get_metadata("missing").unwrap(), None);
        assert_eq!(fs.get_size("missing").unwrap(), None);
    }

    #[test]
    fn test_list_contents_shallow() {
        let (_client, fs) = new_fs("uploads");
        seed(
            &fs,
            &[
                "a.txt",
                "b.txt",
                "photos/",
                "photos/1.jpg",
                "photos/2019/2.jpg",
                "docs/readme.md",
            ],
        );

        let entries = fs.list_contents("", false).unwrap();

        assert_eq!(
            paths(&entries),
            vec![
                (EntryKind::File, "a.txt".to_string()),
                (EntryKind::File, "b.txt".to_string()),
                (EntryKind::Dir, "docs/".to_string()),
                (EntryKind::Dir, "photos/".to_string()),
            ]
        );

        let entries = fs.list_contents("photos", false).unwrap();

        assert_eq!(
            paths(&entries),
            vec![
                (EntryKind::Dir, "photos/".to_string()),
                (EntryKind::File, "photos/1.jpg".to_string()),
                (EntryKind::Dir, "photos/2019/".to_string()),
            ]
        );
    }

    #[test]
    fn test_list_contents_recursive() {
        let (_client, fs) = new_fs("");
        seed(
            &fs,
            &["a.txt", "photos/", "photos/1.jpg", "photos/2019/2.jpg", "photos/2019/12/3.jpg"],
        );

        let entries = fs.list_contents("photos/", true).unwrap();

        assert_eq!(
            paths(&entries),
            vec![
                (EntryKind::Dir, "photos/".to_string()),
                (EntryKind::File, "photos/1.jpg".to_string()),
                (EntryKind::File, "photos/2019/12/3.jpg".to_string()),
                (EntryKind::File, "photos/2019/2.jpg".to_string()),
            ]
        );
        assert!(entries.iter().all(|e| e.timestamp.is_some()));
    }

    #[test]
    fn test_list_contents_follows_markers() {
        let client = Arc::new(ScriptedClient::new(vec![
            ListPage {
                objects: vec![summary("a"), summary("b")],
                common_prefixes: vec!["c/".to_string()],
                next_marker: Some("c/".to_string()),
            },
            ListPage {
                objects: vec![],
                common_prefixes: vec![],
                next_marker: Some("d".to_string()),
            },
            ListPage {
                objects: vec![summary("e"), summary("f/")],
                common_prefixes: vec!["g/".to_string()],
                next_marker: None,
            },
            ListPage {
                objects: vec![summary("never")],
                common_prefixes: vec![],
                next_marker: None,
            },
        ]));
        let fs = fs::ObjectFS::new(client.clone(), BUCKET, "", Options::new());

        let entries = fs.list_contents("", false).unwrap();

        assert_eq!(
            paths(&entries),
            vec![
                (EntryKind::File, "a".to_string()),
                (EntryKind::File, "b".to_string()),
                (EntryKind::Dir, "c/".to_string()),
                (EntryKind::File, "e".to_string()),
                (EntryKind::Dir, "f/".to_string()),
                (EntryKind::Dir, "g/".to_string()),
            ]
        );
        assert_eq!(
            *client.markers.lock().unwrap(),
            vec![None, Some("c/".to_string()), Some("d".to_string())]
        );
        assert_eq!(client.pages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_list_contents_pages_without_loss() {
        let (client, fs) = new_fs_paged("", 3);
        let mut expected = Vec::new();
        for i in 0..10 {
            let path = format!("dir/file-{:02}", i);
            fs.write(&path, b"x", &Config::new()).unwrap();
            expected.push((EntryKind::File, path));
        }

        let entries = fs.list_contents("dir", true).unwrap();

        assert_eq!(paths(&entries), expected);
        let unique: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(unique.len(), entries.len());
        assert_eq!(client.list_markers().len(), 4);
    }

    #[test]
    fn test_list_contents_propagates_errors() {
        let (client, fs) = new_fs("");
        client.fail_on(Operation::List, None, 403);

        assert!(fs.list_contents("", false).is_err());
    }

    #[test]
    fn test_copy_and_delete() {
        let (_client, fs) = new_fs("uploads");
        seed(&fs, &["a.txt"]);

        assert!(fs.copy("a.txt", "b.txt").unwrap());
        assert!(fs.has("a.txt").unwrap());
        let copied = fs.read("b.txt").unwrap().unwrap();
        assert_eq!(copied.contents.as_deref(), Some(&b"a.txt"[..]));

        assert!(fs.delete("a.txt").unwrap());
        assert!(!fs.has("a.txt").unwrap());

        assert!(fs.copy("missing", "c.txt").is_err());
    }

    #[test]
    fn test_rename() {
        let (_client, fs) = new_fs("");
        seed(&fs, &["a.txt"]);

        assert!(fs.rename("a.txt", "b.txt").unwrap());

        assert!(!fs.has("a.txt").unwrap());
        assert!(fs.has("b.txt").unwrap());
    }

    #[test]
    fn test_rename_is_not_atomic() {
        let (client, fs) = new_fs("");
        seed(&fs, &["a.txt"]);
        client.fail_on(Operation::Delete, Some("a.txt"), 500);

        let result = fs.rename("a.txt", "b.txt");

        // The copy landed before the delete failed, so both objects remain.
        assert!(result.is_err());
        assert!(fs.has("a.txt").unwrap());
        assert!(fs.has("b.txt").unwrap());
    }

    #[test]
    fn test_delete_dir_purges_descendants() {
        let (client, fs) = new_fs("uploads");
        seed(
            &fs,
            &["photos/", "photos/1.jpg", "photos/2019/2.jpg", "photosx.txt", "a.txt"],
        );

        assert!(fs.delete_dir("photos").unwrap());

        assert_eq!(client.keys(BUCKET), vec!["uploads/a.txt", "uploads/photosx.txt"]);
    }

    #[test]
    fn test_delete_dir_deletes_listed_keys() {
        let cases = vec![
            (
                "uploads",
                vec!["uploads/photos//x.jpg", "uploads//y.jpg", "other.txt"],
                vec!["other.txt"],
            ),
            ("", vec!["/foo", "//bar/baz"], vec![]),
        ];

        for (prefix, keys, expected) in cases {
            let (client, fs) = new_fs(prefix);
            for key in &keys {
                client
                    .put_object(BUCKET, key, Vec::new(), &Options::new())
                    .unwrap();
            }

            assert!(fs.delete_dir("").unwrap(), "failed for case: {}", prefix);
            assert_eq!(client.keys(BUCKET), expected, "failed for case: {}", prefix);
        }
    }

    #[test]
    fn test_delete_dir_empty() {
        let (_client, fs) = new_fs("");

        assert!(fs.delete_dir("nothing/here").unwrap());
    }

    #[test]
    fn test_delete_dir_failure_is_false() {
        let (client, fs) = new_fs("");
        seed(&fs, &["photos/1.jpg", "photos/2.jpg"]);
        client.fail_on(Operation::DeleteMultiple, None, 403);

        assert!(!fs.delete_dir("photos").unwrap());
        assert_eq!(client.keys(BUCKET).len(), 2);

        client.clear_faults();
        client.fail_on(Operation::List, None, 500);
        assert!(fs.delete_dir("photos").is_err());
    }

    #[test]
    fn test_create_dir() {
        let (client, fs) = new_fs("uploads");

        let cases = vec![("photos", "photos/"), ("docs/", "docs/"), ("a/b//", "a/b/")];

        for (dirname, expected) in cases {
            let info = fs.create_dir(dirname, &Config::new()).unwrap();
            assert_eq!(info.kind, EntryKind::Dir, "failed for case: {}", dirname);
            assert_eq!(info.path, expected, "failed for case: {}", dirname);
            assert!(
                client.keys(BUCKET).contains(&format!("uploads/{}", expected)),
                "failed for case: {}",
                dirname
            );
        }

        let meta = fs.get_metadata("photos/").unwrap().unwrap();
        assert_eq!(meta.size, Some(0));
    }

    #[test]
    fn test_create_dir_failure_is_none() {
        let (client, fs) = new_fs("");
        client.fail_on(Operation::Put, None, 403);

        assert!(fs.create_dir("photos", &Config::new()).is_none());
        assert!(client.keys(BUCKET).is_empty());
    }

    fn header_options(pairs: &[(&str, &str)]) -> Options {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_options_reach_every_call() {
        let client = Arc::new(MemoryClient::new());
        let options = header_options(&[
            ("x-oss-object-acl", "public-read"),
            ("Cache-Control", "no-cache"),
        ]);
        let fs = fs::ObjectFS::new(client.clone(), BUCKET, "uploads", options.clone());

        let dir = fs.create_dir("photos", &Config::new()).unwrap();
        assert_eq!(fs.get_visibility(&dir.path).unwrap(), Some(Visibility::Public));

        fs.write("photos/a.txt", b"a", &Config::new()).unwrap();
        assert!(fs.has("photos/a.txt").unwrap());
        assert!(fs.read("photos/a.txt").unwrap().is_some());
        assert!(fs.get_metadata("photos/a.txt").unwrap().is_some());
        assert_eq!(fs.list_contents("", false).unwrap().len(), 1);
        assert!(fs.copy("photos/a.txt", "b.txt").unwrap());
        assert_eq!(fs.set_visibility("b.txt", Visibility::Private), Some(Visibility::Private));
        assert!(fs.rename("b.txt", "c.txt").unwrap());
        assert!(fs.delete("c.txt").unwrap());
        assert!(fs.delete_dir("photos").unwrap());

        let calls = client.recorded_options();
        let operations: HashSet<Operation> = calls.iter().map(|(op, _)| *op).collect();
        assert_eq!(operations.len(), 10);

        for (operation, forwarded) in calls {
            assert_eq!(forwarded, options, "failed for case: {:?}", operation);
        }
    }

    #[test]
    fn test_set_options_applies_to_next_call() {
        let (client, mut fs) = new_fs("");

        assert!(fs.create_dir("private", &Config::new()).is_some());
        assert_eq!(fs.get_visibility("private/").unwrap(), Some(Visibility::Private));

        let options = header_options(&[("x-oss-object-acl", "public-read")]);
        fs.set_options(options.clone());
        assert!(fs.create_dir("public", &Config::new()).is_some());
        assert_eq!(fs.get_visibility("public/").unwrap(), Some(Visibility::Public));

        let last = client.recorded_options().pop().map(|(_, forwarded)| forwarded);
        assert_eq!(last, Some(options));
    }

    #[test]
    fn test_visibility_roundtrip() {
        let (_client, fs) = new_fs("uploads");
        seed(&fs, &["a.txt"]);

        let cases = vec![Visibility::Public, Visibility::Private, Visibility::Public];

        for visibility in cases {
            assert_eq!(fs.set_visibility("a.txt", visibility), Some(visibility));
            assert_eq!(
                fs.get_visibility("a.txt").unwrap(),
                Some(visibility),
                "failed for case: {}",
                visibility
            );
        }
    }

    #[test]
    fn test_visibility_public_encodings() {
        let (client, fs) = new_fs("");
        seed(&fs, &["a.txt"]);

        let cases = vec![
            ("public-read", Visibility::Public),
            ("public-read-write", Visibility::Public),
            ("private", Visibility::Private),
        ];

        for (acl, expected) in cases {
            client.set_acl(BUCKET, "a.txt", acl).unwrap();
            assert_eq!(
                fs.get_visibility("a.txt").unwrap(),
                Some(expected),
                "failed for case: {}",
                acl
            );
        }

        client.set_acl(BUCKET, "a.txt", "default").unwrap();
        assert!(matches!(
            fs.get_visibility("a.txt"),
            Err(FSError::UnrecognizedAcl(_))
        ));
    }

    #[test]
    fn test_visibility_failures() {
        let (client, fs) = new_fs("");

        assert_eq!(fs.get_visibility("missing").unwrap(), None);
        assert_eq!(fs.set_visibility("missing", Visibility::Public), None);

        seed(&fs, &["a.txt"]);
        client.fail_on(Operation::PutAcl, None, 403);
        assert_eq!(fs.set_visibility("a.txt", Visibility::Public), None);

        client.fail_on(Operation::GetAcl, None, 403);
        assert!(fs.get_visibility("a.txt").is_err());
    }
}
