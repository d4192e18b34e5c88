use std::{borrow::Cow, sync::Arc};

use crate::{
    adapters,
    model::{
        fs::{Config, EntryKind, FSError, FileInfo, ListingEntry, CONFIG_CONTENT_TYPE},
        oss::{ListPage, ListQuery, ObjectHead, ObjectSummary, Options, TransportError},
    },
    util,
};

pub const MAX_KEYS: i32 = 1000;
pub const DELIMITER: &str = "/";
const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Filesystem view over one bucket. Holds no state besides its
/// configuration; every call goes straight to the transport.
pub struct ObjectFS {
    client: Arc<dyn adapters::ObjectTransport>,
    bucket: String,
    prefix: String,
    options: Options,
}

impl ObjectFS {
    pub fn new(
        client: Arc<dyn adapters::ObjectTransport>,
        bucket: &str,
        prefix: &str,
        options: Options,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: util::path::normalize_prefix(prefix),
            options,
        }
    }

    pub fn client(&self) -> &dyn adapters::ObjectTransport {
        self.client.as_ref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    pub fn apply_prefix(&self, path: &str) -> String {
        util::path::apply_prefix(&self.prefix, path)
    }

    pub fn remove_prefix(&self, key: &str) -> String {
        util::path::remove_prefix(&self.prefix, key).to_string()
    }

    /// Runs a transport call, reporting a 404 as `None`.
    pub fn handle_request<T, F>(&self, request: F) -> Result<Option<T>, FSError>
    where
        F: FnOnce() -> Result<T, TransportError>,
    {
        util::request::handle_request(request, TransportError::is_not_found).map_err(FSError::from)
    }

    pub fn list_contents_query(&self, directory: &str, recursive: bool) -> ListQuery {
        let prefix = self.apply_prefix(&util::path::normalize_dir(directory));

        ListQuery {
            prefix: if prefix.is_empty() { None } else { Some(prefix) },
            delimiter: if recursive {
                None
            } else {
                Some(DELIMITER.to_string())
            },
            marker: None,
            max_keys: MAX_KEYS,
        }
    }

    /// Follows the marker chain of a listing, handing every page to `on_page`.
    pub fn list_pages<F>(&self, mut query: ListQuery, mut on_page: F) -> Result<(), TransportError>
    where
        F: FnMut(ListPage),
    {
        loop {
            let mut page = self.client.list_objects(&self.bucket, &query, &self.options)?;

            // An empty page may still carry a marker; only its absence ends the listing.
            query.marker = page.next_marker.take().filter(|marker| !marker.is_empty());
            on_page(page);

            if query.marker.is_none() {
                return Ok(());
            }
        }
    }

    pub fn transform_contents(&self, objects: Vec<ObjectSummary>) -> Vec<ListingEntry> {
        objects
            .into_iter()
            .map(|object| ListingEntry {
                kind: if util::path::is_dir_key(&object.key) {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                },
                path: self.remove_prefix(&object.key),
                timestamp: object.last_modified,
                size: object.size,
            })
            .collect()
    }

    pub fn transform_directories(&self, prefixes: Vec<String>) -> Vec<ListingEntry> {
        prefixes
            .into_iter()
            .map(|prefix| ListingEntry {
                kind: EntryKind::Dir,
                path: self.remove_prefix(&prefix),
                timestamp: None,
                size: None,
            })
            .collect()
    }

    pub fn transform_file(
        &self,
        head: ObjectHead,
        path: &str,
        contents: Option<Vec<u8>>,
    ) -> FileInfo {
        FileInfo {
            kind: EntryKind::File,
            path: path.to_string(),
            contents,
            timestamp: head.last_modified,
            size: head.content_length,
            mimetype: head.content_type,
        }
    }

    /// Options for a single write. A `ContentType` setting lands in a copy;
    /// the adapter's own options stay untouched.
    pub fn write_options(&self, config: &Config) -> Cow<'_, Options> {
        match config.get(CONFIG_CONTENT_TYPE) {
            None => Cow::Borrowed(&self.options),
            Some(content_type) => {
                let mut options = self.options.clone();
                options.insert(HEADER_CONTENT_TYPE.to_string(), content_type.to_string());
                Cow::Owned(options)
            }
        }
    }
}
