use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use crate::{
    adapters,
    model::oss::{
        ListPage, ListQuery, ObjectBody, ObjectHead, ObjectSummary, Options, TransportError,
        ACL_PRIVATE,
    },
};

const HEADER_CONTENT_TYPE: &str = "Content-Type";
const HEADER_OBJECT_ACL: &str = "x-oss-object-acl";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Head,
    Get,
    GetMeta,
    Put,
    Copy,
    Delete,
    DeleteMultiple,
    List,
    GetAcl,
    PutAcl,
}

#[derive(Clone, Debug)]
struct Fault {
    operation: Operation,
    key: Option<String>,
    status: u16,
}

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: Option<String>,
    last_modified: i64,
    acl: String,
}

impl StoredObject {
    fn head(&self) -> ObjectHead {
        ObjectHead {
            content_length: Some(self.bytes.len() as u64),
            content_type: self.content_type.clone(),
            last_modified: Some(self.last_modified),
        }
    }
}

enum Listed {
    Object,
    Prefix(String),
}

/// In-process object store with the list semantics of OSS: prefix,
/// delimiter grouping, marker continuation and a page cap.
pub struct MemoryClient {
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    faults: Mutex<Vec<Fault>>,
    list_markers: Mutex<Vec<Option<String>>>,
    calls: Mutex<Vec<(Operation, Options)>>,
    page_size: usize,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
            list_markers: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            page_size: page_size.max(1),
        }
    }

    /// Makes every matching call fail with `status` until `clear_faults`.
    /// A `None` key matches any key.
    pub fn fail_on(&self, operation: Operation, key: Option<&str>, status: u16) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                operation,
                key: key.map(str::to_string),
                status,
            });
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Markers of every list request so far, in order.
    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.list_markers
            .lock()
            .map(|markers| markers.clone())
            .unwrap_or_default()
    }

    /// Options forwarded with every call so far, in order.
    pub fn recorded_options(&self) -> Vec<(Operation, Options)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .ok()
            .and_then(|buckets| buckets.get(bucket).map(|b| b.keys().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn set_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<(), TransportError> {
        let mut buckets = self.lock_buckets()?;
        let object = buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(key))
            .ok_or_else(|| not_found(key))?;
        object.acl = acl.to_string();

        Ok(())
    }

    fn lock_buckets(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>>, TransportError>
    {
        self.buckets.lock().map_err(|err| {
            TransportError::new(None, format!("failed to acquire `buckets` guard: {}", err))
        })
    }

    fn record(&self, operation: Operation, options: &Options) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((operation, options.clone()));
        }
    }

    fn check_fault(&self, operation: Operation, keys: &[&str]) -> Result<(), TransportError> {
        let faults = self.faults.lock().map_err(|err| {
            TransportError::new(None, format!("failed to acquire `faults` guard: {}", err))
        })?;

        for fault in faults.iter().filter(|f| f.operation == operation) {
            let hit = match &fault.key {
                None => true,
                Some(k) => keys.contains(&k.as_str()),
            };

            if hit {
                return Err(TransportError::new(
                    Some(fault.status),
                    format!(
                        "injected failure for {:?} on: {}, status {}",
                        operation,
                        keys.join(","),
                        fault.status
                    ),
                ));
            }
        }

        Ok(())
    }

    fn stored(&self, bucket: &str, key: &str) -> Result<StoredObject, TransportError> {
        self.lock_buckets()?
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| not_found(key))
    }
}

fn not_found(key: &str) -> TransportError {
    TransportError::new(Some(404), format!("no such key: {}", key))
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

impl adapters::ObjectTransport for MemoryClient {
    fn head_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError> {
        self.record(Operation::Head, options);
        self.check_fault(Operation::Head, &[key])?;

        Ok(self.stored(bucket, key)?.head())
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectBody, TransportError> {
        self.record(Operation::Get, options);
        self.check_fault(Operation::Get, &[key])?;
        let object = self.stored(bucket, key)?;

        Ok(ObjectBody {
            head: object.head(),
            bytes: object.bytes,
        })
    }

    fn get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError> {
        self.record(Operation::GetMeta, options);
        self.check_fault(Operation::GetMeta, &[key])?;

        Ok(self.stored(bucket, key)?.head())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), TransportError> {
        self.record(Operation::Put, options);
        self.check_fault(Operation::Put, &[key])?;

        let acl = options
            .get(HEADER_OBJECT_ACL)
            .cloned()
            .unwrap_or_else(|| ACL_PRIVATE.to_string());

        self.lock_buckets()?.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                bytes: body,
                content_type: options.get(HEADER_CONTENT_TYPE).cloned(),
                last_modified: now(),
                acl,
            },
        );

        Ok(())
    }

    fn copy_object(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        self.record(Operation::Copy, options);
        self.check_fault(Operation::Copy, &[from, to])?;

        let mut object = self.stored(bucket, from)?;
        object.last_modified = now();
        self.lock_buckets()?
            .entry(bucket.to_string())
            .or_default()
            .insert(to.to_string(), object);

        Ok(())
    }

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        self.record(Operation::Delete, options);
        self.check_fault(Operation::Delete, &[key])?;

        if let Some(b) = self.lock_buckets()?.get_mut(bucket) {
            b.remove(key);
        }

        Ok(())
    }

    fn delete_multiple_objects(
        &self,
        bucket: &str,
        keys: &[String],
        options: &Options,
    ) -> Result<(), TransportError> {
        self.record(Operation::DeleteMultiple, options);

        if keys.is_empty() {
            return Err(TransportError::new(
                Some(400),
                "failed to delete_multiple_objects: no keys given",
            ));
        }

        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.check_fault(Operation::DeleteMultiple, &refs)?;

        if let Some(b) = self.lock_buckets()?.get_mut(bucket) {
            for key in keys {
                b.remove(key);
            }
        }

        Ok(())
    }

    fn list_objects(
        &self,
        bucket: &str,
        query: &ListQuery,
        options: &Options,
    ) -> Result<ListPage, TransportError> {
        self.record(Operation::List, options);
        let prefix = query.prefix.clone().unwrap_or_default();
        self.check_fault(Operation::List, &[prefix.as_str()])?;

        if let Ok(mut markers) = self.list_markers.lock() {
            markers.push(query.marker.clone());
        }

        let limit = if query.max_keys > 0 {
            (query.max_keys as usize).min(self.page_size)
        } else {
            self.page_size
        };

        let buckets = self.lock_buckets()?;
        let mut page = ListPage::default();
        let objects = match buckets.get(bucket) {
            None => return Ok(page),
            Some(b) => b,
        };

        let mut count = 0;
        let mut last: Option<String> = None;
        for (key, object) in objects.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }

            let listed = match query.delimiter.as_deref() {
                Some(delimiter) if !delimiter.is_empty() => {
                    match key[prefix.len()..].find(delimiter) {
                        Some(pos) => {
                            Listed::Prefix(key[..prefix.len() + pos + delimiter.len()].to_string())
                        }
                        None => Listed::Object,
                    }
                }
                _ => Listed::Object,
            };

            let name = match &listed {
                Listed::Prefix(p) => p.as_str(),
                Listed::Object => key.as_str(),
            };

            if let Some(marker) = query.marker.as_deref() {
                if name <= marker {
                    continue;
                }
            }

            if last.as_deref() == Some(name) {
                continue;
            }

            if count == limit {
                page.next_marker = last;
                break;
            }

            let name = name.to_string();
            match listed {
                Listed::Prefix(p) => page.common_prefixes.push(p),
                Listed::Object => page.objects.push(ObjectSummary {
                    key: key.clone(),
                    size: Some(object.bytes.len() as u64),
                    last_modified: Some(object.last_modified),
                }),
            }

            count += 1;
            last = Some(name);
        }

        Ok(page)
    }

    fn get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<String, TransportError> {
        self.record(Operation::GetAcl, options);
        self.check_fault(Operation::GetAcl, &[key])?;

        Ok(self.stored(bucket, key)?.acl)
    }

    fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        self.record(Operation::PutAcl, options);
        self.check_fault(Operation::PutAcl, &[key])?;

        self.set_acl(bucket, key, acl)
    }
}
