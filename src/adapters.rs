use crate::model::oss::{ListPage, ListQuery, ObjectBody, ObjectHead, Options, TransportError};

pub mod mock;
pub mod s3;

/// Blocking access to one object store. Every call carries the bucket and the
/// caller's options, which implementations forward as request headers.
pub trait ObjectTransport {
    fn head_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError>;

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectBody, TransportError>;

    fn get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError>;

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), TransportError>;

    fn copy_object(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        options: &Options,
    ) -> Result<(), TransportError>;

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<(), TransportError>;

    /// Fails as a whole if any key could not be deleted.
    fn delete_multiple_objects(
        &self,
        bucket: &str,
        keys: &[String],
        options: &Options,
    ) -> Result<(), TransportError>;

    fn list_objects(
        &self,
        bucket: &str,
        query: &ListQuery,
        options: &Options,
    ) -> Result<ListPage, TransportError>;

    fn get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<String, TransportError>;

    fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        options: &Options,
    ) -> Result<(), TransportError>;
}
