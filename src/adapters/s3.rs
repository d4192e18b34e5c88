use std::future::Future;

use aws_sdk_s3::{
    config::{
        http::{HttpRequest, HttpResponse},
        Credentials, Region, RequestChecksumCalculation,
    },
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{Delete, Grant, ObjectCannedAcl, ObjectIdentifier, Permission},
};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use tokio::runtime::Runtime;
use tracing::warn;

use crate::{
    adapters,
    model::oss::{
        ListPage, ListQuery, ObjectBody, ObjectHead, ObjectSummary, Options, TransportError,
        ACL_PRIVATE, ACL_PUBLIC_READ, ACL_PUBLIC_READ_WRITE,
    },
};

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const MAX_DELETE_KEYS: usize = 1000;

const ENV_ACCESS_KEY_ID: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
const ENV_ACCESS_KEY_SECRET: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";
const ENV_SECURITY_TOKEN: &str = "ALIBABA_CLOUD_SECURITY_TOKEN";

/// Connection settings for the S3-compatible endpoint of an OSS region,
/// e.g. `https://oss-cn-hangzhou.aliyuncs.com` with region `oss-cn-hangzhou`.
#[derive(Clone, Debug, Default)]
pub struct ConnectSettings {
    pub endpoint: Option<String>,
    pub region: String,
    pub force_path_style: bool,
}

/// Blocking OSS transport over `aws-sdk-s3`. Owns a Tokio runtime to drive
/// the SDK, so it must not be called from inside an async task.
pub struct S3Client {
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl S3Client {
    pub fn new(client: aws_sdk_s3::Client) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            runtime: build_runtime()?,
        })
    }

    pub fn connect(settings: &ConnectSettings) -> Result<Self, TransportError> {
        let runtime = build_runtime()?;
        let sdk_config = runtime.block_on(load_sdk_config(settings));

        let config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            runtime,
        })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn build_runtime() -> Result<Runtime, TransportError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            TransportError::new(None, format!("failed to build runtime: {}", err))
        })
}

async fn load_sdk_config(settings: &ConnectSettings) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()));

    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(credentials) = credentials_from_env() {
        loader = loader.credentials_provider(credentials);
    }

    loader.load().await
}

fn credentials_from_env() -> Option<Credentials> {
    let access_key_id = std::env::var(ENV_ACCESS_KEY_ID).ok()?;
    let access_key_secret = std::env::var(ENV_ACCESS_KEY_SECRET).ok()?;
    let security_token = std::env::var(ENV_SECURITY_TOKEN).ok();

    Some(Credentials::new(
        access_key_id,
        access_key_secret,
        security_token,
        None,
        "alibaba-cloud-env",
    ))
}

fn forward_headers(options: &Options) -> impl Fn(&mut HttpRequest) + Send + Sync + 'static {
    let options = options.clone();
    move |req: &mut HttpRequest| {
        for (name, value) in &options {
            if let Err(err) = req.headers_mut().try_insert(name.clone(), value.clone()) {
                warn!(error_message=%err, error_group="forward_headers", header=%name);
            }
        }
    }
}

/// OSS requires Content-MD5 on DeleteObjects; the SDK only sends a CRC32.
fn content_md5(req: &mut HttpRequest) {
    let digest = req.body().bytes().map(|body| B64.encode(md5::compute(body).0));

    if let Some(digest) = digest {
        if let Err(err) = req.headers_mut().try_insert("Content-MD5", digest) {
            warn!(error_message=%err, error_group="content_md5");
        }
    }
}

fn transport_error<E>(action: &str, key: &str, err: SdkError<E, HttpResponse>) -> TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|resp| resp.status().as_u16());

    TransportError::new(
        status,
        format!("failed to {}: {}, {}", action, key, DisplayErrorContext(&err)),
    )
}

fn encode_copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();

    format!("{}/{}", bucket, encoded.join("/"))
}

/// Collapses the grants of the `AllUsers` group into a canned ACL string.
fn canned_acl_from_grants(grants: &[Grant]) -> &'static str {
    let mut read = false;
    let mut write = false;

    for grant in grants {
        let all_users = grant
            .grantee()
            .and_then(|grantee| grantee.uri())
            .map(|uri| uri == ALL_USERS_URI)
            .unwrap_or(false);

        if !all_users {
            continue;
        }

        match grant.permission() {
            Some(Permission::Read) => read = true,
            Some(Permission::Write) | Some(Permission::FullControl) => {
                read = true;
                write = true;
            }
            _ => {}
        }
    }

    match (read, write) {
        (_, true) => ACL_PUBLIC_READ_WRITE,
        (true, false) => ACL_PUBLIC_READ,
        (false, false) => ACL_PRIVATE,
    }
}

fn secs(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<i64> {
    dt.map(|dt| dt.secs())
}

fn length(len: Option<i64>) -> Option<u64> {
    len.and_then(|len| u64::try_from(len).ok())
}

impl adapters::ObjectTransport for S3Client {
    fn head_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError> {
        let req = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .mutate_request(forward_headers(options));

        let ho = self
            .block_on(req.send())
            .map_err(|err| transport_error("head_object", key, err))?;

        Ok(ObjectHead {
            content_length: length(ho.content_length()),
            content_type: ho.content_type().map(str::to_string),
            last_modified: secs(ho.last_modified()),
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectBody, TransportError> {
        let req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .mutate_request(forward_headers(options));

        let o = self
            .block_on(req.send())
            .map_err(|err| transport_error("get_object", key, err))?;

        let head = ObjectHead {
            content_length: length(o.content_length()),
            content_type: o.content_type().map(str::to_string),
            last_modified: secs(o.last_modified()),
        };

        let bytes = self.block_on(o.body.collect()).map_err(|err| {
            TransportError::new(None, format!("failed to collect body: {}, {}", key, err))
        })?;

        Ok(ObjectBody {
            head,
            bytes: bytes.into_bytes().to_vec(),
        })
    }

    fn get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectHead, TransportError> {
        self.head_object(bucket, key, options)
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), TransportError> {
        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .customize()
            .mutate_request(forward_headers(options));

        self.block_on(req.send())
            .map_err(|err| transport_error("put_object", key, err))?;

        Ok(())
    }

    fn copy_object(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        let req = self
            .client
            .copy_object()
            .bucket(bucket)
            .copy_source(encode_copy_source(bucket, from))
            .key(to)
            .customize()
            .mutate_request(forward_headers(options));

        self.block_on(req.send())
            .map_err(|err| transport_error("copy_object", from, err))?;

        Ok(())
    }

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        let req = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .mutate_request(forward_headers(options));

        self.block_on(req.send())
            .map_err(|err| transport_error("delete_object", key, err))?;

        Ok(())
    }

    fn delete_multiple_objects(
        &self,
        bucket: &str,
        keys: &[String],
        options: &Options,
    ) -> Result<(), TransportError> {
        for chunk in keys.chunks(MAX_DELETE_KEYS) {
            let first = chunk.first().map(String::as_str).unwrap_or("");

            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    TransportError::new(None, format!("failed to build delete: {}, {}", first, err))
                })?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| {
                    TransportError::new(None, format!("failed to build delete: {}, {}", first, err))
                })?;

            let req = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .customize()
                .mutate_request(forward_headers(options))
                .mutate_request(content_md5);

            let out = self
                .block_on(req.send())
                .map_err(|err| transport_error("delete_objects", first, err))?;

            if let Some(err) = out.errors().first() {
                return Err(TransportError::new(
                    None,
                    format!(
                        "failed to delete_objects: {}, {}",
                        err.key().unwrap_or(""),
                        err.message().unwrap_or("")
                    ),
                ));
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
        let prefix = query.prefix.clone().unwrap_or_default();

        let req = self
            .client
            .list_objects()
            .bucket(bucket)
            .set_prefix(query.prefix.clone())
            .set_delimiter(query.delimiter.clone())
            .set_marker(query.marker.clone())
            .max_keys(query.max_keys)
            .customize()
            .mutate_request(forward_headers(options));

        let lo = self
            .block_on(req.send())
            .map_err(|err| transport_error("list_objects", &prefix, err))?;

        let mut page = ListPage::default();

        for o in lo.contents() {
            page.objects.push(ObjectSummary {
                key: o.key().unwrap_or("").to_string(),
                size: length(o.size()),
                last_modified: secs(o.last_modified()),
            });
        }

        for cp in lo.common_prefixes() {
            if let Some(p) = cp.prefix() {
                page.common_prefixes.push(p.to_string());
            }
        }

        page.next_marker = match lo.next_marker() {
            Some(marker) if !marker.is_empty() => Some(marker.to_string()),
            // Without a delimiter S3 omits NextMarker; the last entry continues.
            _ if lo.is_truncated().unwrap_or(false) => {
                let last_key = page.objects.last().map(|o| o.key.clone());
                let last_prefix = page.common_prefixes.last().cloned();
                last_key.max(last_prefix)
            }
            _ => None,
        };

        Ok(page)
    }

    fn get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<String, TransportError> {
        let req = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .customize()
            .mutate_request(forward_headers(options));

        let out = self
            .block_on(req.send())
            .map_err(|err| transport_error("get_object_acl", key, err))?;

        Ok(canned_acl_from_grants(out.grants()).to_string())
    }

    fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        options: &Options,
    ) -> Result<(), TransportError> {
        let req = self
            .client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl))
            .customize()
            .mutate_request(forward_headers(options));

        self.block_on(req.send())
            .map_err(|err| transport_error("put_object_acl", key, err))?;

        Ok(())
    }
}
