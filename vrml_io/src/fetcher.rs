use crate::{MemoryStream, ReaderStream, ResourceError, ResourceStream};
use ahash::AHashMap;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// Opens resources by absolute URL.
pub trait ResourceFetcher: Send + Sync {
    fn get_resource(&self, url: &Url) -> Result<Box<dyn ResourceStream>, ResourceError>;
}

pub const VRML_MEDIA_TYPE: &str = "model/vrml";
pub const X3D_VRML_MEDIA_TYPE: &str = "model/x3d-vrml";
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type for a path, by extension. Compressed worlds (`.wrz`, `.gz`)
/// report the type of their decompressed contents.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "wrl" | "wrz" | "vrml" => VRML_MEDIA_TYPE,
        "x3dv" | "x3dvz" => X3D_VRML_MEDIA_TYPE,
        "x3d" => "model/x3d+xml",
        "js" => "application/javascript",
        "class" => "application/x-java",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        _ => OCTET_STREAM_MEDIA_TYPE,
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "gz" | "wrz" | "x3dvz"))
}

/// Serves `file:` URLs from the local file system.
#[derive(Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceFetcher for FileFetcher {
    fn get_resource(&self, url: &Url) -> Result<Box<dyn ResourceStream>, ResourceError> {
        if url.scheme() != "file" {
            return Err(ResourceError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| ResourceError::InvalidUrl(url.to_string()))?;
        let file = File::open(&path).map_err(|e| ResourceError::unreachable(url.as_str(), e))?;
        let media_type = media_type_for_path(&path);
        log::debug!("opened {} as {media_type}", path.display());

        let reader: Box<dyn std::io::Read + Send> = if is_compressed(&path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Box::new(ReaderStream::new(url.as_str(), media_type, reader)))
    }
}

#[derive(Clone)]
struct MemoryResource {
    media_type: String,
    data: Arc<[u8]>,
}

/// In-memory resources keyed by absolute URL. Useful for embedding and tests.
#[derive(Default)]
pub struct MemoryFetcher {
    resources: RwLock<AHashMap<String, MemoryResource>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, media_type: &str, data: impl Into<Arc<[u8]>>) {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                MemoryResource {
                    media_type: media_type.to_string(),
                    data: data.into(),
                },
            );
    }

    pub fn with_resource(self, url: &str, media_type: &str, data: impl Into<Arc<[u8]>>) -> Self {
        self.insert(url, media_type, data);
        self
    }

    pub fn remove(&self, url: &str) -> bool {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn get_resource(&self, url: &Url) -> Result<Box<dyn ResourceStream>, ResourceError> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let resource = resources
            .get(url.as_str())
            .ok_or_else(|| ResourceError::unreachable(url.as_str(), "no such resource"))?;
        Ok(Box::new(MemoryStream::new(
            url.as_str(),
            resource.media_type.clone(),
            Arc::clone(&resource.data),
        )))
    }
}

/// Tries each fetcher in turn; the first that does not reject the scheme wins.
pub struct FetcherChain {
    fetchers: Vec<Arc<dyn ResourceFetcher>>,
}

impl FetcherChain {
    pub fn new(fetchers: Vec<Arc<dyn ResourceFetcher>>) -> Self {
        Self { fetchers }
    }
}

impl ResourceFetcher for FetcherChain {
    fn get_resource(&self, url: &Url) -> Result<Box<dyn ResourceStream>, ResourceError> {
        let mut last = ResourceError::UnsupportedScheme(url.scheme().to_string());
        for fetcher in &self.fetchers {
            match fetcher.get_resource(url) {
                Ok(stream) => return Ok(stream),
                Err(ResourceError::UnsupportedScheme(_)) => continue,
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}
