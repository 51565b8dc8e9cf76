pub mod error;
pub mod fetcher;
pub mod paths;
pub mod stream;
pub mod uri;

pub use error::*;
pub use fetcher::*;
pub use paths::*;
pub use stream::*;

pub use url::Url;

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::{Read, Write};
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn relative_detection() {
        assert!(uri::is_relative("a.wrl"));
        assert!(uri::is_relative("../models/b.wrl"));
        assert!(!uri::is_relative("http://h/x/y.wrl"));
        assert!(!uri::is_relative("bad://x"));
        assert!(!uri::is_relative("javascript:foo()"));
    }

    #[test]
    fn resolve_against_parent_directory() {
        let url = uri::resolve("http://h/x/y.wrl", "a.wrl").unwrap();
        assert_eq!(url.as_str(), "http://h/x/a.wrl");

        let url = uri::resolve("http://h/x/y.wrl", "../b/c.wrl").unwrap();
        assert_eq!(url.as_str(), "http://h/b/c.wrl");

        let url = uri::resolve("http://h/x/y.wrl", "ftp://other/z.wrl").unwrap();
        assert_eq!(url.as_str(), "ftp://other/z.wrl");
    }

    #[test]
    fn resolve_rejects_relative_base() {
        assert_eq!(
            uri::resolve("y.wrl", "a.wrl"),
            Err(ResourceError::InvalidUrl("y.wrl".to_string()))
        );
    }

    #[test]
    fn file_url_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let url = uri::file_url_in(dir.path(), "world.wrl").unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.to_file_path().unwrap(), dir.path().join("world.wrl"));
    }

    #[test]
    fn media_types_by_extension() {
        assert_eq!(media_type_for_path(Path::new("a/world.wrl")), VRML_MEDIA_TYPE);
        assert_eq!(media_type_for_path(Path::new("WORLD.WRZ")), VRML_MEDIA_TYPE);
        assert_eq!(media_type_for_path(Path::new("world.wrl.gz")), VRML_MEDIA_TYPE);
        assert_eq!(media_type_for_path(Path::new("s.x3dv")), X3D_VRML_MEDIA_TYPE);
        assert_eq!(media_type_for_path(Path::new("noext")), OCTET_STREAM_MEDIA_TYPE);
    }

    #[test]
    fn memory_stream_reports_exhaustion() {
        let mut stream = MemoryStream::new("mem:a", "text/plain", b"abc".to_vec());
        assert!(stream.data_available());
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert!(!stream.data_available());
        assert_eq!(stream.url(), "mem:a");
        assert_eq!(stream.media_type(), "text/plain");
    }

    #[test]
    fn memory_fetcher_serves_known_urls_only() {
        let fetcher = MemoryFetcher::new().with_resource("http://good/y", VRML_MEDIA_TYPE, b"#VRML".to_vec());

        let mut stream = fetcher
            .get_resource(&Url::parse("http://good/y").unwrap())
            .unwrap();
        let mut body = Vec::new();
        stream.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"#VRML");
        assert_eq!(stream.media_type(), VRML_MEDIA_TYPE);

        let err = fetcher
            .get_resource(&Url::parse("bad://x").unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, ResourceError::UnreachableUrl { ref url, .. } if url == "bad://x"));
    }

    #[test]
    fn file_fetcher_reads_plain_and_gzipped_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.wrl"), b"#VRML V2.0 utf8\n").unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"#VRML V2.0 utf8\nGroup {}\n").unwrap();
        fs::write(dir.path().join("packed.wrz"), encoder.finish().unwrap()).unwrap();

        let fetcher = FileFetcher::new();

        let mut plain = fetcher
            .get_resource(&uri::file_url_in(dir.path(), "plain.wrl").unwrap())
            .unwrap();
        let mut text = String::new();
        plain.read_to_string(&mut text).unwrap();
        assert_eq!(text, "#VRML V2.0 utf8\n");
        assert!(!plain.data_available());

        let mut packed = fetcher
            .get_resource(&uri::file_url_in(dir.path(), "packed.wrz").unwrap())
            .unwrap();
        assert_eq!(packed.media_type(), VRML_MEDIA_TYPE);
        let mut text = String::new();
        packed.read_to_string(&mut text).unwrap();
        assert!(text.ends_with("Group {}\n"));
    }

    #[test]
    fn compressed_extensions_match_in_any_case() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["PACKED.WRZ", "World.Wrl.GZ"] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"#VRML V2.0 utf8\n").unwrap();
            fs::write(dir.path().join(name), encoder.finish().unwrap()).unwrap();

            let mut stream = FileFetcher::new()
                .get_resource(&uri::file_url_in(dir.path(), name).unwrap())
                .unwrap();
            assert_eq!(stream.media_type(), VRML_MEDIA_TYPE);
            let mut text = String::new();
            stream.read_to_string(&mut text).unwrap();
            assert_eq!(text, "#VRML V2.0 utf8\n", "{name}");
        }
    }

    #[test]
    fn file_fetcher_rejects_other_schemes_and_missing_files() {
        let fetcher = FileFetcher::new();
        assert_eq!(
            fetcher
                .get_resource(&Url::parse("http://h/a.wrl").unwrap())
                .err(),
            Some(ResourceError::UnsupportedScheme("http".to_string()))
        );

        let dir = tempfile::tempdir().unwrap();
        let missing = uri::file_url_in(dir.path(), "missing.wrl").unwrap();
        assert!(matches!(
            fetcher.get_resource(&missing).err(),
            Some(ResourceError::UnreachableUrl { .. })
        ));
    }

    #[test]
    fn fetcher_chain_falls_through_unsupported_schemes() {
        let memory = MemoryFetcher::new().with_resource("http://h/a.wrl", VRML_MEDIA_TYPE, b"a".to_vec());
        let chain = FetcherChain::new(vec![
            Arc::new(FileFetcher::new()) as Arc<dyn ResourceFetcher>,
            Arc::new(memory) as Arc<dyn ResourceFetcher>,
        ]);
        assert!(chain.get_resource(&Url::parse("http://h/a.wrl").unwrap()).is_ok());
        assert!(chain.get_resource(&Url::parse("http://h/b.wrl").unwrap()).is_err());
    }

    #[test]
    fn module_files_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let module = format!("engine.{}", module_extension());
        fs::write(dir.path().join(&module), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let found = module_files(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join(module)]);

        assert!(module_files(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn unreachable_reason_omits_url() {
        let err = ResourceError::unreachable("bad://x", "no such resource");
        assert_eq!(err.to_string(), "bad://x: no such resource");
        assert_eq!(err.reason(), "no such resource");
        assert_eq!(ResourceError::InvalidUrl("::".into()).reason(), "invalid URI");
    }
}
