//! ---
//! lk_section: "03-networking-transfer"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Fetcher trait with HTTP and local-file implementations."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::progress::{ProgressSink, TransferOutcome};
use crate::{FetchError, Result};

const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Byte-fetching primitive used by the update pipeline.
///
/// A fetcher copies the bytes behind `source` to `dest` and reports the byte
/// count. On any error `dest` is left untouched: implementations write to a
/// sibling temporary file and only rename it into place on success, so the
/// caller can roll back by simply not using the destination.
pub trait Fetcher {
    /// Copy `source` to `dest`, pushing progress into `progress`.
    fn fetch(&self, source: &Url, dest: &Path, progress: &dyn ProgressSink) -> Result<u64>;
}

/// HTTP(S) fetcher backed by a blocking reqwest client.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the supplied connect timeout.
    ///
    /// Only the connection attempt is bounded. The body transfer itself runs
    /// untimed: component downloads can be arbitrarily large and there is no
    /// retry loop above this, so a total-request deadline would turn a slow
    /// link into a permanently failing install.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(None)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, source: &Url, dest: &Path, progress: &dyn ProgressSink) -> Result<u64> {
        let response = self.client.get(source.clone()).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: source.to_string(),
            });
        }
        let total = response.content_length();
        progress.begin(&transfer_name(source), total);
        write_via_temp(dest, progress, |writer, progress| {
            copy_with_progress(response, writer, progress)
        })
    }
}

/// Fetcher for `file://` sources, used for local update feeds and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, source: &Url, dest: &Path, progress: &dyn ProgressSink) -> Result<u64> {
        let source_path = source
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(source.path()));
        let total = fs::metadata(&source_path).ok().map(|m| m.len());
        progress.begin(&transfer_name(source), total);
        write_via_temp(dest, progress, |writer, progress| {
            let reader = File::open(&source_path)?;
            copy_with_progress(reader, writer, progress)
        })
    }
}

/// Fetcher dispatching on the source URL scheme: `http`/`https` go through
/// [`HttpFetcher`], `file` through [`FileFetcher`].
#[derive(Debug)]
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl Fetcher for SchemeFetcher {
    fn fetch(&self, source: &Url, dest: &Path, progress: &dyn ProgressSink) -> Result<u64> {
        match source.scheme() {
            "http" | "https" => self.http.fetch(source, dest, progress),
            "file" => self.file.fetch(source, dest, progress),
            other => Err(FetchError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Default fetcher stack used by the launcher binary.
pub fn default_fetcher(timeout: Duration) -> Result<Box<dyn Fetcher>> {
    Ok(Box::new(SchemeFetcher {
        http: HttpFetcher::new(timeout)?,
        file: FileFetcher,
    }))
}

fn transfer_name(source: &Url) -> String {
    source
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| source.to_string())
}

/// Stream into `<dest>.part`, then rename over `dest` only when the body
/// closure succeeds. Failures remove the partial file and leave `dest` as it
/// was.
fn write_via_temp<F>(dest: &Path, progress: &dyn ProgressSink, body: F) -> Result<u64>
where
    F: FnOnce(&mut File, &dyn ProgressSink) -> Result<u64>,
{
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = partial_path(dest);
    let result = File::create(&tmp)
        .map_err(FetchError::from)
        .and_then(|mut file| {
            let bytes = body(&mut file, progress)?;
            file.flush()?;
            Ok(bytes)
        });
    match result {
        Ok(bytes) => {
            fs::rename(&tmp, dest)?;
            progress.finish(TransferOutcome::Completed);
            debug!(dest = %dest.display(), bytes, "transfer complete");
            Ok(bytes)
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(tmp = %tmp.display(), error = %cleanup, "could not remove partial file");
            }
            progress.finish(TransferOutcome::Aborted);
            Err(err)
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn copy_with_progress<R: Read>(
    mut reader: R,
    writer: &mut File,
    progress: &dyn ProgressSink,
) -> Result<u64> {
    let mut buffer = [0u8; COPY_BUFFER_BYTES];
    let mut copied = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
        progress.advance(copied);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn begin(&self, name: &str, total_bytes: Option<u64>) {
            self.events
                .borrow_mut()
                .push(format!("begin {name} {total_bytes:?}"));
        }
        fn advance(&self, bytes_so_far: u64) {
            self.events.borrow_mut().push(format!("advance {bytes_so_far}"));
        }
        fn finish(&self, outcome: TransferOutcome) {
            self.events.borrow_mut().push(format!("finish {outcome:?}"));
        }
    }

    fn file_url(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[test]
    fn file_fetch_copies_bytes_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("core.jar");
        fs::write(&source, b"component payload").unwrap();
        let dest = dir.path().join("staging/core.jar");

        let sink = RecordingSink::default();
        let bytes = FileFetcher
            .fetch(&file_url(&source), &dest, &sink)
            .unwrap();

        assert_eq!(bytes, 17);
        assert_eq!(fs::read(&dest).unwrap(), b"component payload");
        let events = sink.events.borrow();
        assert_eq!(events.first().unwrap(), "begin core.jar Some(17)");
        assert_eq!(events.last().unwrap(), "finish Completed");
    }

    #[test]
    fn failed_fetch_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("core.jar");
        fs::write(&dest, b"previous contents").unwrap();

        let missing = dir.path().join("absent.jar");
        let err = FileFetcher
            .fetch(&file_url(&missing), &dest, &NoopProgress)
            .unwrap_err();

        assert!(matches!(err, FetchError::Io(_)));
        assert_eq!(fs::read(&dest).unwrap(), b"previous contents");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn connect_timeout_does_not_bound_the_body_transfer() {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello")
                .unwrap();
            socket.flush().unwrap();
            // Stall well past the connect timeout before finishing the body.
            std::thread::sleep(Duration::from_millis(600));
            socket.write_all(b"world").unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("core.jar");
        let fetcher = HttpFetcher::new(Duration::from_millis(150)).unwrap();
        let url = Url::parse(&format!("http://{addr}/core.jar")).unwrap();

        let bytes = fetcher.fetch(&url, &dest, &NoopProgress).unwrap();
        server.join().unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(fs::read(&dest).unwrap(), b"helloworld");
    }

    #[test]
    fn scheme_dispatch_rejects_unknown_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SchemeFetcher {
            http: HttpFetcher::new(Duration::from_secs(1)).unwrap(),
            file: FileFetcher,
        };
        let err = fetcher
            .fetch(
                &Url::parse("ftp://example.com/core.jar").unwrap(),
                &dir.path().join("core.jar"),
                &NoopProgress,
            )
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(scheme) if scheme == "ftp"));
    }

    #[test]
    fn transfer_name_falls_back_to_full_url() {
        let url = Url::parse("https://updates.example.com/dir/core.jar").unwrap();
        assert_eq!(transfer_name(&url), "core.jar");
        let bare = Url::parse("https://updates.example.com/").unwrap();
        assert_eq!(transfer_name(&bare), bare.to_string());
    }
}
