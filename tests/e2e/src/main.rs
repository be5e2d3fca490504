fn main() {
    println!("Run `cargo test -p sftt-e2e` to execute the end-to-end transfer tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use sftt_client::{
        ClientError, HttpUploader, ProgressKind, TransferOrchestrator,
    };
    use sftt_protocol::ServerAddress;
    use sftt_server::{FileServer, ServerOptions};
    use sftt_transfer::checksum_bytes;

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Running {
        server: Arc<FileServer>,
        addr: SocketAddr,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Running {
        fn orchestrator(&self) -> TransferOrchestrator<HttpUploader> {
            let address =
                ServerAddress::parse(&format!("127.0.0.1:{}/data", self.addr.port())).unwrap();
            TransferOrchestrator::new(HttpUploader::new(address).unwrap())
                .with_timeout(Some(Duration::from_secs(10)))
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn stop(self) {
            self.server.shutdown();
            self.handle.await.unwrap();
        }
    }

    async fn start(options: ServerOptions) -> Running {
        let server = Arc::new(FileServer::new(options).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server2 = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            server2.serve(listener).await.unwrap();
        });

        Running {
            server,
            addr,
            handle,
        }
    }

    /// A served root plus a private staging dir, both inside one temp dir.
    struct Fixture {
        tmp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            fs::create_dir_all(tmp.path().join("root")).unwrap();
            fs::create_dir_all(tmp.path().join("staging")).unwrap();
            fs::create_dir_all(tmp.path().join("local")).unwrap();
            Self { tmp }
        }

        fn root(&self) -> PathBuf {
            self.tmp.path().join("root")
        }

        fn staging(&self) -> PathBuf {
            self.tmp.path().join("staging")
        }

        fn local(&self) -> PathBuf {
            self.tmp.path().join("local")
        }

        fn options(&self) -> ServerOptions {
            ServerOptions {
                root: self.root(),
                staging_dir: Some(self.staging()),
                ..ServerOptions::default()
            }
        }

        fn staging_is_empty(&self) -> bool {
            fs::read_dir(self.staging()).unwrap().next().is_none()
        }
    }

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Sends a request without any client-side URL normalization and
    /// returns the status code.
    async fn raw_request(addr: SocketAddr, method: &str, path: &str) -> u16 {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8_lossy(&response);
        let status_line = text.lines().next().unwrap_or_default();
        status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("bad status line: {status_line:?}"))
    }

    fn zip_entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            entries.insert(entry.name().to_string(), content);
        }
        entries
    }

    // -----------------------------------------------------------------------
    // Upload and download
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_then_download_round_trip() {
        let fx = Fixture::new();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        let source = fx.local().join("blob.bin");
        write_file(&source, &data);

        let running = start(fx.options()).await;
        let orch = running.orchestrator();

        let result = orch.put_file(&source).await.unwrap();
        assert_eq!(result.key, "blob.bin");
        assert_eq!(result.checksum, checksum_bytes(&data));
        assert_eq!(fs::read(fx.root().join("data").join("blob.bin")).unwrap(), data);

        let dest = fx.local().join("downloaded.bin");
        let outcome = orch.download("blob.bin", &dest).await.unwrap();
        assert_eq!(outcome.checksum, result.checksum);
        assert_eq!(fs::read(&dest).unwrap(), data);
        assert!(fx.staging_is_empty());

        running.stop().await;
    }

    #[tokio::test]
    async fn checksum_mismatch_keeps_previous_content() {
        let fx = Fixture::new();
        let existing = fx.root().join("data").join("x.txt");
        write_file(&existing, b"old");
        let running = start(fx.options()).await;
        let client = reqwest::Client::new();

        let resp = client
            .put(running.url("/data/x.txt"))
            .header("x-content-md5", checksum_bytes(b"something else"))
            .body("new")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(fs::read(&existing).unwrap(), b"old");

        let resp = client
            .put(running.url("/data/y.txt"))
            .header("x-content-md5", "00000000000000000000000000000000")
            .body("new")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert!(!fx.root().join("data").join("y.txt").exists());
        assert!(fx.staging_is_empty());

        running.stop().await;
    }

    #[tokio::test]
    async fn upload_without_checksum_is_stored() {
        let fx = Fixture::new();
        let running = start(fx.options()).await;

        let resp = reqwest::Client::new()
            .put(running.url("/notes/today.txt"))
            .body("unverified")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            fs::read(fx.root().join("notes").join("today.txt")).unwrap(),
            b"unverified"
        );

        running.stop().await;
    }

    #[tokio::test]
    async fn repeated_upload_is_idempotent() {
        let fx = Fixture::new();
        let source = fx.local().join("same.txt");
        write_file(&source, b"identical content");
        let running = start(fx.options()).await;
        let orch = running.orchestrator();

        let first = orch.put_file(&source).await.unwrap();
        let second = orch.put_file(&source).await.unwrap();
        assert_eq!(first, second);

        let entries: Vec<_> = fs::read_dir(fx.root().join("data"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("same.txt")]);
        assert_eq!(
            fs::read(fx.root().join("data").join("same.txt")).unwrap(),
            b"identical content"
        );

        running.stop().await;
    }

    #[tokio::test]
    async fn directory_download_is_a_zip_of_the_tree() {
        let fx = Fixture::new();
        write_file(&fx.root().join("data").join("pack").join("a.txt"), b"alpha");
        write_file(
            &fx.root().join("data").join("pack").join("sub").join("b.txt"),
            b"bravo",
        );
        let running = start(fx.options()).await;

        let dest = fx.local().join("pack.zip");
        running.orchestrator().download("pack", &dest).await.unwrap();

        let entries = zip_entries(&dest);
        let names: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);
        assert_eq!(entries["a.txt"], b"alpha");
        assert_eq!(entries["sub/b.txt"], b"bravo");

        running.stop().await;
    }

    #[tokio::test]
    async fn download_of_missing_key_is_404() {
        let fx = Fixture::new();
        let running = start(fx.options()).await;

        let dest = fx.local().join("never.bin");
        let err = running
            .orchestrator()
            .download("missing.bin", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        assert!(!dest.exists());

        running.stop().await;
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn batch_uploads_tree_with_encoded_keys() {
        let fx = Fixture::new();
        let tree = fx.local().join("site");
        write_file(&tree.join("index.html"), b"<html>");
        write_file(&tree.join("assets").join("app v2.js"), b"js");
        let running = start(fx.options()).await;

        let results = running.orchestrator().put_dir(&tree, |_| {}).await.unwrap();
        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["assets/app v2.js", "index.html"]);

        let data = fx.root().join("data");
        assert_eq!(fs::read(data.join("assets").join("app v2.js")).unwrap(), b"js");
        assert_eq!(fs::read(data.join("index.html")).unwrap(), b"<html>");

        running.stop().await;
    }

    #[tokio::test]
    async fn batch_with_mixed_outcomes() {
        let fx = Fixture::new();
        let tree = fx.local().join("batch");
        write_file(&tree.join("a.txt"), b"a");
        write_file(&tree.join("b.txt"), b"b");
        write_file(&tree.join("c.txt"), b"c");
        // A directory in the way makes the publish of b.txt fail.
        write_file(&fx.root().join("data").join("b.txt").join("keep"), b"k");
        let running = start(fx.options()).await;

        let mut events = Vec::new();
        let results = running
            .orchestrator()
            .put_dir(&tree, |e| {
                let status = match &e.kind {
                    ProgressKind::Failed(ClientError::Status { status, .. }) => Some(*status),
                    _ => None,
                };
                events.push((e.kind.name(), e.total_count, e.completed_count, status));
            })
            .await
            .unwrap();

        let kinds: Vec<&str> = events.iter().map(|e| e.0).collect();
        assert_eq!(
            kinds,
            vec!["started", "succeeded", "started", "failed", "started", "succeeded"]
        );
        assert!(events.iter().all(|e| e.1 == 3));
        assert_eq!(events[3].3, Some(500));

        let terminal: Vec<usize> = events
            .iter()
            .filter(|e| e.0 != "started")
            .map(|e| e.2)
            .collect();
        assert_eq!(terminal, vec![1, 2, 3]);

        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "c.txt"]);
        assert_eq!(fs::read(fx.root().join("data").join("c.txt")).unwrap(), b"c");
        assert!(fx.staging_is_empty());

        running.stop().await;
    }

    // -----------------------------------------------------------------------
    // Enforcement
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn traversal_is_denied() {
        let fx = Fixture::new();
        write_file(&fx.tmp.path().join("secret.txt"), b"top secret");
        write_file(&fx.root().join("public.txt"), b"public");
        let running = start(fx.options()).await;

        assert_eq!(raw_request(running.addr, "GET", "/public.txt").await, 200);

        for path in [
            "/../secret.txt",
            "/data/../../secret.txt",
            "/%2e%2e/secret.txt",
            "/%2E%2E%2Fsecret.txt",
            "/data/..%2f..%2fsecret.txt",
            "/%2F..%2Fsecret.txt",
            "/%2Fetc%2Fpasswd",
        ] {
            assert_eq!(raw_request(running.addr, "GET", path).await, 403, "GET {path}");
        }

        assert_eq!(raw_request(running.addr, "PUT", "/../escaped.txt").await, 403);
        assert_eq!(raw_request(running.addr, "PUT", "/%2e%2e%2fescaped.txt").await, 403);
        assert!(!fx.tmp.path().join("escaped.txt").exists());

        running.stop().await;
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let fx = Fixture::new();
        write_file(&fx.root().join("f.txt"), b"f");
        let running = start(fx.options()).await;

        for method in ["POST", "DELETE", "PATCH", "OPTIONS"] {
            assert_eq!(raw_request(running.addr, method, "/f.txt").await, 405, "{method}");
        }
        assert!(fx.root().join("f.txt").exists());

        running.stop().await;
    }

    #[tokio::test]
    async fn unlisted_peer_is_denied() {
        let fx = Fixture::new();
        write_file(&fx.root().join("f.txt"), b"f");
        let source = fx.local().join("up.txt");
        write_file(&source, b"up");

        let running = start(ServerOptions {
            allow_list: vec!["192.0.2.1".to_string()],
            ..fx.options()
        })
        .await;

        assert_eq!(raw_request(running.addr, "GET", "/f.txt").await, 403);
        assert_eq!(raw_request(running.addr, "GET", "/../secret").await, 403);
        assert_eq!(raw_request(running.addr, "DELETE", "/f.txt").await, 403);

        let err = running.orchestrator().put_file(&source).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 403, .. }));
        assert!(!fx.root().join("data").exists());

        running.stop().await;
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let fx = Fixture::new();
        let source = fx.local().join("big.bin");
        write_file(&source, &vec![7u8; 64 * 1024]);

        let running = start(ServerOptions {
            max_body_bytes: Some(1024),
            ..fx.options()
        })
        .await;

        let err = running.orchestrator().put_file(&source).await.unwrap_err();
        assert!(
            matches!(err, ClientError::Status { status: 413, .. } | ClientError::Http(_)),
            "{err}"
        );
        assert!(!fx.root().join("data").join("big.bin").exists());
        assert!(fx.staging_is_empty());

        running.stop().await;
    }

    // -----------------------------------------------------------------------
    // Timeouts
    // -----------------------------------------------------------------------

    /// Accepts connections and never answers. Reports, per connection,
    /// whether the peer closed it within `watch`.
    async fn silent_server(
        watch: Duration,
    ) -> (SocketAddr, tokio::sync::mpsc::Receiver<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let closed = tokio::time::timeout(watch, async {
                        loop {
                            match stream.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(_) => continue,
                            }
                        }
                    })
                    .await
                    .is_ok();
                    let _ = tx.send(closed).await;
                });
            }
        });

        (addr, rx)
    }

    fn silent_orchestrator(addr: SocketAddr, timeout: Duration) -> TransferOrchestrator<HttpUploader> {
        let address = ServerAddress::parse(&format!("127.0.0.1:{}/data", addr.port())).unwrap();
        TransferOrchestrator::new(HttpUploader::new(address).unwrap()).with_timeout(Some(timeout))
    }

    #[tokio::test]
    async fn one_millisecond_timeout_fails_the_item() {
        let fx = Fixture::new();
        write_file(&fx.local().join("slow.txt"), b"slow");
        let (addr, _closed) = silent_server(Duration::from_secs(5)).await;

        let orch = silent_orchestrator(addr, Duration::from_millis(1));
        let mut failures = Vec::new();
        let results = orch
            .put_dir(&fx.local(), |e| {
                if let ProgressKind::Failed(err) = &e.kind {
                    failures.push(err.to_string());
                }
            })
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(failures, vec!["upload timed out after 1ms".to_string()]);
    }

    #[tokio::test]
    async fn timed_out_upload_closes_its_connection() {
        let fx = Fixture::new();
        let source = fx.local().join("stuck.txt");
        write_file(&source, b"stuck");
        let (addr, mut closed) = silent_server(Duration::from_secs(5)).await;

        let orch = silent_orchestrator(addr, Duration::from_millis(300));
        let err = orch.put_file(&source).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(300)));

        let was_closed = tokio::time::timeout(Duration::from_secs(10), closed.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(was_closed, "connection still open after timeout");
    }
}
