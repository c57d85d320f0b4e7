use dev_server::{HttpServer, ServerConfig};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::tempdir;

const FIXED_HEADERS: &[&str] = &[
    "Cache-Control: no-cache, no-store, must-revalidate",
    "Pragma: no-cache",
    "Expires: 0",
    "X-Content-Type-Options: nosniff",
    "X-Frame-Options: DENY",
    "X-XSS-Protection: 1; mode=block",
];

struct RunningServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RunningServer {
    fn start(root: &Path) -> Self {
        let config = ServerConfig {
            port: 0,
            directory: root.to_path_buf(),
            host: "127.0.0.1".to_string(),
        };
        let server = HttpServer::bind(&config).unwrap();
        let addr = server.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || server.run(&flag));

        Self {
            addr,
            stop,
            thread: Some(thread),
        }
    }

    fn request(&self, raw: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    fn get(&self, path: &str) -> String {
        self.request(&format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path))
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

fn assert_fixed_headers(response: &str) {
    for header in FIXED_HEADERS {
        assert!(
            response.contains(&format!("\r\n{}\r\n", header)),
            "missing {:?} in {:?}",
            header,
            response
        );
    }
}

fn header_block(response: &str) -> &str {
    response.split("\r\n\r\n").next().unwrap()
}

#[test]
fn serves_index_html_with_fixed_headers() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    let server = RunningServer::start(dir.path());

    let response = server.get("/index.html");

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(header_block(&response).contains("\r\nContent-Type: text/html\r\n"));
    assert!(response.ends_with("\r\n\r\n<h1>hello</h1>"));
    assert_fixed_headers(&response);
}

#[test]
fn corrected_types_for_scripts_and_data() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("main.js"), "export {}").unwrap();
    fs::write(dir.path().join("worker.mjs"), "export {}").unwrap();
    fs::write(dir.path().join("config.json"), "{}").unwrap();
    fs::write(dir.path().join("site.css"), "body{}").unwrap();
    fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    let server = RunningServer::start(dir.path());

    for (path, mime) in [
        ("/main.js", "application/javascript"),
        ("/worker.mjs", "application/javascript"),
        ("/config.json", "application/json"),
        ("/site.css", "text/css"),
        ("/logo.png", "image/png"),
    ] {
        let response = server.get(path);
        assert!(
            header_block(&response).contains(&format!("\r\nContent-Type: {}\r\n", mime)),
            "{} -> {:?}",
            path,
            header_block(&response)
        );
    }
}

#[test]
fn error_responses_carry_fixed_headers() {
    let dir = tempdir().unwrap();
    let server = RunningServer::start(dir.path());

    let missing = server.get("/missing.js");
    assert!(missing.starts_with("HTTP/1.0 404 Not Found\r\n"));
    assert_fixed_headers(&missing);

    let unsupported = server.request("PUT /file.txt HTTP/1.1\r\n\r\n");
    assert!(unsupported.starts_with("HTTP/1.0 501 "));
    assert_fixed_headers(&unsupported);

    let garbage = server.request("nonsense\r\n\r\n");
    assert!(garbage.starts_with("HTTP/1.0 400 Bad Request\r\n"));
    assert_fixed_headers(&garbage);
}

#[test]
fn head_request_has_headers_only() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.js"), "let x = 1;").unwrap();
    let server = RunningServer::start(dir.path());

    let response = server.request("HEAD /app.js HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("\r\nContent-Length: 10\r\n"));
    assert!(response.ends_with("\r\n\r\n"));
    assert_fixed_headers(&response);
}

#[test]
fn server_keeps_serving_after_errors() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ok.txt"), "fine").unwrap();
    let server = RunningServer::start(dir.path());

    // Client that connects and leaves without sending a request.
    drop(TcpStream::connect(server.addr).unwrap());
    assert!(server.get("/nope").starts_with("HTTP/1.0 404"));

    let response = server.get("/ok.txt");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.ends_with("fine"));
}

#[test]
fn subdirectories_redirect_then_list() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets/app.js"), "").unwrap();
    let server = RunningServer::start(dir.path());

    let redirect = server.get("/assets");
    assert!(redirect.starts_with("HTTP/1.0 301 "));
    assert!(redirect.contains("\r\nLocation: /assets/\r\n"));
    assert_fixed_headers(&redirect);

    let listing = server.get("/assets/");
    assert!(listing.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(listing.contains("<a href=\"app.js\">app.js</a>"));
}

#[test]
fn stop_is_not_blocked_by_idle_client() {
    let dir = tempdir().unwrap();
    let server = RunningServer::start(dir.path());

    let idle = TcpStream::connect(server.addr).unwrap();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    drop(server);
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(idle);
}

#[test]
fn stopping_releases_the_port() {
    let dir = tempdir().unwrap();
    let server = RunningServer::start(dir.path());
    let addr = server.addr;
    drop(server);

    let rebound = std::net::TcpListener::bind(addr);
    assert!(rebound.is_ok(), "port {} still held: {:?}", addr.port(), rebound.err());
}
