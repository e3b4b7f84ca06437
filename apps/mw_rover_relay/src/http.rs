//! Just enough HTTP/1.0 for the rover's browser client: one request per
//! connection, bodies read by `Content-Length`, `Connection: close` always.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use mw_maestro_bridge::Dispatcher;
use mw_pinctrl_gpio::{GpioBank, RegisterWindow, parse_mask};
use thiserror::Error;

use crate::form;

pub const MAX_BODY: usize = 64 * 1024;
const MAX_LINE: u64 = 8 * 1024;
const MAX_HEADERS: usize = 64;

const COMMAND_PATH: &str = "/command/";
const GPIO_PATH: &str = "/gpio/";
const FORM_TYPE: &str = "application/x-www-form-urlencoded";
const HOME_FIELD: &str = "home";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("request body of {0} bytes is over the {MAX_BODY} byte limit")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target without its query string.
    pub path: String,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self, RequestError> {
        let line = read_line(reader)?;
        let mut parts = line.split_whitespace();
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(RequestError::Malformed("bad request line"));
        };
        if !version.starts_with("HTTP/") || parts.next().is_some() {
            return Err(RequestError::Malformed("bad request line"));
        }

        let mut headers = Vec::new();
        loop {
            let line = read_line(reader)?;
            if line.is_empty() {
                break;
            }
            if headers.len() == MAX_HEADERS {
                return Err(RequestError::Malformed("too many headers"));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(RequestError::Malformed("bad header line"))?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        let mut request = Request {
            method: method.to_string(),
            path: target.split('?').next().unwrap_or_default().to_string(),
            headers,
            body: Vec::new(),
        };

        let length = match request.header("content-length") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| RequestError::Malformed("bad content-length"))?,
            None => 0,
        };
        if length > MAX_BODY {
            return Err(RequestError::TooLarge(length));
        }
        request.body.resize(length, 0);
        reader.read_exact(&mut request.body)?;
        Ok(request)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, RequestError> {
    let mut buf = Vec::new();
    reader.by_ref().take(MAX_LINE).read_until(b'\n', &mut buf)?;
    if !buf.ends_with(b"\n") {
        return Err(if buf.len() as u64 == MAX_LINE {
            RequestError::Malformed("line too long")
        } else {
            RequestError::Malformed("truncated request")
        });
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| RequestError::Malformed("request head is not UTF-8"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    head_only: bool,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            head_only: false,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    fn not_found() -> Self {
        Self::text(404, "Banana Not Found.\n")
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> &str {
        self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Keep the headers of a GET answer but send no body.
    fn head_only(mut self) -> Self {
        self.head_only = true;
        self
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(
            out,
            "HTTP/1.0 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        )?;
        if !self.head_only {
            out.write_all(&self.body)?;
        }
        Ok(())
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Everything a connection handler needs, shared by all connection threads.
pub struct Relay<W: Write + Send, G: RegisterWindow> {
    dispatcher: Dispatcher<W>,
    gpio: Option<GpioBank<G>>,
    static_root: PathBuf,
}

impl<W: Write + Send, G: RegisterWindow> Relay<W, G> {
    pub fn new(dispatcher: Dispatcher<W>, gpio: Option<GpioBank<G>>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher,
            gpio,
            static_root: static_root.into(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<W> {
        &self.dispatcher
    }

    pub fn gpio(&self) -> Option<&GpioBank<G>> {
        self.gpio.as_ref()
    }

    pub fn handle(&self, request: &Request) -> Response {
        let response = match (request.method.as_str(), request.path.as_str()) {
            ("POST", COMMAND_PATH) => self.command(request),
            ("GET" | "HEAD", GPIO_PATH) => self.gpio_status(),
            ("POST", GPIO_PATH) => self.gpio_update(request),
            ("GET" | "HEAD", path) => self.static_file(path),
            ("POST", _) => Response::text(405, "Method Not Allowed\n"),
            (method, _) => Response::text(501, format!("{method} is not supported\n")),
        };
        if request.method == "HEAD" {
            response.head_only()
        } else {
            response
        }
    }

    fn command(&self, request: &Request) -> Response {
        if let Some(bad) = non_form_content_type(request) {
            return bad;
        }

        let mut failures = String::new();
        let mut device_failed = false;
        for (field, value) in form::parse(&request.body) {
            info!("command {field}: {value}");
            let result = if field == HOME_FIELD {
                self.dispatcher.go_home()
            } else {
                self.dispatcher.dispatch(&field, &value)
            };
            if let Err(e) = result {
                if !e.is_client_error() {
                    error!("command {field}={value} lost: {e}");
                    device_failed = true;
                }
                failures.push_str(&format!("{field}={value}: {e}\n"));
            }
        }

        if device_failed {
            Response::text(503, failures)
        } else if !failures.is_empty() {
            Response::text(400, failures)
        } else {
            Response::text(200, "OK\n")
        }
    }

    fn gpio_status(&self) -> Response {
        match &self.gpio {
            Some(bank) => Response::text(200, format!("{:#04x}\n", bank.read_input())),
            None => Response::not_found(),
        }
    }

    fn gpio_update(&self, request: &Request) -> Response {
        let Some(bank) = &self.gpio else {
            return Response::not_found();
        };
        if let Some(bad) = non_form_content_type(request) {
            return bad;
        }

        let mut failures = String::new();
        for (field, value) in form::parse(&request.body) {
            let mask = match parse_mask(&value) {
                Ok(mask) => mask,
                Err(e) => {
                    warn!("rejected gpio {field}={value:?}: {e}");
                    failures.push_str(&format!("{field}={value}: {e}\n"));
                    continue;
                }
            };
            match field.as_str() {
                "direction" => bank.set_direction(mask),
                "pullup" => bank.set_pullup(mask),
                "set" => bank.set_output(mask),
                "clear" => bank.clear_output(mask),
                "toggle" => bank.toggle_output(mask),
                "write" => bank.write_output(mask),
                _ => {
                    warn!("rejected gpio {field}={value:?}: unknown operation");
                    failures.push_str(&format!("{field}={value}: unknown gpio operation\n"));
                    continue;
                }
            }
            info!("gpio {field}: {mask:#04x}");
        }

        if failures.is_empty() {
            Response::text(200, format!("{:#04x}\n", bank.read_input()))
        } else {
            Response::text(400, failures)
        }
    }

    fn static_file(&self, path: &str) -> Response {
        let Some(relative) = static_path(path) else {
            return Response::not_found();
        };
        match std::fs::read(self.static_root.join(&relative)) {
            Ok(body) => Response::new(200, content_type(&relative), body),
            Err(e) => {
                debug!("static {path}: {e}");
                Response::not_found()
            }
        }
    }

    /// Close the serial line, then release the register window.
    pub fn shutdown(self) {
        if let Err(e) = self.dispatcher.close() {
            error!("closing {}: {e}", self.dispatcher.transport().name());
        }
        if let Some(bank) = self.gpio {
            bank.close();
        }
    }
}

fn non_form_content_type(request: &Request) -> Option<Response> {
    let content_type = request.header("content-type")?;
    if content_type.to_ascii_lowercase().starts_with(FORM_TYPE) {
        None
    } else {
        Some(Response::text(415, format!("expected {FORM_TYPE}, got {content_type}\n")))
    }
}

/// Map a request path onto the static tree. Only `MWRover.*` at the root and
/// anything under `www/` is served, and never through `..`.
fn static_path(path: &str) -> Option<PathBuf> {
    let relative = path.strip_prefix('/')?;
    if !(relative.starts_with("MWRover.") || relative.starts_with("www/")) {
        return None;
    }
    let mut out = PathBuf::new();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            p if p.contains('\\') => return None,
            p => out.push(p),
        }
    }
    Some(out)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Read one request from `stream`, answer it, and return.
///
/// I/O errors while reading (timeouts, resets) get no answer: the peer is
/// gone or too slow.
pub fn serve_connection<S, W, G>(relay: &Relay<W, G>, stream: &mut S) -> io::Result<()>
where
    S: Read + Write,
    W: Write + Send,
    G: RegisterWindow,
{
    let parsed = Request::read_from(&mut BufReader::new(&mut *stream));
    let response = match parsed {
        Ok(request) => {
            let response = relay.handle(&request);
            debug!(
                "{} {} -> {} ({})",
                request.method,
                request.path,
                response.status(),
                response.content_type()
            );
            response
        }
        Err(RequestError::Io(e)) => return Err(e),
        Err(e @ RequestError::TooLarge(_)) => Response::text(413, format!("{e}\n")),
        Err(e) => Response::text(400, format!("{e}\n")),
    };
    response.write_to(stream)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_maestro_bridge::SerialTransport;
    use mw_maestro_lib::PulseRange;
    use mw_pinctrl_gpio::SimulatedWindow;
    use mw_pinctrl_gpio::registers::DIN0;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Wire(Arc<Mutex<Vec<u8>>>);

    impl Wire {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct MemStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MemStream {
        fn new(request: &[u8]) -> Self {
            Self {
                input: Cursor::new(request.to_vec()),
                output: Vec::new(),
            }
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Read for MemStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MemStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn relay_with(gpio: Option<SimulatedWindow>, root: &Path) -> (Relay<Wire, SimulatedWindow>, Wire) {
        let wire = Wire::default();
        let dispatcher = Dispatcher::new(SerialTransport::new("test", wire.clone()), PulseRange::default());
        (Relay::new(dispatcher, gpio.map(GpioBank::new), root), wire)
    }

    fn relay() -> (Relay<Wire, SimulatedWindow>, Wire) {
        relay_with(None, Path::new("/nonexistent"))
    }

    fn request(method: &str, path: &str, body: &str) -> Request {
        Request {
            method: method.to_string(),
            path: path.to_string(),
            headers: vec![("content-type".into(), FORM_TYPE.into())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn body(response: &Response) -> String {
        String::from_utf8_lossy(response.body()).into_owned()
    }

    #[test]
    fn command_pairs_go_out_in_order() {
        let (relay, wire) = relay();
        let response = relay.handle(&request("POST", "/command/", "0=1500&home=&3=1000"));
        assert_eq!(response.status(), 200);
        assert_eq!(
            wire.bytes(),
            vec![0x84, 0x00, 0x70, 0x2E, 0xA2, 0x84, 0x03, 0x20, 0x1F]
        );
    }

    #[test]
    fn rejected_pairs_are_listed_and_the_rest_still_sent() {
        let (relay, wire) = relay();
        let response = relay.handle(&request("POST", "/command/", "1=1500&1=abc&200=1500&2=9000"));
        assert_eq!(response.status(), 400);
        assert_eq!(body(&response).lines().count(), 3);
        assert!(body(&response).contains("1=abc"));
        assert_eq!(wire.bytes(), vec![0x84, 0x01, 0x70, 0x2E]);
    }

    #[test]
    fn transport_failure_is_503() {
        let (relay, wire) = relay();
        relay.dispatcher().close().unwrap();
        let response = relay.handle(&request("POST", "/command/", "1=1500&x=1"));
        assert_eq!(response.status(), 503);
        assert!(wire.bytes().is_empty());
    }

    #[test]
    fn non_form_body_is_refused() {
        let (relay, wire) = relay();
        let mut req = request("POST", "/command/", r#"{"1": 1500}"#);
        req.headers = vec![("content-type".into(), "application/json".into())];
        assert_eq!(relay.handle(&req).status(), 415);
        assert!(wire.bytes().is_empty());
    }

    #[test]
    fn method_and_path_routing() {
        let (relay, _) = relay();
        assert_eq!(relay.handle(&request("POST", "/", "")).status(), 405);
        assert_eq!(relay.handle(&request("POST", "/command", "")).status(), 405);
        assert_eq!(relay.handle(&request("DELETE", "/command/", "")).status(), 501);
        assert_eq!(relay.handle(&request("GET", "/", "")).status(), 404);
        assert_eq!(relay.handle(&request("GET", "/gpio/", "")).status(), 404);
    }

    #[test]
    fn static_files_are_confined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MWRover.html"), "<html></html>").unwrap();
        std::fs::create_dir(dir.path().join("www")).unwrap();
        std::fs::write(dir.path().join("www/MWRover.js"), "var x;").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "no").unwrap();
        let (relay, _) = relay_with(None, dir.path());

        let page = relay.handle(&request("GET", "/MWRover.html", ""));
        assert_eq!(page.status(), 200);
        assert_eq!(page.content_type(), "text/html; charset=utf-8");
        assert_eq!(body(&page), "<html></html>");

        let script = relay.handle(&request("GET", "/www/MWRover.js", ""));
        assert_eq!(script.status(), 200);
        assert_eq!(script.content_type(), "application/javascript");

        for path in ["/secret.txt", "/www/../secret.txt", "/MWRover.html/../secret.txt", "/www/missing.js"] {
            assert_eq!(relay.handle(&request("GET", path, "")).status(), 404, "{path}");
        }
    }

    #[test]
    fn head_keeps_length_but_drops_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MWRover.css"), "body {}").unwrap();
        let (relay, _) = relay_with(None, dir.path());
        let response = relay.handle(&request("HEAD", "/MWRover.css", ""));
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Content-Length: 7\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn gpio_reads_live_input() {
        let mut window = SimulatedWindow::new();
        window.preload(DIN0.offset, 0xFFFF_FF5A);
        let (relay, _) = relay_with(Some(window), Path::new("."));
        let response = relay.handle(&request("GET", "/gpio/", ""));
        assert_eq!(response.status(), 200);
        assert_eq!(body(&response), "0x5a\n");
    }

    #[test]
    fn gpio_operations_apply_in_order() {
        let (relay, _) = relay_with(Some(SimulatedWindow::new()), Path::new("."));
        let response = relay.handle(&request(
            "POST",
            "/gpio/",
            "direction=0x0F&write=0b0110&set=0x01&toggle=0x02&bogus=1&clear=oops",
        ));
        assert_eq!(response.status(), 400);
        assert_eq!(body(&response).lines().count(), 2);

        let bank = relay.gpio().unwrap();
        assert_eq!(bank.direction(), 0x0F);
        assert_eq!(bank.output(), 0b0101);
    }

    #[test]
    fn whole_exchange_over_a_stream() {
        let (relay, wire) = relay();
        let mut stream = MemStream::new(
            b"POST /command/?from=ui HTTP/1.1\r\n\
              Host: rover\r\n\
              Content-Type: application/x-www-form-urlencoded\r\n\
              Content-Length: 6\r\n\
              \r\n\
              3=1500",
        );
        serve_connection(&relay, &mut stream).unwrap();
        assert!(stream.output().starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(stream.output().contains("Connection: close\r\n"));
        assert_eq!(wire.bytes(), vec![0x84, 0x03, 0x70, 0x2E]);
    }

    #[test]
    fn garbage_and_oversized_requests() {
        let (relay, wire) = relay();

        let mut stream = MemStream::new(b"GARBAGE\r\n\r\n");
        serve_connection(&relay, &mut stream).unwrap();
        assert!(stream.output().starts_with("HTTP/1.0 400 Bad Request\r\n"));

        let mut stream = MemStream::new(b"POST /command/ HTTP/1.0\r\nContent-Length: 999999\r\n\r\n");
        serve_connection(&relay, &mut stream).unwrap();
        assert!(stream.output().starts_with("HTTP/1.0 413 "));

        let mut stream = MemStream::new(b"POST /command/ HTTP/1.0\r\nContent-Length: 10\r\n\r\n1=15");
        assert!(serve_connection(&relay, &mut stream).is_err());
        assert!(stream.output().is_empty());

        assert!(wire.bytes().is_empty());
    }

    #[test]
    fn request_head_parsing() {
        let raw = b"GET /www/a.js?v=3 HTTP/1.1\r\nACCEPT:  */*\r\nX-Empty:\r\n\r\n";
        let req = Request::read_from(&mut &raw[..]).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/www/a.js");
        assert_eq!(req.header("Accept"), Some("*/*"));
        assert_eq!(req.header("x-empty"), Some(""));
        assert!(req.body.is_empty());
    }
}
