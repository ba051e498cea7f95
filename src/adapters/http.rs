//! HTTP transport adapter: a connection-build iterator plus a chunked/
//! content-length body transfer iterator, split the same way a read-phase/
//! write-phase connection handler would be.

use std::io::{ErrorKind, Read, Write};
use std::net::ToSocketAddrs;

use mio::net::TcpStream;

pub trait HttpConnection: Send {
    /// `connection_iterate` — returns `true` when the connection attempt
    /// has settled (connected or fused error).
    fn iterate(&mut self) -> bool;

    /// `connection_done`.
    fn is_done(&self) -> bool;
}

pub trait HttpTransfer: Send {
    /// `update` — returns `true` when the transfer is complete.
    fn update(&mut self, pos: &mut usize, total: &mut usize) -> bool;

    /// `data`.
    fn data(&mut self, accept_incomplete: bool) -> Option<Vec<u8>>;
}

pub trait HttpBackend: Send + Sync {
    type Connection: HttpConnection;
    type Transfer: HttpTransfer;

    fn connection_new(&self, url: &str) -> Option<Self::Connection>;
    fn new_transfer(&self, connection: Self::Connection) -> Option<Self::Transfer>;
}

fn parse_http_url(url: &str) -> Option<(String, u16, String)> {
    let rest = url.strip_prefix("http://")?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.parse().ok()?),
        None => (authority.to_string(), 80u16),
    };
    Some((host, port, path.to_string()))
}

pub struct MioHttpConnection {
    stream: Option<TcpStream>,
    host: String,
    path: String,
    request_written: bool,
    settled: bool,
}

impl HttpConnection for MioHttpConnection {
    fn iterate(&mut self) -> bool {
        if self.settled {
            return true;
        }
        let host = self.host.clone();
        let path = self.path.clone();
        let Some(stream) = self.stream.as_mut() else {
            self.settled = true;
            return true;
        };
        let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        match stream.write(request.as_bytes()) {
            Ok(_) => {
                self.request_written = true;
                self.settled = true;
                true
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(_) => {
                self.settled = true;
                true
            }
        }
    }

    fn is_done(&self) -> bool {
        self.settled && self.request_written
    }
}

pub struct MioHttpTransfer {
    stream: TcpStream,
    raw: Vec<u8>,
    header_end: Option<usize>,
    content_length: Option<usize>,
    chunked: bool,
    body: Vec<u8>,
    done: bool,
}

impl MioHttpTransfer {
    fn try_parse_headers(&mut self) {
        if self.header_end.is_some() {
            return;
        }
        let Some(pos) = find_subsequence(&self.raw, b"\r\n\r\n") else { return };
        self.header_end = Some(pos + 4);
        let header_text = String::from_utf8_lossy(&self.raw[..pos]);
        for line in header_text.lines().skip(1) {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim();
                if name == "content-length" {
                    self.content_length = value.parse().ok();
                } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
                    self.chunked = true;
                }
            }
        }
        self.body = self.raw[self.header_end.unwrap()..].to_vec();
    }

    fn decode_chunked(&mut self) {
        let mut decoded = Vec::new();
        let mut cursor = 0usize;
        loop {
            let Some(line_end) = find_subsequence(&self.body[cursor..], b"\r\n") else { break };
            let size_line = String::from_utf8_lossy(&self.body[cursor..cursor + line_end]).to_string();
            let Ok(size) = usize::from_str_radix(size_line.trim(), 16) else { break };
            let data_start = cursor + line_end + 2;
            if size == 0 {
                self.done = true;
                break;
            }
            if data_start + size > self.body.len() {
                break; // incomplete chunk, wait for more bytes
            }
            decoded.extend_from_slice(&self.body[data_start..data_start + size]);
            cursor = data_start + size + 2; // skip trailing CRLF
        }
        if self.done {
            self.body = decoded;
        }
    }

    fn append(&mut self, chunk: &[u8]) {
        self.raw.extend_from_slice(chunk);
        self.try_parse_headers();
        if self.header_end.is_none() {
            return;
        }
        self.body = self.raw[self.header_end.unwrap()..].to_vec();
        if self.chunked {
            self.decode_chunked();
        } else if let Some(total) = self.content_length {
            if self.body.len() >= total {
                self.body.truncate(total);
                self.done = true;
            }
        }
    }
}

impl HttpTransfer for MioHttpTransfer {
    fn update(&mut self, pos: &mut usize, total: &mut usize) -> bool {
        if !self.done {
            let mut chunk = [0u8; 4096];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if self.chunked {
                        // Connection closed before a terminating 0-chunk:
                        // fused with done, per the same success/error
                        // fusion NBIO uses.
                        self.decode_chunked();
                    }
                    self.done = true;
                }
                Ok(n) => self.append(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(_) => self.done = true,
            }
        }
        *pos = self.body.len();
        *total = self.content_length.unwrap_or(self.body.len());
        self.done
    }

    fn data(&mut self, accept_incomplete: bool) -> Option<Vec<u8>> {
        if self.done || accept_incomplete {
            Some(self.body.clone())
        } else {
            None
        }
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub struct MioHttpBackend;

impl HttpBackend for MioHttpBackend {
    type Connection = MioHttpConnection;
    type Transfer = MioHttpTransfer;

    fn connection_new(&self, url: &str) -> Option<Self::Connection> {
        let (host, port, path) = parse_http_url(url)?;
        let addr = (host.as_str(), port).to_socket_addrs().ok()?.next()?;
        let stream = TcpStream::connect(addr).ok()?;
        Some(MioHttpConnection { stream: Some(stream), host, path, request_written: false, settled: false })
    }

    fn new_transfer(&self, mut connection: Self::Connection) -> Option<Self::Transfer> {
        let stream = connection.stream.take()?;
        Some(MioHttpTransfer {
            stream,
            raw: Vec::new(),
            header_end: None,
            content_length: None,
            chunked: false,
            body: Vec::new(),
            done: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        assert_eq!(
            parse_http_url("http://example.com:8080/list"),
            Some(("example.com".to_string(), 8080, "/list".to_string()))
        );
        assert_eq!(
            parse_http_url("http://example.com"),
            Some(("example.com".to_string(), 80, "/".to_string()))
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert_eq!(parse_http_url("https://example.com"), None);
    }

    #[test]
    fn finds_header_terminator() {
        let haystack = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi";
        assert_eq!(find_subsequence(haystack, b"\r\n\r\n"), Some(34));
    }
}
