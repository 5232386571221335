// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loopback HTTP server with canned responses for download tests. Paths
//! without a route answer 404.

use std::collections::HashMap;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

#[derive(Debug, Clone)]
pub struct Route {
    status: u16,
    body: Vec<u8>,
    /// Advertise more bytes than are sent, then hang up.
    truncated: bool,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            truncated: false,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            truncated: false,
        }
    }

    pub fn truncated(body: impl Into<Vec<u8>>) -> Self {
        Self {
            truncated: true,
            ..Self::ok(body)
        }
    }
}

pub struct LocalServer {
    base: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl LocalServer {
    /// Serves `routes` from a background thread until the test process
    /// exits.
    pub fn serve(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let routes: HashMap<String, Route> = routes
            .into_iter()
            .map(|(path, route)| (path.to_string(), route))
            .collect();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = respond(stream, &routes, &seen);
            }
        });
        Self { base, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Requested paths, in arrival order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().expect("hits lock").clone()
    }
}

/// Records the path before answering, so a client that has seen the
/// response also sees the hit.
fn respond(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    hits: &Mutex<Vec<String>>,
) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 || header == "\r\n" {
            break;
        }
    }

    hits.lock().expect("hits lock").push(path.clone());

    let missing = Route::status(404);
    let route = routes.get(&path).unwrap_or(&missing);
    let advertised = route.body.len() + if route.truncated { 64 } else { 0 };
    let head = format!(
        "HTTP/1.1 {} Fixture\r\nContent-Length: {advertised}\r\nConnection: close\r\n\r\n",
        route.status
    );
    stream.write_all(head.as_bytes()).ok()?;
    stream.write_all(&route.body).ok()?;
    stream.flush().ok()
}
