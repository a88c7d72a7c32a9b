//! Fire-and-forget URL actions

use std::time::Duration;

use tracing::{info, warn};

use crate::error::ActionError;

/// GET `url` and report the status code. Non-2xx is logged, not an error.
///
/// Builds a blocking client per call so no client outlives the thread
/// that made it.
pub fn open_url(url: &str, limit: Duration) -> Result<u16, ActionError> {
    let client = reqwest::blocking::Client::builder().timeout(limit).build()?;
    let response = client.get(url).send()?;
    let status = response.status();

    if status.is_success() {
        info!(url, status = status.as_u16(), "url action completed");
    } else {
        warn!(url, status = status.as_u16(), "url action returned non-success status");
    }

    Ok(status.as_u16())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Serve one canned HTTP response on a local port
    fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/")
    }

    #[test]
    fn test_success_status() {
        let url = serve_once("HTTP/1.1 200 OK");
        assert_eq!(open_url(&url, Duration::from_secs(5)).unwrap(), 200);
    }

    #[test]
    fn test_error_status_is_not_a_failure() {
        let url = serve_once("HTTP/1.1 404 Not Found");
        assert_eq!(open_url(&url, Duration::from_secs(5)).unwrap(), 404);
    }

    #[test]
    fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = open_url(&format!("http://{addr}/"), Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, ActionError::Http(_)));
    }
}
