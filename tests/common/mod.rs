#![allow(dead_code)]

use std::io::Cursor;

use chrono::{DateTime, Utc};
use corroscan_lib::db::{AnalysisStatus, CorrosionAnalysis};
use image::{ImageFormat, Rgb, RgbImage};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = if (x + y) % 3 == 0 {
            Rgb([160, 70, 30])
        } else {
            Rgb([15, 15, 15])
        };
    }
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn analysis(
    id: &str,
    percentage: f64,
    status: AnalysisStatus,
    created_at: DateTime<Utc>,
) -> CorrosionAnalysis {
    CorrosionAnalysis {
        id: id.to_string(),
        image_url: format!("/images/{id}.jpg"),
        thumbnail_url: None,
        original_filename: format!("{id}.jpg"),
        corrosion_percentage: percentage,
        confidence_score: Some(0.9),
        pixels_total: 1000,
        pixels_corroded: (percentage * 10.0).round() as u64,
        status,
        operator: "Inspector One".to_string(),
        piece_type: "Bolt M8".to_string(),
        batch_id: None,
        notes: None,
        roi: None,
        overlay_url: None,
        isolated_url: None,
        created_at,
        updated_at: created_at,
        approved_at: None,
        approved_by: None,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}

/// One-shot HTTP server: accepts a single request, answers with `status` and
/// a JSON `body`, and hands back the raw request bytes.
pub async fn stub_service(status: u16, body: String) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let read = stream.read(&mut buf).await.expect("read request");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);

            if let Some(end) = find(&request, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_string();
                let body_len = request.len() - (end + 4);
                match content_length(&head) {
                    Some(expected) if body_len >= expected => break,
                    None if request.ends_with(b"0\r\n\r\n") => break,
                    _ => {}
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        stream.shutdown().await.ok();
        request
    });

    (format!("http://{addr}/analyze"), handle)
}

/// Accepts one connection, reads the request and never answers.
pub async fn silent_service() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 8192];
        while let Ok(read) = stream.read(&mut buf).await {
            if read == 0 {
                break;
            }
        }
    });

    (format!("http://{addr}/analyze"), handle)
}
