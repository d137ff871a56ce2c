//! Shared fixtures for offthread-io: PNG bytes and a local HTTP server.
#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use image::{ImageFormat, Rgba, RgbaImage};

/// Solid-colored PNG.
pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encoding should succeed");
    bytes
}

/// Serve fixtures on `127.0.0.1:0`:
///
/// - `/red.png`, `/blue.png`: small PNGs
/// - `/missing.png`: 404
/// - `/broken.png`: 200 with a non-image body
/// - `/huge.bin`: 200 with a 64 KiB body
pub async fn spawn_image_server() -> SocketAddr {
    let red = png_bytes(4, 3, [255, 0, 0, 255]);
    let blue = png_bytes(2, 2, [0, 0, 255, 255]);
    let app = Router::new()
        .route(
            "/red.png",
            get(move || async move { ([(header::CONTENT_TYPE, "image/png")], red) }),
        )
        .route(
            "/blue.png",
            get(move || async move { ([(header::CONTENT_TYPE, "image/png")], blue) }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route("/broken.png", get(|| async { "<html>not an image</html>" }))
        .route("/huge.bin", get(|| async { vec![0_u8; 64 * 1024] }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
