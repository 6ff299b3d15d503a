//! Local image host and stub classifier for tests of this crate and its hosts.

use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::classifier::{Classification, Classifier};
use crate::error::Result;

pub fn png(color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Serves:
/// - `/red.png`, `/blue.png`: 200 with a PNG of that colour
/// - `/page.html`: 200 with HTML
/// - `/missing`: 404
/// - `/boom`: 500
/// - `/slow`: 200 after 500 ms
pub struct ImageHost {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl ImageHost {
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let make_service = make_service_fn(move |_conn| {
            let counter = Arc::clone(&counter);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| route(req, Arc::clone(&counter))))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
        let addr = server.local_addr();
        tokio::spawn(server);

        ImageHost { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn route(
    req: Request<Body>,
    hits: Arc<AtomicUsize>,
) -> std::result::Result<Response<Body>, Infallible> {
    hits.fetch_add(1, Ordering::SeqCst);

    let response = match req.uri().path() {
        "/red.png" => Response::new(Body::from(png([220, 10, 10]))),
        "/blue.png" => Response::new(Body::from(png([10, 10, 220]))),
        "/page.html" => Response::new(Body::from("<html><body>not a bear</body></html>")),
        "/boom" => status(StatusCode::INTERNAL_SERVER_ERROR),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Response::new(Body::from(png([0, 0, 0])))
        }
        _ => status(StatusCode::NOT_FOUND),
    };

    Ok(response)
}

fn status(code: StatusCode) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = code;
    resp
}

/// Calls an image "grizzly" when its top-left pixel is mostly red, "black" otherwise.
#[derive(Default)]
pub struct ColorClassifier {
    calls: AtomicUsize,
}

impl ColorClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ColorClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let px = image.to_rgb8().get_pixel(0, 0).0;
        let tag = if px[0] > px[2] { "grizzly" } else { "black" };

        Ok(Classification {
            tag: tag.to_owned(),
            probability: 0.9,
            ..Default::default()
        })
    }
}
