use classify_serve::{Config, Handler, TensorFlowClassifier};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use log::{debug, error, info};
use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

fn text(status: u16, body: String) -> Response<Body> {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    resp
}

async fn handle(req: Request<Body>, handler: Arc<Handler>) -> Result<Response<Body>, Infallible> {
    debug!("{} {}", req.method(), req.uri());

    if req.method() == Method::GET && req.uri().path() == "/healthz" {
        return Ok(text(200, "ok".to_owned()));
    }

    let raw_route = req.uri().path() == "/raw";

    let raw = match body::to_bytes(req.into_body()).await {
        Ok(raw) => raw,
        Err(err) => return Ok(text(400, format!("Could not read request body: {}", err))),
    };

    if !raw_route {
        let reply = handler.handle(&raw).await;
        return Ok(text(reply.status, reply.body));
    }

    let response = match handler.classify_bytes(raw.to_vec()).await {
        Err(err) => text(err.status(), format!("Classification failure: '{}'", err)),
        Ok(result) => match serde_json::to_string(&result) {
            Ok(json) => {
                let mut resp = Response::new(Body::from(json));
                resp.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                resp
            }
            Err(err) => text(500, format!("Could not render classification: {}", err)),
        },
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = Config::load()?;
    let addr = config.socket_addr()?;

    let classifier = Arc::new(TensorFlowClassifier::new(&config)?);
    let handler = Arc::new(Handler::from_config(classifier, &config)?);

    debug!("Loaded model in memory");

    let make_service = make_service_fn(move |_conn: &AddrStream| {
        // Every connection gets its own handle on the shared handler.
        let handler = Arc::clone(&handler);

        let service = service_fn(move |req| handle(req, Arc::clone(&handler)));

        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);
    info!("Listening on http://{}", addr);

    if let Err(e) = server.await {
        error!("server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify_serve::{Classification, Classifier, Fetcher};
    use std::time::Duration;

    struct Fixed;

    impl Classifier for Fixed {
        fn classify(&self, _: &image::DynamicImage) -> classify_serve::Result<Classification> {
            Ok(Classification {
                tag: "teddy".to_owned(),
                probability: 1.0,
                ..Default::default()
            })
        }
    }

    fn handler() -> Arc<Handler> {
        let fetcher = Fetcher::new(Duration::from_secs(1), 0, Duration::from_millis(1)).unwrap();
        Arc::new(Handler::new(Arc::new(Fixed), fetcher))
    }

    async fn body_text(resp: Response<Body>) -> String {
        let raw = body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(raw.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let req = Request::get("/healthz").body(Body::empty()).unwrap();
        let resp = handle(req, handler()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn missing_url_is_400() {
        let req = Request::post("/").body(Body::from("{}")).unwrap();
        let resp = handle(req, handler()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()[CONTENT_TYPE], TEXT_PLAIN);
    }

    #[tokio::test]
    async fn raw_route_returns_json() {
        let img = image::DynamicImage::new_rgb8(4, 4);
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let req = Request::post("/raw")
            .body(Body::from(png.into_inner()))
            .unwrap();
        let resp = handle(req, handler()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["tag"], "teddy");
    }

    #[tokio::test]
    async fn raw_route_rejects_garbage() {
        let req = Request::post("/raw").body(Body::from("garbage")).unwrap();
        let resp = handle(req, handler()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
