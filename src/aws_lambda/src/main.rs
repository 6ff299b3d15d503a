use classify_serve::{Config, Handler, TensorFlowClassifier};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use log::debug;
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = Config::load()?;
    let classifier = Arc::new(TensorFlowClassifier::new(&config)?);
    let handler = Handler::from_config(classifier, &config)?;

    debug!("Loaded model in memory");

    let handler_ref = &handler;

    debug!("Dispatching handler");
    run(service_fn(move |event: Request| async move {
        handle_request(event, handler_ref).await
    }))
    .await?;

    Ok(())
}

async fn handle_request(event: Request, handler: &Handler) -> Result<Response<Body>, Error> {
    debug!("Received request: {:#?}", event);

    let reply = handler.handle(event.body().as_ref()).await;

    let response = Response::builder()
        .status(reply.status)
        .header("content-type", TEXT_PLAIN)
        .body(Body::from(reply.body))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify_serve::test_support::{ColorClassifier, ImageHost};
    use classify_serve::Fetcher;
    use std::time::Duration;

    fn handler() -> Handler {
        let fetcher = Fetcher::new(Duration::from_secs(2), 0, Duration::from_millis(10)).unwrap();
        Handler::new(Arc::new(ColorClassifier::default()), fetcher)
    }

    fn body_text(resp: &Response<Body>) -> String {
        String::from_utf8_lossy(resp.body().as_ref()).into_owned()
    }

    #[tokio::test]
    async fn missing_url_is_400() {
        let resp = handle_request(Request::new(Body::from("{}")), &handler())
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        assert_eq!(resp.headers()["content-type"], TEXT_PLAIN);
    }

    #[tokio::test]
    async fn classifies_downloaded_image() {
        let host = ImageHost::start().await;
        let url = host.url("/blue.png");
        let event = Request::new(Body::from(format!(r#"{{"url": "{url}"}}"#)));

        let resp = handle_request(event, &handler()).await.unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], TEXT_PLAIN);
        assert_eq!(
            body_text(&resp),
            format!("request_json['url']: {url}, pred_class: black")
        );
    }

    #[tokio::test]
    async fn failed_download_keeps_legacy_text() {
        let host = ImageHost::start().await;
        let url = host.url("/missing");
        let event = Request::new(Body::from(format!(r#"{{"url": "{url}"}}"#)));

        let resp = handle_request(event, &handler()).await.unwrap();

        assert_eq!(resp.status(), 502);
        assert_eq!(body_text(&resp), format!("Image download failed, url: {url}"));
    }
}
