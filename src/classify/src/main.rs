use classify_serve::{
    prediction_text, ClassifyRequest, Config, Handler, TensorFlowClassifier,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "classify",
    about = "CLI app to classify the image behind a URL with TensorFlow"
)]
struct CmdArgs {
    #[structopt(long, help = "Export directory of TensorFlow SavedModel")]
    model_dir: Option<PathBuf>,

    #[structopt(long, help = "Path to labels file")]
    labels: Option<PathBuf>,

    #[structopt(help = "URL to fetch image from")]
    image_url: String,
}

/// One invocation against `image_url`, returning the reply text
async fn classify(handler: &Handler, image_url: String) -> classify_serve::Result<String> {
    let request = ClassifyRequest::from_url(image_url)?;
    let classification = handler.classify_url(&request.url).await?;

    if let Ok(json) = serde_json::to_string(&classification) {
        info!("{}", json);
    }

    Ok(prediction_text(&request.url, &classification.tag))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let mut config = Config::load()?;
    if let Some(model_dir) = args.model_dir {
        config.model_dir = model_dir;
    }
    if let Some(labels) = args.labels {
        config.labels_path = labels;
    }

    let classifier = Arc::new(TensorFlowClassifier::new(&config)?);
    let handler = Handler::from_config(classifier, &config)?;

    match classify(&handler, args.image_url).await {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(err) => {
            println!("{}", err);
            Err(err.into())
        }
    }
}
