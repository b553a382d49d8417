use std::future::Future;

use serde_json::Value;
use slog::{debug,o};

use super::config::Config;
use super::error::{Result,Error};
use super::indicators::Indicators;
use super::logging::DEFAULT;


/// Where one refresh cycle gets its raw inputs from.
pub trait Sources: Send + Sync + 'static {
    fn cases(&self) -> impl Future<Output = Result<String>> + Send;
    fn persons(&self) -> impl Future<Output = Result<String>> + Send;
    fn predictions(&self) -> impl Future<Output = Result<Value>> + Send;

    /// Indicator series beyond the case feeds. Sources without them report
    /// `MissingData`.
    fn indicators(&self) -> impl Future<Output = Result<Indicators>> + Send {
	async { Err(Error::MissingData) }
    }
}


pub struct HttpSources {
    client: reqwest::Client,
    cases_url: Option<String>,
    persons_url: Option<String>,
    predictions_url: Option<String>,
}

impl HttpSources {

    pub fn new(config: &Config) -> Self {
	HttpSources {
	    client: reqwest::Client::new(),
	    cases_url: config.cases_url.clone(),
	    persons_url: config.persons_url.clone(),
	    predictions_url: config.predictions_url.clone(),
	}
    }

    async fn get(&self, url: Option<&str>) -> Result<reqwest::Response> {
	let url = url.ok_or(Error::MissingData)?;
	debug!(DEFAULT.new(o!("url" => url.to_string())), "Downloading...");
	let res = self.client.get(url).send().await?;
	match res.status().is_success() {
	    true => Ok(res),
	    false => Err(Error::HttpError(res.status())),
	}
    }

    /// Feeds are decoded leniently; a BOM selects the encoding.
    async fn text(&self, url: Option<&str>) -> Result<String> {
	let bytes = self.get(url).await?.bytes().await?;
	let (text,_,_) = encoding_rs::UTF_8.decode(&bytes);
	Ok(text.into_owned())
    }

}

impl Sources for HttpSources {

    async fn cases(&self) -> Result<String> {
	self.text(self.cases_url.as_deref()).await
    }

    async fn persons(&self) -> Result<String> {
	self.text(self.persons_url.as_deref()).await
    }

    async fn predictions(&self) -> Result<Value> {
	Ok(self.get(self.predictions_url.as_deref()).await?.json().await?)
    }

}
