use anyhow::{anyhow, bail, Context as _, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::protocol::StreamMessage;
use crate::ingest::{Ack, IngestRequest};
use crate::location::UpdateEvent;

const VIEWER_BUFFER: usize = 256;

/// Connect to a server's stream endpoint as a viewer.
///
/// Returns a receiver yielding every `new_location` event (the replayed
/// snapshot first, then live updates) and the JoinHandle of the background
/// task reading the socket. The receiver closes when the connection ends.
pub async fn connect_viewer(url: &str) -> Result<(mpsc::Receiver<UpdateEvent>, JoinHandle<()>)> {
    let url = Url::parse(url).map_err(|e| anyhow!("invalid ws url: {e}"))?;
    let (mut ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let (tx, rx) = mpsc::channel(VIEWER_BUFFER);

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<StreamMessage>(text.as_str()) {
                        Ok(message) => {
                            if tx.send(message.into_event()).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "Ignoring unrecognised stream frame");
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    Ok((rx, reader))
}

/// Resolve the ingest endpoint below `base_url`, keeping any path prefix.
fn ingest_endpoint(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).map_err(|e| anyhow!("invalid server url: {e}"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("update_location")?)
}

/// Send one location update to a server's ingest endpoint.
pub async fn push_update(base_url: &str, request: &IngestRequest) -> Result<Ack> {
    let endpoint = ingest_endpoint(base_url)?;

    let response = reqwest::Client::new()
        .post(endpoint)
        .json(request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("server rejected update ({status}): {body}");
    }

    Ok(response.json::<Ack>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_endpoint() {
        assert_eq!(
            ingest_endpoint("http://127.0.0.1:5000").unwrap().as_str(),
            "http://127.0.0.1:5000/update_location"
        );
        assert_eq!(
            ingest_endpoint("https://example.org/tracking").unwrap().as_str(),
            "https://example.org/tracking/update_location"
        );
        assert_eq!(
            ingest_endpoint("https://example.org/tracking/").unwrap().as_str(),
            "https://example.org/tracking/update_location"
        );
        assert!(ingest_endpoint("not a url").is_err());
    }
}
