// ABOUTME: Socket backend speaking the Podman libpod REST API over unix or tcp sockets.
// ABOUTME: Full-API adapter: every capability is supported, including pods and streams.

pub(crate) mod logs;
mod native;
mod pod_stats;

use crate::model::{
    ContainerDetails, ContainerSummary, Event, ImageDetails, ImageHistoryEntry, ImageSummary,
    LogLine, LogOptions, NetworkSummary, PodStatsEntry, PodSummary, PruneReport, RemoveOptions,
    StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::http::{ByteLines, Endpoint, EngineHttp, HttpError};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode, ErrorCode, error::must_stop_message};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use futures::StreamExt;
use hyper::Method;
use logs::LogDecoder;
use native::{
    EventMessage, HistoryItem, InspectContainer, InspectImage, ListContainer, ListImage,
    ListNetwork, ListPod, ListVolume, PruneItem, StatsReport, prune_report,
};
use pod_stats::PodStatsReport;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Versioned prefix for every libpod endpoint.
const LIBPOD: &str = "/v4.0.0/libpod";

/// Interval between pod stats samples when streaming.
const POD_STATS_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_transport_error(e: HttpError) -> BackendError {
    match e {
        HttpError::Connect { endpoint, source } => BackendError::Connection {
            endpoint,
            reason: source.to_string(),
        },
        HttpError::Transport { endpoint, reason } => BackendError::Connection { endpoint, reason },
        HttpError::Decode { path, source } => BackendError::parse(path, source),
        HttpError::Status { status, message } => {
            BackendError::Runtime(format!("{message} (HTTP {status})"))
        }
    }
}

fn map_not_found_error(e: HttpError, kind: &'static str, id: &str) -> BackendError {
    match e {
        HttpError::Status { status, .. } if status == 404 => BackendError::NotFound {
            kind,
            id: id.to_string(),
        },
        _ => map_transport_error(e),
    }
}

fn map_state_change_error(e: HttpError, id: &ContainerId) -> BackendError {
    match e {
        HttpError::Status { status, message } if status == 304 => {
            BackendError::coded(ErrorCode::AlreadyInState, message)
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

fn map_container_remove_error(e: HttpError, id: &ContainerId) -> BackendError {
    match e {
        HttpError::Status { status, message } if status == 409 || must_stop_message(&message) => {
            BackendError::coded(ErrorCode::MustStopContainer, message)
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

fn map_top_error(e: HttpError, id: &ContainerId) -> BackendError {
    match e {
        HttpError::Status { status, message }
            if status == 409 || message.to_ascii_lowercase().contains("not running") =>
        {
            BackendError::coded(ErrorCode::ContainerNotRunning, message)
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(bytes).map_err(|e| BackendError::parse(what, e))
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn seconds(timeout: Option<Duration>) -> String {
    timeout
        .map(|t| format!("{}", t.as_secs()))
        .unwrap_or_else(|| "10".to_string())
}

/// Translate one stats line; empty reports yield nothing.
fn stats_entry(report: StatsReport) -> Result<Option<StatsEntry>, BackendError> {
    if let Some(err) = report.error.filter(|e| !e.is_null()) {
        let message = match err {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(BackendError::Runtime(message));
    }
    Ok(report.stats.into_iter().next().map(StatsEntry::from))
}

async fn fetch_pod_stats(http: &EngineHttp, pod: &str) -> Result<PodStatsEntry, BackendError> {
    let path = format!("{LIBPOD}/pods/stats?namesOrIDs={}", encode(pod));
    let reports: Vec<PodStatsReport> = http
        .get_json(&path)
        .await
        .map_err(|e| map_not_found_error(e, "pod", pod))?;
    Ok(pod_stats::aggregate(pod, &reports))
}

/// Lazily decode a log body into lines, flushing the tail at end of body.
fn log_lines(raw: ByteLines, decoder: LogDecoder) -> BackendStream<LogLine> {
    struct State {
        raw: ByteLines,
        decoder: LogDecoder,
        queue: VecDeque<LogLine>,
        done: bool,
    }

    let state = State {
        raw,
        decoder,
        queue: VecDeque::new(),
        done: false,
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some((Ok(line), state));
            }
            if state.done {
                return None;
            }
            match state.raw.next().await {
                Some(Ok(chunk)) => state.queue.extend(state.decoder.push(&chunk)),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(map_transport_error(e)), state));
                }
                None => {
                    state.done = true;
                    state.queue.extend(state.decoder.finish());
                }
            }
        }
    }))
}

// =============================================================================
// SocketRuntime
// =============================================================================

/// Runtime backed by a libpod API socket.
#[derive(Debug, Clone)]
pub struct SocketRuntime {
    http: EngineHttp,
}

impl SocketRuntime {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            http: EngineHttp::new(endpoint),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.http.endpoint()
    }

    fn path(rest: &str) -> String {
        format!("{LIBPOD}/{rest}")
    }

    async fn post<T: DeserializeOwned>(&self, rest: &str) -> Result<T, BackendError> {
        let path = Self::path(rest);
        let bytes = self
            .http
            .send(Method::POST, &path, None)
            .await
            .map_err(map_transport_error)?;
        decode(rest, &bytes)
    }
}

impl Sealed for SocketRuntime {}

#[async_trait]
impl ContainerOps for SocketRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        let raw: Vec<ListContainer> = self
            .http
            .get_json(&Self::path("containers/json?all=true"))
            .await
            .map_err(map_transport_error)?;
        Ok(raw.into_iter().filter_map(ListContainer::into_summary).collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        let path = Self::path(&format!("containers/{}/json", encode(id.as_str())));
        let raw: InspectContainer = self
            .http
            .get_json(&path)
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
        Ok(raw.into_details())
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        let path = Self::path(&format!("containers/{}/start", encode(id.as_str())));
        self.http
            .call(Method::POST, &path)
            .await
            .map_err(|e| map_state_change_error(e, id))
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let path = Self::path(&format!(
            "containers/{}/stop?timeout={}",
            encode(id.as_str()),
            seconds(timeout)
        ));
        self.http
            .call(Method::POST, &path)
            .await
            .map_err(|e| map_state_change_error(e, id))
    }

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        let path = Self::path(&format!("containers/{}/pause", encode(id.as_str())));
        self.http
            .call(Method::POST, &path)
            .await
            .map_err(|e| map_state_change_error(e, id))
    }

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        let path = Self::path(&format!("containers/{}/unpause", encode(id.as_str())));
        self.http
            .call(Method::POST, &path)
            .await
            .map_err(|e| map_state_change_error(e, id))
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let path = Self::path(&format!(
            "containers/{}/restart?t={}",
            encode(id.as_str()),
            seconds(timeout)
        ));
        self.http
            .call(Method::POST, &path)
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError> {
        let path = Self::path(&format!(
            "containers/{}?force={}&v={}",
            encode(id.as_str()),
            options.force,
            options.volumes
        ));
        self.http
            .call(Method::DELETE, &path)
            .await
            .map_err(|e| map_container_remove_error(e, id))
    }

    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Top {
            #[serde(default, deserialize_with = "crate::runtime::json::nullable")]
            titles: Vec<String>,
            #[serde(default, deserialize_with = "crate::runtime::json::nullable")]
            processes: Vec<Vec<String>>,
        }

        let path = Self::path(&format!("containers/{}/top", encode(id.as_str())));
        let top: Top = self
            .http
            .get_json(&path)
            .await
            .map_err(|e| map_top_error(e, id))?;
        Ok(TopResponse {
            titles: top.titles,
            processes: top.processes,
        })
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        let items: Vec<PruneItem> = self.post("containers/prune").await?;
        Ok(prune_report(items))
    }
}

#[async_trait]
impl ImageOps for SocketRuntime {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        let raw: Vec<ListImage> = self
            .http
            .get_json(&Self::path("images/json"))
            .await
            .map_err(map_transport_error)?;
        Ok(raw.into_iter().filter_map(ListImage::into_summary).collect())
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        let path = Self::path(&format!("images/{}/json", encode(id.as_str())));
        let raw: InspectImage = self
            .http
            .get_json(&path)
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))?;
        Ok(raw.into_details())
    }

    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        let path = Self::path(&format!("images/{}/history", encode(id.as_str())));
        let raw: Vec<HistoryItem> = self
            .http
            .get_json(&path)
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))?;
        Ok(raw.into_iter().map(ImageHistoryEntry::from).collect())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError> {
        let path = Self::path(&format!("images/{}?force={}", encode(id.as_str()), force));
        self.http
            .call(Method::DELETE, &path)
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        let items: Vec<PruneItem> = self.post("images/prune").await?;
        Ok(prune_report(items))
    }
}

#[async_trait]
impl VolumeOps for SocketRuntime {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        let raw: Vec<ListVolume> = self
            .http
            .get_json(&Self::path("volumes/json"))
            .await
            .map_err(map_transport_error)?;
        Ok(raw.into_iter().filter_map(ListVolume::into_summary).collect())
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        let body = serde_json::json!({ "Name": name });
        let raw: ListVolume = self
            .http
            .post_json(&Self::path("volumes/create"), &body)
            .await
            .map_err(map_transport_error)?;
        raw.into_summary()
            .ok_or_else(|| BackendError::parse("volume create response", "missing volume name"))
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError> {
        let path = Self::path(&format!("volumes/{}?force={}", encode(name), force));
        self.http
            .call(Method::DELETE, &path)
            .await
            .map_err(|e| map_not_found_error(e, "volume", name))
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        let items: Vec<PruneItem> = self.post("volumes/prune").await?;
        Ok(prune_report(items))
    }
}

#[async_trait]
impl NetworkOps for SocketRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        let raw: Vec<ListNetwork> = self
            .http
            .get_json(&Self::path("networks/json"))
            .await
            .map_err(map_transport_error)?;
        Ok(raw.into_iter().filter_map(ListNetwork::into_summary).collect())
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError> {
        let path = Self::path(&format!("networks/{}", encode(id.as_str())));
        self.http
            .call(Method::DELETE, &path)
            .await
            .map_err(|e| map_not_found_error(e, "network", id.as_str()))
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        let items: Vec<PruneItem> = self.post("networks/prune").await?;
        Ok(prune_report(items))
    }
}

#[async_trait]
impl PodOps for SocketRuntime {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        let raw: Vec<ListPod> = self
            .http
            .get_json(&Self::path("pods/json"))
            .await
            .map_err(map_transport_error)?;
        Ok(raw.into_iter().filter_map(ListPod::into_summary).collect())
    }

    async fn pod_stats(
        &self,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        let pod = id.as_str().to_string();
        match mode {
            StatsMode::OneShot => {
                let entry = fetch_pod_stats(&self.http, &pod).await?;
                Ok(Box::pin(futures::stream::once(async move { Ok(entry) })))
            }
            StatsMode::Continuous => {
                let ticker = tokio::time::interval(POD_STATS_INTERVAL);
                let stream = futures::stream::unfold(
                    (self.http.clone(), pod, ticker),
                    |(http, pod, mut ticker)| async move {
                        ticker.tick().await;
                        let item = fetch_pod_stats(&http, &pod).await;
                        Some((item, (http, pod, ticker)))
                    },
                )
                .take_until(cancel.cancelled_owned());
                Ok(Box::pin(stream))
            }
        }
    }
}

#[async_trait]
impl StatsOps for SocketRuntime {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        let streaming = mode == StatsMode::Continuous;
        let path = Self::path(&format!(
            "containers/stats?containers={}&stream={}&interval=1",
            encode(id.as_str()),
            streaming
        ));

        if !streaming {
            let report: StatsReport = self
                .http
                .get_json(&path)
                .await
                .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
            let entry = stats_entry(report)?;
            return Ok(Box::pin(futures::stream::iter(entry.map(Ok))));
        }

        let lines = self
            .http
            .stream_lines(&path)
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
        let stream = lines
            .take_until(cancel.cancelled_owned())
            .filter_map(|line| async move {
                match line {
                    Err(e) => Some(Err(map_transport_error(e))),
                    Ok(bytes) => match decode::<StatsReport>("stats report", &bytes) {
                        Ok(report) => stats_entry(report).transpose(),
                        Err(e) => Some(Err(e)),
                    },
                }
            });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl EventOps for SocketRuntime {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        let lines = self
            .http
            .stream_lines(&Self::path("events?stream=true"))
            .await
            .map_err(map_transport_error)?;
        let stream = lines.take_until(cancel.cancelled_owned()).map(|line| {
            let bytes = line.map_err(map_transport_error)?;
            let msg: EventMessage = decode("event", &bytes)?;
            Ok(Event::from(msg))
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl LogOps for SocketRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        // tty containers write an unframed body
        let details = self.inspect_container(id).await?;
        let tail = options
            .tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string());
        let path = Self::path(&format!(
            "containers/{}/logs?follow={}&stdout=true&stderr=true&timestamps={}&tail={}",
            encode(id.as_str()),
            options.follow,
            options.timestamps,
            tail
        ));
        let raw = self
            .http
            .stream_raw(&path)
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
        let lines = log_lines(raw, LogDecoder::new(!details.config.tty));
        Ok(Box::pin(lines.take_until(cancel.cancelled_owned())))
    }
}

#[async_trait]
impl RuntimeInfo for SocketRuntime {
    fn mode(&self) -> BackendMode {
        BackendMode::Socket
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.http
            .call(Method::GET, &Self::path("_ping"))
            .await
            .map_err(map_transport_error)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    fn respond(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serve one canned response and report the request line it received.
    fn serve_once(listener: UnixListener, response: String) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = conn.read(&mut buf).await.unwrap();
            conn.write_all(response.as_bytes()).await.unwrap();
            conn.shutdown().await.ok();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            request.lines().next().unwrap_or_default().to_string()
        })
    }

    fn runtime_at(dir: &tempfile::TempDir) -> (SocketRuntime, UnixListener) {
        let sock = dir.path().join("podman.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        (SocketRuntime::new(Endpoint::Unix(sock)), listener)
    }

    #[tokio::test]
    async fn list_containers_hits_libpod_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let body = r#"[{"Id":"abc","Names":["web"],"State":"running","Image":"nginx"},{"State":"exited"}]"#;
        let server = serve_once(listener, respond("200 OK", body));

        let containers = runtime.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id.as_str(), "abc");

        let request = server.await.unwrap();
        assert_eq!(request, "GET /v4.0.0/libpod/containers/json?all=true HTTP/1.1");
    }

    #[tokio::test]
    async fn start_on_running_container_is_already_in_state() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let _server = serve_once(listener, respond("304 Not Modified", ""));

        let err = runtime
            .start_container(&ContainerId::new("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AlreadyInState));
    }

    #[tokio::test]
    async fn removing_running_container_is_must_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let body = r#"{"cause":"container state improper","message":"cannot remove container abc as it is running - running or paused containers cannot be removed without force: container state improper","response":409}"#;
        let _server = serve_once(listener, respond("409 Conflict", body));

        let err = runtime
            .remove_container(&ContainerId::new("abc"), RemoveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MustStopContainer));
    }

    #[tokio::test]
    async fn inspect_missing_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let body = r#"{"message":"no such container","response":404}"#;
        let _server = serve_once(listener, respond("404 Not Found", body));

        let err = runtime
            .inspect_container(&ContainerId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { kind: "container", .. }));
    }

    #[tokio::test]
    async fn one_shot_stats_yields_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let body = r#"{"Error":null,"Stats":[{"CPUNano":100,"SystemNano":1000,"MemUsage":10,"MemLimit":100,"PIDs":2}]}"#;
        let server = serve_once(listener, respond("200 OK", body));

        let stream = runtime
            .container_stats(
                &ContainerId::new("abc"),
                StatsMode::OneShot,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let entries: Vec<_> = stream.collect().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_ref().unwrap().pids, 2);
        assert!(server.await.unwrap().contains("stream=false"));
    }

    #[tokio::test]
    async fn unreachable_socket_is_connection_error() {
        let runtime = SocketRuntime::new(Endpoint::Unix("/nonexistent/podman.sock".into()));
        let err = runtime.ping().await.unwrap_err();
        assert!(err.is_connection());
    }
}
