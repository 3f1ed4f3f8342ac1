use crate::generator::profile::GeneratorConfig;
use crate::workflow::runner::{Report, Runner};
use anyhow::Context;
use log::{error, info};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter, Reply};

pub const DEFAULT_PORT: u16 = 9000;

type SharedReport = Arc<RwLock<Option<Report>>>;

fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// `GET /report` returns the latest report, `POST /run` runs a scenario
/// with the bridge's workflow and publishes the result.
fn routes(
    state: SharedReport,
    runner: Arc<Runner>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let runner_filter = warp::any().map(move || runner.clone());

    let report_route = warp::path("report")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedReport| {
            let report = state.read().map(|guard| guard.clone()).unwrap_or(None);
            warp::reply::json(&report)
        });

    let run_route = warp::path("run")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter)
        .and(runner_filter)
        .and_then(
            |config: GeneratorConfig, state: SharedReport, runner: Arc<Runner>| async move {
                let reply = match runner.execute(&config) {
                    Ok(report) => {
                        let body = json!({
                            "status": "ok",
                            "frames": report.metrics.frames,
                            "detections": report.metrics.detections,
                            "description": config.description.clone().unwrap_or_default(),
                        });
                        if let Some(name) = config.scenario.as_ref() {
                            info!("scenario {} -> {} detections", name, report.metrics.detections);
                        }
                        if let Ok(mut guard) = state.write() {
                            *guard = Some(report);
                        }
                        warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
                    }
                    Err(err) => {
                        error!("run failed: {:#}", err);
                        warp::reply::with_status(
                            warp::reply::json(&json!({ "status": "error", "message": format!("{:#}", err) })),
                            StatusCode::BAD_REQUEST,
                        )
                    }
                };
                Ok::<_, warp::Rejection>(reply)
            },
        );

    report_route.or(run_route)
}

/// Holds the latest report and serves it over HTTP on the loopback interface.
pub struct GuiBridge {
    state: SharedReport,
}

impl GuiBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Starts the HTTP server on a background thread.
    pub fn serve(&self, runner: Arc<Runner>, port: u16) -> anyhow::Result<thread::JoinHandle<()>> {
        let routes = routes(self.state.clone(), runner);
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building bridge runtime")?;
        let address = bind_address(port);
        info!("bridge listening on http://{}", address);
        let handle = thread::Builder::new()
            .name("radarsim-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    warp::serve(routes).run(address).await;
                });
            })
            .context("spawning bridge thread")?;
        Ok(handle)
    }

    pub fn publish(&self, report: &Report) {
        match self.state.write() {
            Ok(mut guard) => {
                info!(
                    "published {:?} report: {} frames, {} detections",
                    report.app, report.metrics.frames, report.metrics.detections
                );
                *guard = Some(report.clone());
            }
            Err(_) => error!("report state is poisoned, dropping report"),
        }
    }

    pub fn snapshot(&self) -> Option<Report> {
        self.state.read().map(|guard| guard.clone()).unwrap_or(None)
    }
}

impl Default for GuiBridge {
    fn default() -> Self {
        Self::new()
    }
}
