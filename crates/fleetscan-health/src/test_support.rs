//! Scripted probe client shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fleetscan_core::{EndpointUrl, ProbeInfo, ProbeTarget, WorkerId};

use crate::error::ProbeError;
use crate::probe::{ProbeClient, ProbeFuture};

/// How a scripted endpoint responds.
#[derive(Debug, Clone)]
pub enum Script {
    Answer { identity: WorkerId, height: u64 },
    AnswerAfter { delay: Duration, identity: WorkerId, height: u64 },
    Refuse,
    Hang,
}

#[derive(Default)]
pub struct ScriptedProbe {
    scripts: HashMap<EndpointUrl, Script>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, endpoint: &str, script: Script) -> Self {
        self.scripts.insert(url(endpoint), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProbeClient for ScriptedProbe {
    fn probe<'a>(&'a self, endpoint: &'a EndpointUrl) -> ProbeFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(endpoint).cloned().unwrap_or(Script::Refuse);
        Box::pin(async move {
            match script {
                Script::Answer { identity, height } => Ok(ProbeInfo { identity, height }),
                Script::AnswerAfter {
                    delay,
                    identity,
                    height,
                } => {
                    tokio::time::sleep(delay).await;
                    Ok(ProbeInfo { identity, height })
                }
                Script::Refuse => Err(ProbeError::Connect(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
                Script::Hang => std::future::pending().await,
            }
        })
    }
}

pub fn worker(n: u8) -> WorkerId {
    WorkerId::from_bytes(vec![0xaa, n])
}

pub fn url(s: &str) -> EndpointUrl {
    EndpointUrl::new(s).unwrap()
}

pub fn target(n: u8, endpoint: &str) -> ProbeTarget {
    ProbeTarget::new(worker(n), url(endpoint))
}
