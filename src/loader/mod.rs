//! Artifact loading: cache-busted fetch and wasm instantiation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use wasmtime::{Engine, Instance, Linker, Module, Store, Val, ValType};

use crate::{config::Config, error::PipelineError};

/// Monotonic counter used to manufacture a unique locator per load.
/// Strictly increasing for its whole lifetime, never reused, never reset;
/// atomic because two triggers may race on a multi-threaded runtime.
#[derive(Debug, Default)]
pub struct DownloadIndex(AtomicU64);

impl DownloadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Append the uniqueness-forcing query discriminator, so a repeat compile of
/// the same logical artifact path is never served from a URL-keyed cache.
pub fn busted_locator(reference: &str, index: u64) -> String {
    let sep = if reference.contains('?') { '&' } else { '?' };
    format!("{reference}{sep}num={index}")
}

/// A fetched, instantiated, initialized module. Owns its store; dropping
/// (or [`dispose`](Self::dispose)) releases everything the instance held.
pub struct LoadedArtifact {
    store: Store<()>,
    instance: Instance,
}

impl LoadedArtifact {
    /// Instantiate a module from raw bytes (wasm binary or wat text) and run
    /// its initialization entry point to completion. The artifact does not
    /// count as loaded until that entry point returns.
    pub fn instantiate(bytes: &[u8]) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)?;
        let mut store = Store::new(&engine, ());
        let linker = Linker::new(&engine);
        let instance = linker.instantiate(&mut store, &module)?;
        let mut loaded = Self { store, instance };
        loaded.initialize()?;
        Ok(loaded)
    }

    /// Reactor-style modules export `_initialize`; the playground's own
    /// artifacts export `init`. A module with neither simply has no setup.
    fn initialize(&mut self) -> Result<()> {
        let entry = self
            .instance
            .get_func(&mut self.store, "_initialize")
            .or_else(|| self.instance.get_func(&mut self.store, "init"));
        if let Some(func) = entry {
            func.call(&mut self.store, &[], &mut [])?;
        }
        Ok(())
    }

    /// Invoke an exported function with integer arguments coerced to its
    /// parameter types. Returns the first result, if the export produces one.
    pub fn invoke(&mut self, name: &str, args: &[i64]) -> Result<Option<Val>> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| anyhow!("no exported function `{name}`"))?;
        let ty = func.ty(&self.store);

        let params: Vec<ValType> = ty.params().collect();
        if params.len() != args.len() {
            bail!(
                "`{name}` takes {} argument(s), got {}",
                params.len(),
                args.len()
            );
        }
        let mut coerced = Vec::with_capacity(args.len());
        for (param, &arg) in params.iter().zip(args) {
            let val = match param {
                ValType::I32 => Val::I32(i32::try_from(arg).map_err(|_| {
                    anyhow!("argument {arg} is out of range for an i32 parameter of `{name}`")
                })?),
                ValType::I64 => Val::I64(arg),
                ValType::F32 => Val::F32((arg as f32).to_bits()),
                ValType::F64 => Val::F64((arg as f64).to_bits()),
                other => bail!("unsupported parameter type {other:?} for `{name}`"),
            };
            coerced.push(val);
        }

        let mut results = vec![Val::I32(0); ty.results().len()];
        func.call(&mut self.store, &coerced, &mut results)?;
        Ok(results.into_iter().next())
    }

    /// Release the artifact. Superseded artifacts are disposed explicitly by
    /// their owner instead of accumulating for the life of the session.
    pub fn dispose(self) {}
}

/// Fetches and instantiates the artifact behind a reference. Each call
/// targets a fresh locator; a previously loaded module is never reused.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Result<LoadedArtifact, PipelineError>;
}

/// HTTP-backed loader: resolves the artifact reference against the service
/// base URL, appends the download-index discriminator, fetches the bytes
/// and instantiates them.
pub struct WasmLoader {
    http: reqwest::Client,
    base_url: String,
    index: DownloadIndex,
}

impl WasmLoader {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.compile_url(), Duration::from_secs(cfg.request_timeout()))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: DownloadIndex::new(),
        })
    }

    pub fn index(&self) -> &DownloadIndex {
        &self.index
    }

    fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.base_url, reference.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ModuleLoader for WasmLoader {
    async fn load(&self, reference: &str) -> Result<LoadedArtifact, PipelineError> {
        let locator = busted_locator(&self.resolve(reference), self.index.next());

        let resp = self
            .http
            .get(&locator)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Load {
                locator: locator.clone(),
                source: e.into(),
            })?;
        let bytes = resp.bytes().await.map_err(|e| PipelineError::Load {
            locator: locator.clone(),
            source: e.into(),
        })?;

        LoadedArtifact::instantiate(&bytes).map_err(|e| PipelineError::Load {
            locator,
            source: e.into(),
        })
    }
}
