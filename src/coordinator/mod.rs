//! Compile-run cycle orchestration.
//!
//! One cycle walks Idle → Submitting → (Failed | Loading) → (Ready |
//! LoadFailed) → [Running] → Idle. The triggering control is disabled for
//! the whole cycle and re-enabled on every exit path; steps within a cycle
//! are strictly sequential, and a new trigger while one is in flight is
//! rejected rather than queued or cancelled.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    client::{CompileOutcome, CompileService},
    driver::{DriverCall, DriverValue},
    editor::EditorRegistry,
    error::PipelineError,
    loader::{LoadedArtifact, ModuleLoader},
    request,
};

/// The UI control that starts a cycle. External wiring flips real buttons;
/// the coordinator only toggles the shared `disabled` flag.
#[derive(Debug, Default)]
pub struct Trigger {
    disabled: AtomicBool,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    fn acquire(&self) -> Result<TriggerGuard<'_>, PipelineError> {
        self.disabled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::Busy)?;
        Ok(TriggerGuard { trigger: self })
    }
}

/// Re-enables the trigger on drop, so every exit path releases exactly once.
struct TriggerGuard<'a> {
    trigger: &'a Trigger,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        self.trigger.disabled.store(false, Ordering::Release);
    }
}

/// Terminal result of one cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The service rejected the program; diagnostics for display.
    Rejected { stdout: String, stderr: String },
    /// Compile-only: the artifact is loaded and held by the coordinator.
    Built,
    /// Compile-and-run: whatever the driver's export returned.
    Ran(Option<DriverValue>),
}

pub struct ExecutionCoordinator {
    service: Arc<dyn CompileService>,
    loader: Arc<dyn ModuleLoader>,
    editors: EditorRegistry,
    trigger: Arc<Trigger>,
    current: Option<LoadedArtifact>,
}

impl ExecutionCoordinator {
    pub fn new(
        service: Arc<dyn CompileService>,
        loader: Arc<dyn ModuleLoader>,
        editors: EditorRegistry,
        trigger: Arc<Trigger>,
    ) -> Self {
        Self {
            service,
            loader,
            editors,
            trigger,
            current: None,
        }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// The artifact from the most recent successful cycle, if any.
    pub fn artifact(&mut self) -> Option<&mut LoadedArtifact> {
        self.current.as_mut()
    }

    /// Compile the source editor's text and, on success, load the artifact.
    pub async fn compile(&mut self, editor_id: &str) -> Result<CycleOutcome, PipelineError> {
        self.cycle(editor_id, false).await
    }

    /// Compile, load, then hand the artifact to the driver editor's snippet.
    pub async fn compile_and_run(
        &mut self,
        editor_id: &str,
    ) -> Result<CycleOutcome, PipelineError> {
        self.cycle(editor_id, true).await
    }

    async fn cycle(&mut self, editor_id: &str, run: bool) -> Result<CycleOutcome, PipelineError> {
        let _guard = self.trigger.acquire()?;

        let editor = self
            .editors
            .get(editor_id)
            .ok_or_else(|| PipelineError::UnknownEditor(editor_id.to_string()))?;
        let req = request::build(&editor.value(), editor_id);

        let artifact = match self.service.submit(&req).await? {
            CompileOutcome::Failure { stdout, stderr, .. } => {
                return Ok(CycleOutcome::Rejected { stdout, stderr });
            }
            CompileOutcome::Success { artifact } => artifact,
        };

        let mut loaded = self.loader.load(&artifact).await?;
        if let Some(old) = self.current.take() {
            old.dispose();
        }

        // The artifact is retained even when the driver step fails: Ready
        // was reached, only Running went wrong.
        let result = if run {
            Self::run_driver(&self.editors, editor_id, &mut loaded).map(CycleOutcome::Ran)
        } else {
            Ok(CycleOutcome::Built)
        };
        self.current = Some(loaded);
        result
    }

    fn run_driver(
        editors: &EditorRegistry,
        editor_id: &str,
        artifact: &mut LoadedArtifact,
    ) -> Result<Option<DriverValue>, PipelineError> {
        let driver_id = EditorRegistry::driver_id(editor_id);
        let driver = editors
            .get(&driver_id)
            .ok_or_else(|| PipelineError::Driver(format!("no driver editor `{driver_id}` registered")))?;
        let call = DriverCall::parse(&driver.value())?;
        call.invoke(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::editor::BufferEditor;
    use crate::request::CompileRequest;

    const ADDER: &str = r#"
        (module
          (func (export "add") (param i32 i32) (result i32)
            (i32.add (local.get 0) (local.get 1))))
    "#;

    /// Scripted service that records requests and asserts the trigger is
    /// held for the whole submission.
    struct FakeService {
        outcome: CompileOutcome,
        trigger: Arc<Trigger>,
        submissions: Mutex<Vec<CompileRequest>>,
    }

    #[async_trait]
    impl CompileService for FakeService {
        async fn submit(&self, request: &CompileRequest) -> Result<CompileOutcome, PipelineError> {
            assert!(self.trigger.is_disabled(), "trigger must be held while submitting");
            self.submissions.lock().unwrap().push(request.clone());
            Ok(self.outcome.clone())
        }
    }

    struct FailingService;

    #[async_trait]
    impl CompileService for FailingService {
        async fn submit(&self, _request: &CompileRequest) -> Result<CompileOutcome, PipelineError> {
            Err(PipelineError::MalformedResponse { message: "garbled".into() })
        }
    }

    struct FakeLoader {
        trigger: Arc<Trigger>,
        references: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModuleLoader for FakeLoader {
        async fn load(&self, reference: &str) -> Result<LoadedArtifact, PipelineError> {
            assert!(self.trigger.is_disabled(), "trigger must be held while loading");
            self.references.lock().unwrap().push(reference.to_string());
            LoadedArtifact::instantiate(ADDER.as_bytes()).map_err(|e| PipelineError::Load {
                locator: reference.to_string(),
                source: e.into(),
            })
        }
    }

    struct BrokenLoader;

    #[async_trait]
    impl ModuleLoader for BrokenLoader {
        async fn load(&self, reference: &str) -> Result<LoadedArtifact, PipelineError> {
            Err(PipelineError::Load {
                locator: reference.to_string(),
                source: "fetch failed".into(),
            })
        }
    }

    fn editors(source: &str, driver: Option<&str>) -> EditorRegistry {
        let mut reg = EditorRegistry::new();
        reg.insert("demo_code", Arc::new(BufferEditor::new(source)));
        if let Some(snippet) = driver {
            reg.insert(
                EditorRegistry::driver_id("demo_code"),
                Arc::new(BufferEditor::new(snippet)),
            );
        }
        reg
    }

    fn success_service(trigger: &Arc<Trigger>) -> Arc<FakeService> {
        Arc::new(FakeService {
            outcome: CompileOutcome::Success {
                artifact: "/artifacts/demo_code_0.wasm".into(),
            },
            trigger: trigger.clone(),
            submissions: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn compile_only_loads_and_holds_the_artifact() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service.clone(),
            loader.clone(),
            editors("fn main() {}", None),
            trigger.clone(),
        );

        let outcome = coordinator.compile("demo_code").await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Built));
        assert!(coordinator.artifact().is_some());
        assert!(!trigger.is_disabled());

        let submissions = service.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].package_name, "demo_code");
        assert_eq!(submissions[0].source_code, "fn main() {}");
        assert_eq!(
            *loader.references.lock().unwrap(),
            vec!["/artifacts/demo_code_0.wasm".to_string()]
        );
    }

    #[tokio::test]
    async fn rejection_surfaces_diagnostics_without_loading() {
        let trigger = Arc::new(Trigger::new());
        let service = Arc::new(FakeService {
            outcome: CompileOutcome::Failure {
                exit_detail: json!(1),
                stdout: String::new(),
                stderr: "error: expected one of `)`".into(),
            },
            trigger: trigger.clone(),
            submissions: Mutex::new(Vec::new()),
        });
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service,
            loader.clone(),
            editors("fn main(", None),
            trigger.clone(),
        );

        let outcome = coordinator.compile("demo_code").await.unwrap();
        match outcome {
            CycleOutcome::Rejected { stderr, .. } => assert!(stderr.starts_with("error:")),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(loader.references.lock().unwrap().is_empty());
        assert!(coordinator.artifact().is_none());
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn transport_class_errors_re_enable_the_trigger() {
        let trigger = Arc::new(Trigger::new());
        let mut coordinator = ExecutionCoordinator::new(
            Arc::new(FailingService),
            Arc::new(BrokenLoader),
            editors("fn main() {}", None),
            trigger.clone(),
        );

        let err = coordinator.compile("demo_code").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn load_errors_propagate_and_re_enable_the_trigger() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let mut coordinator = ExecutionCoordinator::new(
            service,
            Arc::new(BrokenLoader),
            editors("fn main() {}", None),
            trigger.clone(),
        );

        let err = coordinator.compile("demo_code").await.unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
        assert!(coordinator.artifact().is_none());
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn run_invokes_the_driver_with_the_loaded_artifact() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service,
            loader,
            editors("fn main() {}", Some("add(2, 3)")),
            trigger.clone(),
        );

        let outcome = coordinator.compile_and_run("demo_code").await.unwrap();
        match outcome {
            CycleOutcome::Ran(Some(DriverValue::I32(v))) => assert_eq!(v, 5),
            other => panic!("expected a driver value, got {other:?}"),
        }
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn missing_driver_editor_is_a_driver_error() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service,
            loader,
            editors("fn main() {}", None),
            trigger.clone(),
        );

        let err = coordinator.compile_and_run("demo_code").await.unwrap_err();
        assert!(matches!(err, PipelineError::Driver(_)));
        // Ready was reached before Running failed, so the artifact is held.
        assert!(coordinator.artifact().is_some());
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn a_disabled_trigger_rejects_new_cycles() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service,
            loader,
            editors("fn main() {}", None),
            trigger.clone(),
        );

        trigger.set_disabled(true);
        let err = coordinator.compile("demo_code").await.unwrap_err();
        assert!(matches!(err, PipelineError::Busy));
        // The rejected trigger never owned the guard, so it does not
        // re-enable on behalf of the in-flight cycle.
        assert!(trigger.is_disabled());
    }

    #[tokio::test]
    async fn unknown_editor_is_reported_and_releases_the_trigger() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator =
            ExecutionCoordinator::new(service, loader, EditorRegistry::new(), trigger.clone());

        let err = coordinator.compile("demo_code").await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEditor(_)));
        assert!(!trigger.is_disabled());
    }

    #[tokio::test]
    async fn a_new_success_supersedes_the_previous_artifact() {
        let trigger = Arc::new(Trigger::new());
        let service = success_service(&trigger);
        let loader = Arc::new(FakeLoader {
            trigger: trigger.clone(),
            references: Mutex::new(Vec::new()),
        });
        let mut coordinator = ExecutionCoordinator::new(
            service,
            loader.clone(),
            editors("fn main() {}", None),
            trigger,
        );

        coordinator.compile("demo_code").await.unwrap();
        coordinator.compile("demo_code").await.unwrap();
        assert_eq!(loader.references.lock().unwrap().len(), 2);
        assert!(coordinator.artifact().is_some());
    }
}
